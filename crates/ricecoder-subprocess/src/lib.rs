//! # ricecoder-subprocess
//!
//! **Purpose**: Child process lifecycle with explicit argument vectors and
//! piped standard streams
//!
//! Runs an executable in a child process (no shell involved), optionally
//! connects its stdin/stdout/stderr to pipes, streams data through them on
//! worker threads, and always terminates and reaps the child when the handle
//! is dropped.
//!
//! ## Features
//!
//! - **Spawning**: pipe setup and fork/exec serialized across the program
//! - **Init Hook**: caller function run in the child before exec
//! - **I/O Workers**: one thread per attached stream, results and panics
//!   handed back through [`IoTask`]
//! - **Graceful Shutdown**: SIGTERM, a 3 second grace period, then SIGKILL
//! - **Join**: blocking wait that returns the exit status exactly once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::io::{BufRead, Write};
//! use ricecoder_subprocess::ProcessConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut child = ProcessConfig::new("/bin/sed")
//!     .args(["s/Hello/Good night/"])
//!     .stdin()
//!     .stdout()
//!     .spawn()?;
//!
//! let input = child.stdin(|os| writeln!(os, "Hello world"))?;
//! let output = child.stdout(|is| {
//!     let mut line = String::new();
//!     is.read_line(&mut line).map(|_| line)
//! })?;
//!
//! input.get()?;
//! assert_eq!(output.get()?, "Good night world\n");
//! assert_eq!(child.join(), 0);
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod direction;
pub mod error;
pub mod io;
mod pipe;
pub mod spawn;

pub use child::{ChildProcess, Termination, NOT_RUNNING};
pub use config::{InitFn, ProcessConfig, TERM_POLL_ATTEMPTS, TERM_POLL_INTERVAL};
pub use direction::{Direction, Directions};
pub use error::{ProcessError, Result};
pub use io::{InputStream, IoTask, OutputStream};
pub use spawn::spawn;
