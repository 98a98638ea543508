//! Process configuration

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::child::ChildProcess;
use crate::direction::Directions;
use crate::error::Result;

/// Number of non-blocking polls after SIGTERM before escalating to SIGKILL
pub const TERM_POLL_ATTEMPTS: u32 = 300;

/// Delay between two polls after SIGTERM
pub const TERM_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Initialization function run in the child between fork and exec
pub type InitFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Configuration for spawning a child process
///
/// No shell is involved: `executable` is run directly with `args`. To run a
/// shell command, use `/bin/sh` with `["-c", "your | command"]`.
pub struct ProcessConfig {
    /// Full path of the executable
    pub executable: PathBuf,
    /// Command arguments, excluding the program name
    pub args: Vec<String>,
    /// Standard streams connected to pipes
    pub pipes: Directions,
    /// Runs in the child before exec
    pub(crate) init: Option<InitFn>,
}

impl ProcessConfig {
    /// Create new process configuration
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: vec![],
            pipes: Directions::NONE,
            init: None,
        }
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the piped directions
    pub fn pipes(mut self, pipes: Directions) -> Self {
        self.pipes = pipes;
        self
    }

    /// Pipe standard input
    pub fn stdin(mut self) -> Self {
        self.pipes |= Directions::IN;
        self
    }

    /// Pipe standard output
    pub fn stdout(mut self) -> Self {
        self.pipes |= Directions::OUT;
        self
    }

    /// Pipe standard error
    pub fn stderr(mut self) -> Self {
        self.pipes |= Directions::ERR;
        self
    }

    /// Set the initialization function.
    ///
    /// `init` runs in the child process after the standard streams are
    /// remapped and before the executable replaces the process image, so it
    /// can change the working directory or the environment. Returning an
    /// error or panicking writes a message to the child's stderr and exits
    /// the child with status 1. The parent only sees this through the exit
    /// status and captured stderr.
    ///
    /// The child is forked from a possibly multi-threaded parent, so `init`
    /// must not take locks another parent thread may hold.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    /// Spawn the configured process
    pub fn spawn(self) -> Result<ChildProcess> {
        crate::spawn::spawn_process(self)
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("executable", &self.executable)
            .field("args", &self.args)
            .field("pipes", &self.pipes)
            .field("init", &self.init.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
