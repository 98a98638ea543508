//! Process creation: pipes, fork, child-side setup, exec

use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{signal, sigprocmask, SigHandler, SigSet, SigmaskHow, Signal};
use nix::unistd::{execv, fork, ForkResult};
use parking_lot::{const_mutex, Mutex};
use tracing::{debug, info, warn};

use crate::child::ChildProcess;
use crate::config::{InitFn, ProcessConfig};
use crate::direction::Directions;
use crate::error::{ProcessError, Result};
use crate::pipe::{ChildEnds, PipeSet};

/// Serializes pipe creation and fork across the whole program, so a child
/// forked for one handle never inherits pipe ends mid-setup for another.
static SPAWN_LOCK: Mutex<()> = const_mutex(());

const INIT_FAILED: &str = "error: exception in initialization function";

/// Spawn `executable` with `args`, piping the streams in `pipes`.
///
/// Shorthand for building a [`ProcessConfig`].
///
/// # Examples
/// ```no_run
/// use ricecoder_subprocess::{spawn, Directions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut child = spawn("/bin/sh", ["-c", "exit 3"], Directions::NONE, || Ok(()))?;
/// assert_eq!(child.join_status().and_then(|s| s.code()), Some(3));
/// # Ok(())
/// # }
/// ```
pub fn spawn<P, I, S, F>(executable: P, args: I, pipes: Directions, init: F) -> Result<ChildProcess>
where
    P: Into<PathBuf>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    ProcessConfig::new(executable)
        .args(args)
        .pipes(pipes)
        .init(init)
        .spawn()
}

pub(crate) fn spawn_process(config: ProcessConfig) -> Result<ChildProcess> {
    let ProcessConfig {
        executable,
        args,
        pipes,
        init,
    } = config;

    if !executable.exists() {
        return Err(ProcessError::ExecutableNotFound { path: executable });
    }

    // Built before forking: the child must not allocate for argv
    let path = CString::new(executable.as_os_str().as_bytes()).map_err(|_| {
        ProcessError::InvalidArgument {
            reason: format!("executable path contains NUL: {}", executable.display()),
        }
    })?;
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(path.clone());
    for arg in &args {
        argv.push(
            CString::new(arg.as_str()).map_err(|_| ProcessError::InvalidArgument {
                reason: format!("argument contains NUL: {arg:?}"),
            })?,
        );
    }

    debug!(
        executable = %executable.display(),
        args = ?args,
        pipes = pipes.bits(),
        "Spawning process"
    );

    let guard = SPAWN_LOCK.lock();

    let (parent_ends, child_ends) = PipeSet::allocate(pipes)
        .inspect_err(|e| warn!(error = %e, "Failed to create pipes"))?
        .split();

    // SAFETY: the child only remaps descriptors, runs the caller's init
    // function and execs; it never returns into caller code.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            drop(child_ends);
            drop(guard);
            info!(pid = %child, executable = %executable.display(), "Process spawned");
            Ok(ChildProcess::from_parts(child, parent_ends))
        }
        Ok(ForkResult::Child) => {
            drop(parent_ends);
            exec_child(child_ends, init, &path, &argv)
        }
        Err(errno) => {
            warn!(error = %errno, executable = %executable.display(), "Failed to fork");
            Err(ProcessError::ForkFailed { errno })
        }
    }
}

/// Child side of the fork. Every path ends in `_exit` or a new image.
fn exec_child(ends: ChildEnds, init: Option<InitFn>, path: &CStr, argv: &[CString]) -> ! {
    if let Err(errno) = ends.install() {
        report(&format!(
            "error: errno {} redirecting standard streams: {errno}\n",
            errno as i32
        ));
        exit_failure();
    }

    if let Err(errno) = reset_signals() {
        report(&format!(
            "error: errno {} resetting signal state: {errno}\n",
            errno as i32
        ));
        exit_failure();
    }

    if let Some(init) = init {
        match panic::catch_unwind(AssertUnwindSafe(init)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                report(&format!("{INIT_FAILED}: {err:#}\n"));
                exit_failure();
            }
            Err(payload) => {
                report(&format!("{INIT_FAILED}: {}\n", panic_message(payload.as_ref())));
                exit_failure();
            }
        }
    }

    let errno = match execv(path, argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    report(&format!(
        "error: errno {} executing {}: {errno}\n",
        errno as i32,
        path.to_string_lossy()
    ));
    exit_failure()
}

/// Undo the parent's signal setup: the Rust runtime ignores SIGPIPE, and
/// the forking thread may block signals. Both survive exec.
fn reset_signals() -> nix::Result<()> {
    // SAFETY: installs the default disposition, no handler code involved
    unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl)? };
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
}

/// Write straight to descriptor 2, bypassing the stderr lock another parent
/// thread may have held at fork time.
fn report(message: &str) {
    let mut buf = message.as_bytes();
    while !buf.is_empty() {
        match nix::unistd::write(std::io::stderr(), buf) {
            Ok(0) => break,
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

fn exit_failure() -> ! {
    // SAFETY: _exit skips atexit handlers and stdio flushing that belong to
    // the parent's copy of the process state.
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}
