//! Child process handle and lifecycle

use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::thread;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::config::{TERM_POLL_ATTEMPTS, TERM_POLL_INTERVAL};
use crate::direction::Direction;
use crate::error::{ProcessError, Result};
use crate::pipe::{End, ParentEnds};

/// Returned by [`ChildProcess::join`] when there is no process to wait for
pub const NOT_RUNNING: i32 = -1;

/// Outcome of the SIGTERM→SIGKILL teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No process was owned
    NotRunning,
    /// The process exited within the grace period, with this raw status
    Exited(i32),
    /// The process outlived the grace period and was killed
    Killed(Option<i32>),
}

/// A running child process and the parent's ends of its pipes.
///
/// Dropping the handle terminates and reaps the process: SIGTERM, up to
/// [`TERM_POLL_ATTEMPTS`] polls [`TERM_POLL_INTERVAL`] apart, then SIGKILL
/// and a blocking wait. Call [`join`](Self::join) to wait for a normal exit
/// instead.
///
/// The handle is move-only. `std::mem::take` transfers the process and
/// leaves an empty handle that owns nothing.
#[derive(Debug, Default)]
pub struct ChildProcess {
    pid: Option<Pid>,
    /// Status collected by `is_running`, not yet handed out by `join`
    reaped: Option<i32>,
    ends: ParentEnds,
}

impl ChildProcess {
    pub(crate) fn from_parts(pid: Pid, ends: ParentEnds) -> Self {
        Self {
            pid: Some(pid),
            reaped: None,
            ends,
        }
    }

    /// Process ID, or `None` once the process has been reaped
    pub fn pid(&self) -> Option<Pid> {
        match self.reaped {
            Some(_) => None,
            None => self.pid,
        }
    }

    /// Check if process is still running, without blocking.
    ///
    /// An exited process is reaped here; its status is kept for the next
    /// [`join`](Self::join).
    pub fn is_running(&mut self) -> bool {
        let Some(pid) = self.pid else {
            return false;
        };
        if self.reaped.is_some() {
            return false;
        }
        match wait_raw(pid, true) {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.reaped = Some(status);
                false
            }
            Err(errno) => {
                self.lost(pid, errno);
                false
            }
        }
    }

    /// Wait for the process to exit.
    ///
    /// Returns the raw wait status, exactly once. Later calls, and calls on
    /// a handle that never owned a process, return [`NOT_RUNNING`] without
    /// blocking.
    pub fn join(&mut self) -> i32 {
        let Some(pid) = self.pid else {
            return NOT_RUNNING;
        };
        if let Some(status) = self.reaped.take() {
            self.pid = None;
            return status;
        }
        match wait_raw(pid, false) {
            Ok(Some(status)) => {
                self.pid = None;
                debug!(pid = %pid, status, "Process joined");
                status
            }
            Ok(None) => NOT_RUNNING,
            Err(errno) => {
                self.lost(pid, errno);
                NOT_RUNNING
            }
        }
    }

    /// [`join`](Self::join), decoded into an [`ExitStatus`]
    pub fn join_status(&mut self) -> Option<ExitStatus> {
        match self.join() {
            NOT_RUNNING => None,
            raw => Some(ExitStatus::from_raw(raw)),
        }
    }

    /// Join on the blocking thread pool
    pub async fn wait(mut self) -> Result<i32> {
        Ok(tokio::task::spawn_blocking(move || self.join()).await?)
    }

    /// Terminate the process now and reap it.
    ///
    /// This is what `Drop` runs; calling it explicitly reports how the
    /// process went away.
    pub fn shutdown(&mut self) -> Termination {
        let Some(pid) = self.pid else {
            return Termination::NotRunning;
        };
        if let Some(status) = self.reaped.take() {
            self.pid = None;
            return Termination::Exited(status);
        }

        debug!(pid = %pid, "Shutting down process");
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            warn!(pid = %pid, error = %e, "Failed to send SIGTERM");
        }

        for _ in 0..TERM_POLL_ATTEMPTS {
            match wait_raw(pid, true) {
                Ok(None) => thread::sleep(TERM_POLL_INTERVAL),
                Ok(Some(status)) => {
                    self.pid = None;
                    debug!(pid = %pid, status, "Process shut down gracefully");
                    return Termination::Exited(status);
                }
                Err(errno) => {
                    self.lost(pid, errno);
                    return Termination::NotRunning;
                }
            }
        }

        warn!(pid = %pid, "Process ignored SIGTERM, sending SIGKILL");
        if let Err(e) = kill(pid, Signal::SIGKILL) {
            warn!(pid = %pid, error = %e, "Failed to send SIGKILL");
        }
        let status = wait_raw(pid, false).ok().flatten();
        self.pid = None;
        Termination::Killed(status)
    }

    /// Parent end of the pipe for `direction`
    pub fn resolve(&self, direction: Direction) -> Result<BorrowedFd<'_>> {
        match self.ends.get(direction) {
            End::Open(fd) => Ok(fd.as_fd()),
            End::Unset => Err(ProcessError::NotConfigured { direction }),
            End::Claimed => Err(ProcessError::AlreadyClaimed { direction }),
        }
    }

    /// [`resolve`](Self::resolve) from a raw flag value
    pub fn resolve_bits(&self, bits: u32) -> Result<BorrowedFd<'_>> {
        self.resolve(Direction::try_from(bits)?)
    }

    pub(crate) fn claim(&mut self, direction: Direction) -> Result<std::os::fd::OwnedFd> {
        self.ends.claim(direction)
    }

    /// waitpid failed: the process was reaped elsewhere or is not ours
    fn lost(&mut self, pid: Pid, errno: Errno) {
        warn!(pid = %pid, error = %errno, "Failed to wait for process");
        if errno == Errno::ECHILD {
            self.pid = None;
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.pid.is_some() {
            self.shutdown();
        }
    }
}

/// waitpid returning the raw status; `None` if still running under `nohang`
fn wait_raw(pid: Pid, nohang: bool) -> nix::Result<Option<i32>> {
    let flags = if nohang { libc::WNOHANG } else { 0 };
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: status is a valid out pointer for the call
        let rc = unsafe { libc::waitpid(pid.as_raw(), &mut status, flags) };
        match Errno::result(rc) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(status)),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno),
        }
    }
}
