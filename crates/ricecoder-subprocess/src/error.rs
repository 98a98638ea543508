//! Error types for child process management

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::direction::Direction;

/// Child process management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable does not exist
    #[error("Executable not found: {}", path.display())]
    ExecutableNotFound { path: PathBuf },

    /// Path or argument cannot be passed to the OS
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Raw value is not a valid direction
    #[error("Illegal direction value {bits}")]
    IllegalDirection { bits: u32 },

    /// Direction was not requested when the process was spawned
    #[error("Pipe for {direction} not configured at spawn")]
    NotConfigured { direction: Direction },

    /// Pipe end was already handed to a worker
    #[error("Pipe for {direction} already attached to a worker")]
    AlreadyClaimed { direction: Direction },

    /// pipe(2) failed
    #[error("Error {} creating the pipe: {}", *errno as i32, errno)]
    PipeFailed { errno: Errno },

    /// fork(2) failed
    #[error("Error {} forking a new process: {}", *errno as i32, errno)]
    ForkFailed { errno: Errno },

    /// Worker thread could not be started
    #[error("Failed to start I/O worker: {0}")]
    WorkerSpawnFailed(#[from] io::Error),

    /// Blocking wait task did not complete
    #[error("Wait task failed: {0}")]
    WaitTask(#[from] tokio::task::JoinError),
}

impl ProcessError {
    /// Caller-side mistakes, detected before any process or pipe exists.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound { .. }
                | Self::InvalidArgument { .. }
                | Self::IllegalDirection { .. }
                | Self::NotConfigured { .. }
                | Self::AlreadyClaimed { .. }
        )
    }

    /// OS refused a resource; retrying may succeed.
    pub fn is_resource_error(&self) -> bool {
        !self.is_config_error()
    }

    /// Underlying OS error code, if any
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::PipeFailed { errno } | Self::ForkFailed { errno } => Some(*errno),
            Self::WorkerSpawnFailed(e) => e.raw_os_error().map(Errno::from_raw),
            _ => None,
        }
    }
}

/// Result type for child process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let missing = ProcessError::ExecutableNotFound {
            path: PathBuf::from("/no/such/file"),
        };
        assert!(missing.is_config_error());
        assert!(missing.errno().is_none());

        let fork = ProcessError::ForkFailed {
            errno: Errno::EAGAIN,
        };
        assert!(fork.is_resource_error());
        assert_eq!(fork.errno(), Some(Errno::EAGAIN));
    }

    #[test]
    fn test_messages_carry_os_code() {
        let err = ProcessError::PipeFailed {
            errno: Errno::EMFILE,
        };
        let msg = err.to_string();
        assert!(msg.starts_with(&format!("Error {} creating the pipe", Errno::EMFILE as i32)));

        let err = ProcessError::NotConfigured {
            direction: Direction::Err,
        };
        assert_eq!(err.to_string(), "Pipe for stderr not configured at spawn");
    }
}
