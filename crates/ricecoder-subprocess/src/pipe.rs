//! Pipe allocation and end ownership

use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::dup2;

use crate::direction::{Direction, Directions};
use crate::error::{ProcessError, Result};

/// Read and write end of one pipe
#[derive(Debug)]
pub(crate) struct Pipe {
    pub(crate) read: OwnedFd,
    pub(crate) write: OwnedFd,
}

impl Pipe {
    fn new() -> Result<Self> {
        let (read, write) = cloexec_pipe().map_err(|errno| ProcessError::PipeFailed { errno })?;
        Ok(Self { read, write })
    }

    /// Split into (parent end, child end) for `direction`
    fn split(self, direction: Direction) -> (OwnedFd, OwnedFd) {
        match direction {
            Direction::In => (self.write, self.read),
            Direction::Out | Direction::Err => (self.read, self.write),
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd")))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe()?;
    fcntl(read.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    fcntl(write.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok((read, write))
}

/// Up to three pipes, one per requested direction
#[derive(Debug, Default)]
pub(crate) struct PipeSet {
    pipes: [Option<Pipe>; 3],
}

impl PipeSet {
    /// Create a pipe for each direction in `directions`.
    ///
    /// On failure the pipes created so far are closed.
    pub(crate) fn allocate(directions: Directions) -> Result<Self> {
        let mut set = PipeSet::default();
        for direction in directions.iter() {
            set.pipes[direction.index()] = Some(Pipe::new()?);
        }
        Ok(set)
    }

    /// Split every pipe into the ends kept by the parent and the child
    pub(crate) fn split(self) -> (ParentEnds, ChildEnds) {
        let mut parent = ParentEnds::default();
        let mut child = ChildEnds::default();
        for (direction, pipe) in Direction::ALL.into_iter().zip(self.pipes) {
            if let Some(pipe) = pipe {
                let (p, c) = pipe.split(direction);
                parent.ends[direction.index()] = End::Open(p);
                child.ends[direction.index()] = Some(c);
            }
        }
        (parent, child)
    }
}

/// State of a parent-side pipe end
#[derive(Debug, Default)]
pub(crate) enum End {
    /// Direction not requested at spawn
    #[default]
    Unset,
    /// Held by the handle
    Open(OwnedFd),
    /// Handed to an I/O worker
    Claimed,
}

/// Pipe ends retained by the parent: write end for stdin, read ends for
/// stdout and stderr
#[derive(Debug, Default)]
pub(crate) struct ParentEnds {
    ends: [End; 3],
}

impl ParentEnds {
    pub(crate) fn get(&self, direction: Direction) -> &End {
        &self.ends[direction.index()]
    }

    /// Take ownership of the end for `direction`
    pub(crate) fn claim(&mut self, direction: Direction) -> Result<OwnedFd> {
        let slot = &mut self.ends[direction.index()];
        match std::mem::replace(slot, End::Claimed) {
            End::Open(fd) => Ok(fd),
            End::Unset => {
                *slot = End::Unset;
                Err(ProcessError::NotConfigured { direction })
            }
            End::Claimed => Err(ProcessError::AlreadyClaimed { direction }),
        }
    }
}

/// Pipe ends handed to the child
#[derive(Debug, Default)]
pub(crate) struct ChildEnds {
    ends: [Option<OwnedFd>; 3],
}

impl ChildEnds {
    /// Map each end onto its standard stream descriptor.
    ///
    /// Runs in the forked child. The duplicated descriptor does not carry
    /// `FD_CLOEXEC`, so it survives exec while the originals are closed.
    pub(crate) fn install(self) -> std::result::Result<(), Errno> {
        for (direction, end) in Direction::ALL.into_iter().zip(self.ends) {
            let Some(fd) = end else { continue };
            let target = direction.child_fd();
            if fd.as_raw_fd() == target {
                // dup2 onto itself keeps the close-on-exec flag
                fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
                std::mem::forget(fd);
            } else {
                dup2(fd.as_raw_fd(), target)?;
            }
        }
        Ok(())
    }
}
