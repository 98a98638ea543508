//! Pipe allocation failure. Lowers RLIMIT_NOFILE for the whole test process,
//! so this binary holds a single test.

#![cfg(target_os = "linux")]

mod common;

use std::collections::BTreeSet;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use ricecoder_subprocess::{Directions, ProcessConfig, ProcessError};

use common::tool;

fn open_fds() -> BTreeSet<RawFd> {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .collect()
}

#[test]
fn test_pipe_failure_leaves_no_descriptors_or_process() {
    let cat = tool("cat");
    let before = open_fds();

    // Leave three or four free slots below the limit (the read_dir handle
    // counted above is closed again): the first pipe fits, all three do not.
    let limit = (0..)
        .filter(|fd| !before.contains(fd))
        .nth(2)
        .map(|fd: RawFd| fd as u64 + 1)
        .unwrap();
    let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).unwrap();
    setrlimit(Resource::RLIMIT_NOFILE, limit, hard).unwrap();

    let result = ProcessConfig::new(cat).pipes(Directions::ALL).spawn();

    setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

    let err = result.unwrap_err();
    assert!(
        matches!(err, ProcessError::PipeFailed { errno: Errno::EMFILE }),
        "unexpected {err:?}"
    );
    assert!(err.is_resource_error());
    assert_eq!(err.errno(), Some(Errno::EMFILE));

    // the first pipe was closed again and nothing was forked
    assert_eq!(open_fds(), before);
    assert_eq!(
        waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
}
