//! Asynchronous pipe I/O workers

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::os::fd::OwnedFd;
use std::panic;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::child::ChildProcess;
use crate::direction::Direction;
use crate::error::{ProcessError, Result};

/// Stream handed to a stdin writer
pub type InputStream = BufWriter<File>;

/// Stream handed to a stdout or stderr reader
pub type OutputStream = BufReader<File>;

/// Handle to one I/O worker thread.
///
/// The worker's result is whatever the callback returned, so callers choose
/// their own error type. A panic in the callback is kept as its original
/// payload and handed back by [`join`](Self::join) or re-raised by
/// [`get`](Self::get).
pub struct IoTask<T> {
    direction: Direction,
    handle: JoinHandle<T>,
}

impl<T> IoTask<T> {
    /// Stream this worker is attached to
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the callback has returned (or panicked)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the callback; `Err` carries its panic payload unchanged
    pub fn join(self) -> thread::Result<T> {
        self.handle.join()
    }

    /// Wait for the callback, re-raising its panic on this thread
    pub fn get(self) -> T {
        match self.handle.join() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<T: Send + 'static> IoTask<T> {
    /// [`join`](Self::join) on the blocking thread pool
    pub async fn wait(self) -> thread::Result<T> {
        match tokio::task::spawn_blocking(move || self.join()).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => Err(err.into_panic()),
            Err(err) => Err(Box::new(err)),
        }
    }
}

impl<T> fmt::Debug for IoTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoTask")
            .field("direction", &self.direction)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl ChildProcess {
    /// Write into the process' standard input on a new thread.
    ///
    /// The pipe is closed when `f` returns or panics, which is how the child
    /// sees end of input. Buffered data still pending at that point is
    /// flushed on drop and a write error there is lost; call `flush()` at
    /// the end of `f` to observe delivery failures such as a broken pipe.
    ///
    /// ```no_run
    /// use std::io::Write;
    /// use ricecoder_subprocess::ProcessConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut child = ProcessConfig::new("/bin/cat").stdin().spawn()?;
    /// let input = child.stdin(|os| writeln!(os, "This goes into standard input"))?;
    /// input.get()?;
    /// child.join();
    /// # Ok(())
    /// # }
    /// ```
    pub fn stdin<F, T>(&mut self, f: F) -> Result<IoTask<T>>
    where
        F: FnOnce(&mut InputStream) -> T + Send + 'static,
        T: Send + 'static,
    {
        let fd = self.claim(Direction::In)?;
        self.launch(Direction::In, fd, move |fd| {
            let mut stream = BufWriter::new(File::from(fd));
            f(&mut stream)
        })
    }

    /// Read the process' standard output on a new thread
    pub fn stdout<F, T>(&mut self, f: F) -> Result<IoTask<T>>
    where
        F: FnOnce(&mut OutputStream) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.attach_reader(Direction::Out, f)
    }

    /// Read the process' standard error on a new thread
    pub fn stderr<F, T>(&mut self, f: F) -> Result<IoTask<T>>
    where
        F: FnOnce(&mut OutputStream) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.attach_reader(Direction::Err, f)
    }

    /// Read `direction` (stdout or stderr) on a new thread
    pub fn attach_reader<F, T>(&mut self, direction: Direction, f: F) -> Result<IoTask<T>>
    where
        F: FnOnce(&mut OutputStream) -> T + Send + 'static,
        T: Send + 'static,
    {
        if direction == Direction::In {
            return Err(ProcessError::IllegalDirection {
                bits: direction.bits(),
            });
        }
        let fd = self.claim(direction)?;
        self.launch(direction, fd, move |fd| {
            let mut stream = BufReader::new(File::from(fd));
            f(&mut stream)
        })
    }

    fn launch<W, T>(&self, direction: Direction, fd: OwnedFd, work: W) -> Result<IoTask<T>>
    where
        W: FnOnce(OwnedFd) -> T + Send + 'static,
        T: Send + 'static,
    {
        let name = match self.pid() {
            Some(pid) => format!("subprocess-{pid}-{direction}"),
            None => format!("subprocess-{direction}"),
        };
        debug!(worker = %name, "Starting I/O worker");

        let handle = thread::Builder::new().name(name).spawn(move || work(fd))?;
        Ok(IoTask { direction, handle })
    }
}
