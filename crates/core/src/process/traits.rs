//! Trait definitions for the process module.

use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

use super::error::ProcessError;
use super::types::ProcessExit;

/// A captured output pipe of a child process.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// A running child process.
///
/// The process is not reaped until [`ChildProcess::wait`] resolves. Dropping a
/// child that has not exited kills it.
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if the process is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// Takes the stdout pipe. Returns `None` on the second call.
    fn take_stdout(&mut self) -> Option<BoxedReader>;

    /// Takes the stderr pipe. Returns `None` on the second call.
    fn take_stderr(&mut self) -> Option<BoxedReader>;

    /// Waits for the process to terminate.
    async fn wait(&mut self) -> Result<ProcessExit, ProcessError>;

    /// Sends a forceful kill without waiting. Output is not guaranteed to be
    /// flushed. Killing a process that already exited is a no-op.
    fn start_kill(&mut self) -> Result<(), ProcessError>;

    /// Asks the process to exit on its own by writing `q` to its stdin, the
    /// way ffmpeg's interactive quit works. Falls back to [`start_kill`] when
    /// stdin is gone. Does not wait for the exit.
    ///
    /// [`start_kill`]: ChildProcess::start_kill
    async fn quit(&mut self) -> Result<(), ProcessError>;

    /// Kills the process and waits for it to be reaped.
    async fn kill(&mut self) -> Result<ProcessExit, ProcessError> {
        self.start_kill()?;
        self.wait().await
    }
}

/// Starts external commands.
pub trait ProcessSpawner: Send + Sync {
    /// Spawns `program` with `args`, capturing stdout and stderr. Stdin is
    /// kept open for [`ChildProcess::quit`].
    ///
    /// A missing binary yields [`ProcessError::NotFound`]; this is never
    /// retried.
    fn spawn(&self, program: &Path, args: &[String])
        -> Result<Box<dyn ChildProcess>, ProcessError>;
}
