//! Tokio-based process spawner.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::debug;

use super::error::ProcessError;
use super::traits::{BoxedReader, ChildProcess, ProcessSpawner};
use super::types::ProcessExit;

/// Spawns real OS processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    /// Creates a new spawner.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for TokioSpawner {
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, ProcessError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::from_spawn(program, e))?;

        debug!(pid = ?child.id(), program = %program.display(), "Spawned child process");

        Ok(Box::new(TokioChild { child }))
    }
}

struct TokioChild {
    child: Child,
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.child
            .stdout
            .take()
            .map(|pipe| Box::pin(pipe) as BoxedReader)
    }

    fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.child
            .stderr
            .take()
            .map(|pipe| Box::pin(pipe) as BoxedReader)
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        let status = self.child.wait().await?;
        Ok(status.into())
    }

    async fn quit(&mut self) -> Result<(), ProcessError> {
        let Some(mut stdin) = self.child.stdin.take() else {
            return self.start_kill();
        };
        let written = async {
            stdin.write_all(b"q").await?;
            stdin.flush().await
        }
        .await;
        // Dropping stdin closes it, so a process waiting for a full line still
        // sees the command.
        drop(stdin);

        if let Err(e) = written {
            debug!(error = %e, "Could not send quit command, killing");
            return self.start_kill();
        }
        Ok(())
    }

    fn start_kill(&mut self) -> Result<(), ProcessError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already reaped.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let spawner = TokioSpawner::new();
        let result = spawner.spawn(Path::new("/nonexistent/ffmpeg-binary"), &[]);
        assert!(matches!(result, Err(ProcessError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_captures_pipes_and_exit_code() {
        let spawner = TokioSpawner::new();
        let args = vec![
            "-c".to_string(),
            "printf 'out_time=00:00:01.000000\\n'; printf 'warn\\n' >&2; exit 3".to_string(),
        ];
        let mut child = spawner.spawn(Path::new("sh"), &args).unwrap();

        let mut stdout = child.take_stdout().unwrap();
        let mut stderr = child.take_stderr().unwrap();
        assert!(child.take_stdout().is_none());

        let mut out = String::new();
        let mut err = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        stderr.read_to_string(&mut err).await.unwrap();
        let exit = child.wait().await.unwrap();

        assert_eq!(out, "out_time=00:00:01.000000\n");
        assert_eq!(err, "warn\n");
        assert_eq!(exit.code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quit_writes_command_to_stdin() {
        let spawner = TokioSpawner::new();
        let args = vec![
            "-c".to_string(),
            "read cmd; [ \"$cmd\" = q ] && exit 0 || exit 5".to_string(),
        ];
        let mut child = spawner.spawn(Path::new("sh"), &args).unwrap();

        child.quit().await.unwrap();
        let exit = child.wait().await.unwrap();
        assert_eq!(exit.code, Some(0));

        // Stdin is gone now; quitting again is a harmless kill.
        assert!(child.quit().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_reports_signal() {
        let spawner = TokioSpawner::new();
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let mut child = spawner.spawn(Path::new("sh"), &args).unwrap();

        let exit = child.kill().await.unwrap();
        assert!(!exit.success());
        assert_eq!(exit.signal.as_deref(), Some("SIGKILL"));

        // Killing again after reaping is a no-op.
        assert!(child.start_kill().is_ok());
    }
}
