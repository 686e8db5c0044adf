//! Collecting the full output of short-lived processes.

use tokio::io::AsyncReadExt;

use super::error::ProcessError;
use super::traits::ChildProcess;
use super::types::ProcessExit;

/// Everything a finished process wrote, plus its exit.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: ProcessExit,
}

/// Reads stdout and stderr to the end concurrently, then waits for the exit.
pub async fn capture_output(
    mut child: Box<dyn ChildProcess>,
) -> Result<CapturedOutput, ProcessError> {
    let mut stdout = child
        .take_stdout()
        .ok_or(ProcessError::MissingPipe { stream: "stdout" })?;
    let mut stderr = child
        .take_stderr()
        .ok_or(ProcessError::MissingPipe { stream: "stderr" })?;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let (out_res, err_res) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
    out_res?;
    err_res?;

    let exit = child.wait().await?;

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
        exit,
    })
}
