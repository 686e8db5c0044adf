//! Drives one running ffmpeg process on behalf of a progress stream.

use tracing::{debug, info, trace, warn};

use super::config::StderrPolicy;
use super::error::TranscodeError;
use super::stream::ProgressSink;
use crate::process::{ChildProcess, LineReader, ProcessError, ProcessExit};

/// Why a driver stopped early.
#[derive(Debug)]
pub(crate) enum Halt {
    /// The consumer dropped the stream.
    Cancelled,
    /// The job failed; the error goes to the consumer.
    Failed(TranscodeError),
}

impl From<TranscodeError> for Halt {
    fn from(e: TranscodeError) -> Self {
        Self::Failed(e)
    }
}

impl From<ProcessError> for Halt {
    fn from(e: ProcessError) -> Self {
        Self::Failed(e.into())
    }
}

/// What to do with stderr lines.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StderrHandling {
    /// Lines the policy flags abort the run; others are kept.
    Judge(StderrPolicy),
    /// Keep every line; the caller inspects them after exit.
    Collect,
}

/// A process that ran to completion.
#[derive(Debug)]
pub(crate) struct Finished {
    pub exit: ProcessExit,
    /// Collected stderr lines, newline terminated.
    pub diagnostics: String,
}

/// Reads the child's pipes until both close, then reaps it.
///
/// Every stdout line is offered to `on_line`; whatever it returns is published
/// on `sink`. The child is killed when the consumer goes away, when a stderr
/// line is fatal, or when a pipe read fails. A graceful stop request makes
/// it quit instead, and reading continues until it has exited.
pub(crate) async fn supervise<T, F>(
    mut child: Box<dyn ChildProcess>,
    sink: &ProgressSink<T>,
    stderr: StderrHandling,
    mut on_line: F,
) -> Result<Finished, Halt>
where
    F: FnMut(&str) -> Option<T>,
{
    let mut out = LineReader::new(
        child
            .take_stdout()
            .ok_or(ProcessError::MissingPipe { stream: "stdout" })?,
    );
    let mut err = LineReader::new(
        child
            .take_stderr()
            .ok_or(ProcessError::MissingPipe { stream: "stderr" })?,
    );
    let mut out_open = true;
    let mut err_open = true;
    let mut diagnostics = String::new();
    let mut stopping = false;

    while out_open || err_open {
        tokio::select! {
            _ = sink.closed() => {
                terminate(&mut child).await;
                return Err(Halt::Cancelled);
            }
            requested = sink.stop_requested(), if !stopping => {
                stopping = true;
                if requested {
                    info!("Stop requested, asking ffmpeg to quit");
                    if let Err(e) = child.quit().await {
                        warn!(error = %e, "Quit failed, killing process");
                        terminate(&mut child).await;
                    }
                }
            }
            line = out.next_line(), if out_open => match line {
                Ok(Some(line)) => {
                    trace!(line = %line, "stdout");
                    if let Some(item) = on_line(&line) {
                        if let Err(halt) = sink.emit(item).await {
                            terminate(&mut child).await;
                            return Err(halt);
                        }
                    }
                }
                Ok(None) => out_open = false,
                Err(e) => {
                    terminate(&mut child).await;
                    return Err(ProcessError::Io(e).into());
                }
            },
            line = err.next_line(), if err_open => match line {
                Ok(Some(line)) => {
                    diagnostics.push_str(&line);
                    diagnostics.push('\n');
                    if let StderrHandling::Judge(policy) = stderr {
                        if policy.is_fatal(&line) {
                            warn!(line = %line, "Fatal diagnostic output, killing process");
                            terminate(&mut child).await;
                            return Err(TranscodeError::process_failed(
                                format!("ffmpeg reported: {}", line.trim()),
                                None,
                                Some(diagnostics),
                            )
                            .into());
                        }
                    }
                }
                Ok(None) => err_open = false,
                Err(e) => {
                    terminate(&mut child).await;
                    return Err(ProcessError::Io(e).into());
                }
            },
        }
    }

    let exit = tokio::select! {
        _ = sink.closed() => {
            terminate(&mut child).await;
            return Err(Halt::Cancelled);
        }
        exit = child.wait() => exit?,
    };
    debug!(exit = %exit, "Process exited");

    Ok(Finished { exit, diagnostics })
}

async fn terminate(child: &mut Box<dyn ChildProcess>) {
    match child.kill().await {
        Ok(exit) => debug!(exit = %exit, "Process killed"),
        Err(e) => warn!(error = %e, "Failed to kill process"),
    }
}

/// The last `max_lines` lines of `text`.
pub(crate) fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
