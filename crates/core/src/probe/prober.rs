//! ffprobe invocations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::parse::{parse_integer_response, parse_probe_output};
use super::types::{FileInformation, StreamKind};
use crate::process::{capture_output, CapturedOutput, ProcessSpawner};
use crate::transcoder::TranscodeError;

/// Runs ffprobe queries.
#[derive(Clone)]
pub struct Prober {
    ffprobe_path: PathBuf,
    spawner: Arc<dyn ProcessSpawner>,
}

impl Prober {
    /// Creates a prober for the given binary.
    pub fn new(ffprobe_path: impl Into<PathBuf>, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            spawner,
        }
    }

    /// Container and per-stream information for a file.
    ///
    /// Any exit status is accepted as long as stdout holds the expected JSON;
    /// ffprobe sometimes exits non-zero after recoverable warnings while still
    /// printing a complete document.
    pub async fn probe(&self, path: &Path) -> Result<FileInformation, TranscodeError> {
        let span = tracing::info_span!("probe", invocation = %Uuid::new_v4(), path = %path.display());
        async {
            let output = self.run(probe_args(path)).await?;
            match parse_probe_output(&output.stdout) {
                Ok(info) => {
                    if !output.exit.success() {
                        warn!(exit = %output.exit, "ffprobe exited unsuccessfully but produced parseable output");
                    }
                    debug!(streams = info.streams.len(), duration = info.duration, "Probed file");
                    Ok(info)
                }
                Err(e) => Err(with_diagnostics(e, &output)),
            }
        }
        .instrument(span)
        .await
    }

    /// Duration of the file in whole seconds, used as a progress denominator.
    pub async fn stream_duration(
        &self,
        path: &Path,
        kind: StreamKind,
    ) -> Result<u64, TranscodeError> {
        let span = tracing::info_span!("stream_duration", invocation = %Uuid::new_v4(), path = %path.display());
        async {
            let output = self.run(duration_args(path, kind)).await?;
            parse_integer_response(&output.stdout).map_err(|e| with_diagnostics(e, &output))
        }
        .instrument(span)
        .await
    }

    /// Number of packets in the first stream of `kind`.
    pub async fn packet_count(&self, path: &Path, kind: StreamKind) -> Result<u64, TranscodeError> {
        let span = tracing::info_span!("packet_count", invocation = %Uuid::new_v4(), path = %path.display());
        async {
            let output = self.run(packet_count_args(path, kind)).await?;
            parse_integer_response(&output.stdout).map_err(|e| with_diagnostics(e, &output))
        }
        .instrument(span)
        .await
    }

    async fn run(&self, args: Vec<String>) -> Result<CapturedOutput, TranscodeError> {
        debug!(program = %self.ffprobe_path.display(), args = ?args, "Running ffprobe");
        let child = self.spawner.spawn(&self.ffprobe_path, &args)?;
        Ok(capture_output(child).await?)
    }
}

/// Appends the exit status and stderr to a parse error.
fn with_diagnostics(err: TranscodeError, output: &CapturedOutput) -> TranscodeError {
    match err {
        TranscodeError::Parse { reason } => {
            let stderr = output.stderr.trim();
            if stderr.is_empty() {
                TranscodeError::parse(format!("{} ({})", reason, output.exit))
            } else {
                TranscodeError::parse(format!("{} ({}: {})", reason, output.exit, stderr))
            }
        }
        other => other,
    }
}

/// Arguments for the full probe query.
pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "stream=width,height,codec_name,codec_type,display_aspect_ratio,bit_rate,sample_rate"
            .to_string(),
        "-show_entries".to_string(),
        "format=duration,format_name,format_long_name".to_string(),
        "-of".to_string(),
        "json".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Arguments for the duration query.
pub fn duration_args(path: &Path, kind: StreamKind) -> Vec<String> {
    single_value_args(path, kind, "format=duration")
}

/// Arguments for the packet count query.
pub fn packet_count_args(path: &Path, kind: StreamKind) -> Vec<String> {
    single_value_args(path, kind, "stream=nb_read_packets")
}

fn single_value_args(path: &Path, kind: StreamKind, entries: &str) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-count_packets".to_string(),
        "-select_streams".to_string(),
        kind.first_stream_selector().to_string(),
        "-show_entries".to_string(),
        entries.to_string(),
        "-of".to_string(),
        "default=nokey=1:noprint_wrappers=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}
