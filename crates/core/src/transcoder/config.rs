//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loudness::LoudnessTarget;

/// How ffmpeg's diagnostic output is judged while a stream is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrPolicy {
    /// Any diagnostic line aborts the run. Progress goes to stdout and ffmpeg
    /// runs with `-v error`, so anything on stderr is an error.
    #[default]
    AnyOutput,
    /// Only lines that look like errors abort the run; the rest is kept as
    /// diagnostics.
    ErrorMarkers,
}

const ERROR_MARKERS: &[&str] = &[
    "Error",
    "error",
    "Invalid",
    "No such file",
    "Conversion failed",
];

impl StderrPolicy {
    /// Whether `line` should abort the running process.
    pub fn is_fatal(&self, line: &str) -> bool {
        match self {
            Self::AnyOutput => true,
            Self::ErrorMarkers => ERROR_MARKERS.iter().any(|marker| line.contains(marker)),
        }
    }
}

/// Denominator for video progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoProgressBasis {
    /// Elapsed `out_time` against the video stream duration.
    #[default]
    Duration,
    /// Encoded `frame` count against the video stream packet count.
    Frames,
}

/// Configuration for the ffmpeg-based transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// How stderr lines are judged during streaming runs.
    #[serde(default)]
    pub stderr_policy: StderrPolicy,

    /// Treat a non-zero ffmpeg exit as a failure.
    #[serde(default = "default_true")]
    pub check_exit_status: bool,

    /// Cap reported percentages at 100.
    #[serde(default = "default_true")]
    pub clamp_percentage: bool,

    /// What video progress is measured against.
    #[serde(default)]
    pub video_progress: VideoProgressBasis,

    /// Progress events buffered before the producer waits for the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Loudness target used when normalization is requested without one.
    #[serde(default)]
    pub default_loudness: LoudnessTarget,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_true() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            stderr_policy: StderrPolicy::default(),
            check_exit_status: true,
            clamp_percentage: true,
            video_progress: VideoProgressBasis::default(),
            channel_capacity: default_channel_capacity(),
            default_loudness: LoudnessTarget::default(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the stderr policy.
    pub fn with_stderr_policy(mut self, policy: StderrPolicy) -> Self {
        self.stderr_policy = policy;
        self
    }

    /// Enables or disables percentage clamping.
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp_percentage = clamp;
        self
    }

    pub fn with_video_progress(mut self, basis: VideoProgressBasis) -> Self {
        self.video_progress = basis;
        self
    }
}
