//! ffmpeg argument vectors.
//!
//! Streaming runs write `key=value` progress blocks to stdout (`-progress -`)
//! and keep stderr for diagnostics only (`-v error`).

use std::path::Path;

use super::error::TranscodeError;
use super::types::{AudioConvertOptions, RateControl, VideoTranscodeOptions};
use crate::loudness::{measurement_filter, LoudnessTarget};

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Arguments for a video transcode.
pub fn video_args(
    input: &Path,
    output: &Path,
    options: &VideoTranscodeOptions,
) -> Result<Vec<String>, TranscodeError> {
    options.validate()?;

    let mut args: Vec<String> = vec![
        "-v".into(),
        "error".into(),
        "-progress".into(),
        "-".into(),
        "-i".into(),
        path_arg(input),
    ];

    if let Some(mbps) = options.bit_rate {
        args.push("-b:v".into());
        args.push(format!("{}M", mbps));
    }
    if let (Some(width), Some(height)) = (options.width, options.height) {
        args.push("-vf".into());
        args.push(format!("scale={}:{}", width, height));
    }

    args.push("-c:v".into());
    args.push(options.codec.ffmpeg_codec().into());
    args.push("-preset".into());
    args.push(options.preset.as_str().into());

    if options.fast_start {
        args.push("-movflags".into());
        args.push("+faststart".into());
    }
    if let Some(fps) = options.frame_rate {
        args.push("-r".into());
        args.push(fps.to_string());
    }

    args.push("-y".into());
    args.push(path_arg(output));
    Ok(args)
}

/// Arguments for an audio transcode, with an optional `loudnorm` filter.
pub fn audio_args(
    input: &Path,
    output: &Path,
    options: &AudioConvertOptions,
    loudnorm: Option<&str>,
) -> Result<Vec<String>, TranscodeError> {
    options.validate()?;

    let mut args: Vec<String> = vec![
        "-v".into(),
        "error".into(),
        "-progress".into(),
        "-".into(),
        "-i".into(),
        path_arg(input),
        "-codec:a".into(),
        options.codec.ffmpeg_codec().into(),
    ];

    // validate() guarantees the field matching the rate control is set
    match (options.rate_control, options.bitrate, options.quality) {
        (RateControl::ConstantRate, Some(kbps), _) => {
            args.push("-b:a".into());
            args.push(format!("{}k", kbps));
        }
        (RateControl::VariableRate, _, Some(quality)) => {
            args.push("-q:a".into());
            args.push(quality.to_string());
        }
        _ => {
            return Err(TranscodeError::precondition(
                "rate control does not match bitrate/quality",
            ))
        }
    }

    if let Some(khz) = options.frequency {
        args.push("-ar".into());
        args.push(format!("{}k", khz));
    }
    if let Some(filter) = loudnorm {
        args.push("-af".into());
        args.push(filter.into());
    }

    args.push("-y".into());
    args.push(path_arg(output));
    Ok(args)
}

/// Arguments for a loudness analysis pass. Nothing is written; the statistics
/// land on stderr.
pub fn loudness_args(input: &Path, target: &LoudnessTarget) -> Vec<String> {
    vec![
        "-progress".into(),
        "-".into(),
        "-i".into(),
        path_arg(input),
        "-af".into(),
        measurement_filter(target),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}

/// Arguments for extracting a single frame at `timestamp`.
pub fn thumbnail_args(input: &Path, timestamp: &str, output: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        path_arg(input),
        "-ss".into(),
        timestamp.into(),
        "-vframes".into(),
        "1".into(),
        "-y".into(),
        path_arg(output),
    ]
}

/// Arguments for a `-version` check of either binary.
pub fn version_args() -> Vec<String> {
    vec!["-version".into()]
}
