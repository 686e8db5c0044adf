//! Transcode pipeline controllers.
//!
//! [`Transcoder`] builds ffmpeg argument vectors from structured options,
//! runs the process and republishes its progress as a [`ProgressStream`].
//! Audio transcodes can be preceded by a loudness analysis pass whose
//! measurements seed the encoding pass.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use transcoder_core::transcoder::{AudioCodec, AudioConvertOptions, Transcoder};
//!
//! let transcoder = Transcoder::with_defaults();
//! let options = AudioConvertOptions::constant(AudioCodec::Mp3, 192);
//! let mut stream = transcoder.transcode_audio(input, output, &options, None)?;
//! while let Some(event) = stream.next().await {
//!     println!("{}%", event?.total);
//! }
//! ```

mod args;
mod config;
mod error;
mod ffmpeg;
mod stream;
mod supervise;
mod types;

pub use args::{audio_args, loudness_args, thumbnail_args, video_args};
pub use config::{StderrPolicy, TranscoderConfig, VideoProgressBasis};
pub use error::{ErrorKind, TranscodeError};
pub use ffmpeg::{default_thumbnail_path, ToolVersions, Transcoder};
pub use stream::ProgressStream;
pub use types::{
    AudioCodec, AudioConvertOptions, Preset, RateControl, VideoCodec, VideoTranscodeOptions,
};
