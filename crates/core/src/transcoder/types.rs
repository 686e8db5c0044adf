//! Option types for the transcoder module.

use serde::{Deserialize, Serialize};

use super::error::TranscodeError;

/// Supported video encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9
    Vp9,
    /// FFV1 (lossless)
    Ffv1,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Ffv1 => "ffv1",
            Self::Av1 => "libaom-av1",
        }
    }
}

/// Encoder speed/quality tradeoff, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

/// Options for a video transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTranscodeOptions {
    /// Target video codec.
    pub codec: VideoCodec,
    /// Encoder preset.
    #[serde(default)]
    pub preset: Preset,
    /// Output width in pixels; requires `height`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Output height in pixels; requires `width`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Move the container index to the front for progressive playback.
    #[serde(default)]
    pub fast_start: bool,
    /// Output frame rate, frames per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Video bit rate, megabits per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<f64>,
}

impl VideoTranscodeOptions {
    /// Options with only the codec set.
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            codec,
            preset: Preset::default(),
            width: None,
            height: None,
            fast_start: false,
            frame_rate: None,
            bit_rate: None,
        }
    }

    /// Scales the output to `width`x`height`.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Checks option combinations ffmpeg would otherwise reject mid-run.
    pub fn validate(&self) -> Result<(), TranscodeError> {
        match (self.width, self.height) {
            (Some(0), _) | (_, Some(0)) => {
                return Err(TranscodeError::precondition(
                    "width and height must be greater than zero",
                ))
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(TranscodeError::precondition(
                    "width and height must be set together",
                ))
            }
            _ => {}
        }
        if self.frame_rate.is_some_and(|fps| !(fps > 0.0 && fps.is_finite())) {
            return Err(TranscodeError::precondition("frame rate must be positive"));
        }
        if self.bit_rate.is_some_and(|mbps| !(mbps > 0.0 && mbps.is_finite())) {
            return Err(TranscodeError::precondition("bit rate must be positive"));
        }
        Ok(())
    }
}

/// Supported audio encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// WAVE, 16-bit little-endian PCM
    Wav,
    /// MPEG Audio Layer III (LAME)
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Ogg Vorbis
    Ogg,
    /// Free Lossless Audio Codec
    Flac,
    /// AIFF, 16-bit big-endian PCM
    Aiff,
    /// Opus
    Opus,
}

impl AudioCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Wav => "pcm_s16le",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Ogg => "libvorbis",
            Self::Flac => "flac",
            Self::Aiff => "pcm_s16be",
            Self::Opus => "libopus",
        }
    }
}

/// Audio rate control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Constant bit rate; `bitrate` is required.
    ConstantRate,
    /// Variable bit rate; `quality` is required.
    VariableRate,
}

/// Options for an audio transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConvertOptions {
    /// Target audio codec.
    pub codec: AudioCodec,
    /// Rate control mode.
    #[serde(rename = "type")]
    pub rate_control: RateControl,
    /// Output sample rate in kHz (e.g. 44.1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    /// Encoder quality scale for VBR (for LAME, lower is better).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    /// Bit rate in kbps for CBR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
}

impl AudioConvertOptions {
    /// Constant bit rate at `bitrate_kbps`.
    pub fn constant(codec: AudioCodec, bitrate_kbps: u32) -> Self {
        Self {
            codec,
            rate_control: RateControl::ConstantRate,
            frequency: None,
            quality: None,
            bitrate: Some(bitrate_kbps),
        }
    }

    /// Variable bit rate at encoder quality `quality`.
    pub fn variable(codec: AudioCodec, quality: f64) -> Self {
        Self {
            codec,
            rate_control: RateControl::VariableRate,
            frequency: None,
            quality: Some(quality),
            bitrate: None,
        }
    }

    /// Resamples the output to `khz`.
    pub fn with_frequency(mut self, khz: f64) -> Self {
        self.frequency = Some(khz);
        self
    }

    /// Exactly one of `bitrate`/`quality` must be set, matching the rate control.
    pub fn validate(&self) -> Result<(), TranscodeError> {
        match (self.rate_control, self.bitrate, self.quality) {
            (RateControl::ConstantRate, None, _) => Err(TranscodeError::precondition(
                "bitrate is mandatory when constant rate is selected",
            )),
            (RateControl::ConstantRate, Some(_), Some(_)) => Err(TranscodeError::precondition(
                "quality cannot be combined with constant rate",
            )),
            (RateControl::ConstantRate, Some(0), None) => Err(TranscodeError::precondition(
                "bitrate must be greater than zero",
            )),
            (RateControl::VariableRate, _, None) => Err(TranscodeError::precondition(
                "quality is mandatory when variable rate is selected",
            )),
            (RateControl::VariableRate, Some(_), Some(_)) => Err(TranscodeError::precondition(
                "bitrate cannot be combined with variable rate",
            )),
            (RateControl::VariableRate, None, Some(q)) if !q.is_finite() => Err(
                TranscodeError::precondition("quality must be a finite number"),
            ),
            _ => self.validate_frequency(),
        }
    }

    fn validate_frequency(&self) -> Result<(), TranscodeError> {
        if self.frequency.is_some_and(|khz| !(khz > 0.0 && khz.is_finite())) {
            return Err(TranscodeError::precondition("frequency must be positive"));
        }
        Ok(())
    }
}
