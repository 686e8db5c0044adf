//! Types for the probe module.

use serde::{Deserialize, Serialize};

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    /// ffprobe `-select_streams` specifier for the first stream of this kind.
    pub fn first_stream_selector(&self) -> &'static str {
        match self {
            Self::Audio => "a:0",
            Self::Video => "v:0",
        }
    }
}

/// An audio stream as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Codec identifier (e.g. "mp3", "aac").
    pub codec: String,
    /// Bit rate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    /// Sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
}

/// A video stream as reported by ffprobe.
///
/// Streams ffprobe reports as neither audio nor video (subtitles, data) are
/// also represented here, with their dimensions absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Codec identifier (e.g. "h264").
    pub codec: String,
    /// Width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Display aspect ratio as reported (e.g. "16:9").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

impl VideoStream {
    /// Whether the frame is wider than it is tall.
    pub fn landscape(&self) -> bool {
        matches!((self.width, self.height), (Some(w), Some(h)) if w > h)
    }
}

/// One stream of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamInformation {
    Audio(AudioStream),
    Video(VideoStream),
}

impl StreamInformation {
    /// The variant tag.
    pub fn kind(&self) -> StreamKind {
        match self {
            Self::Audio(_) => StreamKind::Audio,
            Self::Video(_) => StreamKind::Video,
        }
    }

    /// Codec identifier.
    pub fn codec(&self) -> &str {
        match self {
            Self::Audio(a) => &a.codec,
            Self::Video(v) => &v.codec,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioStream> {
        match self {
            Self::Audio(a) => Some(a),
            Self::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoStream> {
        match self {
            Self::Video(v) => Some(v),
            Self::Audio(_) => None,
        }
    }
}

/// Container-level information plus every stream, in ffprobe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInformation {
    /// Duration in seconds (0 when ffprobe does not know it).
    pub duration: f64,
    /// Short format name(s), e.g. "mov,mp4,m4a,3gp,3g2,mj2".
    pub format_name: String,
    /// Long format name, e.g. "QuickTime / MOV".
    pub format_long_name: String,
    /// Streams in the order ffprobe reported them.
    pub streams: Vec<StreamInformation>,
}

impl FileInformation {
    /// First audio stream, if any.
    pub fn first_audio(&self) -> Option<&AudioStream> {
        self.streams.iter().find_map(StreamInformation::as_audio)
    }

    /// First video stream, if any.
    pub fn first_video(&self) -> Option<&VideoStream> {
        self.streams.iter().find_map(StreamInformation::as_video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape() {
        let mut stream = VideoStream {
            codec: "h264".to_string(),
            width: Some(1920),
            height: Some(1080),
            aspect_ratio: Some("16:9".to_string()),
        };
        assert!(stream.landscape());

        stream.width = Some(720);
        stream.height = Some(1280);
        assert!(!stream.landscape());

        stream.width = None;
        assert!(!stream.landscape());
    }

    #[test]
    fn test_tagged_serialization() {
        let stream = StreamInformation::Audio(AudioStream {
            codec: "mp3".to_string(),
            bit_rate: Some(128000),
            frequency: Some(44100),
        });
        let json = serde_json::to_value(&stream).unwrap();
        assert_eq!(json["kind"], "audio");
        assert_eq!(json["frequency"], 44100);
        assert_eq!(stream.kind(), StreamKind::Audio);
        assert_eq!(stream.codec(), "mp3");
    }

    #[test]
    fn test_selectors() {
        assert_eq!(StreamKind::Video.first_stream_selector(), "v:0");
        assert_eq!(StreamKind::Audio.first_stream_selector(), "a:0");
    }
}
