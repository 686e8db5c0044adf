//! Parsing of ffprobe responses.

use serde::Deserialize;
use std::str::FromStr;

use super::types::{AudioStream, FileInformation, StreamInformation, VideoStream};
use crate::transcoder::TranscodeError;

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<Scalar>,
    format_name: Option<String>,
    format_long_name: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<Scalar>,
    height: Option<Scalar>,
    display_aspect_ratio: Option<String>,
    bit_rate: Option<Scalar>,
    sample_rate: Option<Scalar>,
}

/// ffprobe writes most numbers as strings and a few as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn parse<T: FromStr>(&self) -> Option<T> {
        match self {
            Self::Number(n) => n.to_string().parse().ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn field<T: FromStr>(value: &Option<Scalar>) -> Option<T> {
    value.as_ref().and_then(Scalar::parse)
}

/// Parses the JSON written by the probe invocation.
///
/// Each entry of `streams` becomes exactly one record; `codec_type == "audio"`
/// selects the audio variant, anything else the video variant.
pub fn parse_probe_output(output: &str) -> Result<FileInformation, TranscodeError> {
    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| TranscodeError::parse(format!("Failed to parse ffprobe output: {}", e)))?;

    let streams = probe
        .streams
        .into_iter()
        .map(|s| {
            let codec = s.codec_name.clone().unwrap_or_default();
            match s.codec_type.as_deref() {
                Some("audio") => StreamInformation::Audio(AudioStream {
                    codec,
                    bit_rate: field(&s.bit_rate),
                    frequency: field(&s.sample_rate),
                }),
                _ => StreamInformation::Video(VideoStream {
                    codec,
                    width: field(&s.width),
                    height: field(&s.height),
                    aspect_ratio: s.display_aspect_ratio,
                }),
            }
        })
        .collect();

    Ok(FileInformation {
        duration: field(&probe.format.duration).unwrap_or(0.0),
        format_name: probe.format.format_name.unwrap_or_default(),
        format_long_name: probe.format.format_long_name.unwrap_or_default(),
        streams,
    })
}

/// Parses a single numeric value printed with `default=nokey=1:noprint_wrappers=1`.
///
/// A fractional part is truncated ("128.683000" is 128). Empty output, which
/// ffprobe produces when the selected stream does not exist, is an error.
pub fn parse_integer_response(output: &str) -> Result<u64, TranscodeError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| TranscodeError::parse("ffprobe returned an empty response"))?;

    let whole = line.split('.').next().unwrap_or_default();
    whole
        .parse::<u64>()
        .map_err(|_| TranscodeError::parse(format!("expected an integer, got {:?}", line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StreamKind;

    #[test]
    fn test_parse_probe_output_video_and_audio() {
        let json = r#"{
            "programs": [],
            "streams": [
                {
                    "codec_name": "h264",
                    "codec_type": "video",
                    "width": 1920,
                    "height": 1080,
                    "display_aspect_ratio": "16:9",
                    "bit_rate": "4953937"
                },
                {
                    "codec_name": "aac",
                    "codec_type": "audio",
                    "sample_rate": "48000",
                    "bit_rate": "317375"
                }
            ],
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "format_long_name": "QuickTime / MOV",
                "duration": "128.683000"
            }
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 128.683).abs() < 1e-9);
        assert_eq!(info.format_name, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(info.format_long_name, "QuickTime / MOV");
        assert_eq!(info.streams.len(), 2);

        let video = info.first_video().unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.height, Some(1080));
        assert_eq!(video.aspect_ratio.as_deref(), Some("16:9"));
        assert!(video.landscape());

        let audio = info.first_audio().unwrap();
        assert_eq!(audio.codec, "aac");
        assert_eq!(audio.frequency, Some(48000));
        assert_eq!(audio.bit_rate, Some(317375));
    }

    #[test]
    fn test_one_record_per_stream_entry() {
        let json = r#"{
            "streams": [
                {"codec_name": "mp3", "codec_type": "audio", "sample_rate": "44100", "bit_rate": "128000"},
                {"codec_name": "mjpeg", "codec_type": "video", "width": 500, "height": 500},
                {"codec_name": "subrip", "codec_type": "subtitle"}
            ],
            "format": {"format_name": "mp3", "format_long_name": "MP2/3 (MPEG audio layer 2/3)", "duration": "30.040816"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        let kinds: Vec<StreamKind> = info.streams.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![StreamKind::Audio, StreamKind::Video, StreamKind::Video]
        );
        assert_eq!(info.streams[2].codec(), "subrip");
        assert_eq!(info.streams[2].as_video().unwrap().width, None);
    }

    #[test]
    fn test_parse_probe_output_rejects_non_json() {
        let result = parse_probe_output("nonexistent.mp4: No such file or directory");
        assert!(matches!(result, Err(TranscodeError::Parse { .. })));
    }

    #[test]
    fn test_parse_probe_output_rejects_empty_object() {
        // What ffprobe prints on stdout when the input cannot be opened.
        let result = parse_probe_output("{\n\n}\n");
        assert!(matches!(result, Err(TranscodeError::Parse { .. })));
    }

    #[test]
    fn test_missing_duration_defaults_to_zero() {
        let json = r#"{"streams": [], "format": {"format_name": "image2"}}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration, 0.0);
        assert!(info.streams.is_empty());
    }

    #[test]
    fn test_parse_integer_response() {
        assert_eq!(parse_integer_response("3858\n").unwrap(), 3858);
        assert_eq!(parse_integer_response("128.683000\n").unwrap(), 128);
        assert_eq!(parse_integer_response("\n  42  \n").unwrap(), 42);
    }

    #[test]
    fn test_parse_integer_response_errors() {
        assert!(matches!(
            parse_integer_response(""),
            Err(TranscodeError::Parse { .. })
        ));
        assert!(parse_integer_response("N/A\n").is_err());
        assert!(parse_integer_response("-1").is_err());
    }
}
