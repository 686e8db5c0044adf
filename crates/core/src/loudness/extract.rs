//! Locating the `loudnorm` statistics block in ffmpeg's diagnostic output.

use super::types::LoudnessStats;
use crate::transcoder::TranscodeError;

/// Returns the last complete JSON object in `text`.
///
/// One pass collects every brace-balanced `{...}` span, ignoring braces
/// inside strings and unmatched `}`. The span that closes last and parses as
/// JSON wins, so log lines around the block (banners, trailing summaries with
/// stray braces) are skipped.
pub fn find_last_json_object(text: &str) -> Option<&str> {
    let mut spans = Vec::new();
    let mut opened = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            // Quotes only delimit strings inside an object.
            b'"' if !opened.is_empty() => in_string = true,
            b'{' => opened.push(i),
            b'}' => {
                if let Some(start) = opened.pop() {
                    spans.push(start..i + 1);
                }
            }
            _ => {}
        }
    }

    spans
        .into_iter()
        .rev()
        .map(|span| &text[span])
        .find(|candidate| serde_json::from_str::<serde::de::IgnoredAny>(candidate).is_ok())
}

/// Parses the statistics block from the accumulated stderr of an analysis pass.
pub fn parse_loudness_stats(diagnostics: &str) -> Result<LoudnessStats, TranscodeError> {
    let block = find_last_json_object(diagnostics)
        .ok_or_else(|| TranscodeError::parse("no loudnorm statistics block in ffmpeg output"))?;

    serde_json::from_str(block)
        .map_err(|e| TranscodeError::parse(format!("invalid loudnorm statistics: {}", e)))
}
