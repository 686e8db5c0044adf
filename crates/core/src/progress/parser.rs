//! Parsing of ffmpeg `-progress` output.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::transcoder::TranscodeError;

static OUT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)out_time=\s*(\S+)").expect("out_time pattern is valid"));

static FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)frame=\s*(\d+)").expect("frame pattern is valid"));

/// Which recurring marker drives progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMarker {
    /// `out_time=HH:MM:SS.ffffff`, measured against a duration in seconds.
    OutTime,
    /// `frame=<n>`, measured against a packet count.
    Frame,
}

impl ProgressMarker {
    /// Extracts the elapsed amount from a line, in seconds or frames.
    ///
    /// Lines without the marker, and markers whose value is not yet known
    /// (`out_time=N/A`), yield `None`.
    pub fn elapsed(&self, line: &str) -> Option<u64> {
        match self {
            Self::OutTime => {
                let value = OUT_TIME_RE.captures(line)?.get(1)?.as_str();
                match parse_time_to_seconds(value) {
                    Ok(seconds) => Some(seconds),
                    Err(e) => {
                        tracing::trace!(value, error = %e, "Skipping unparsable out_time");
                        None
                    }
                }
            }
            Self::Frame => FRAME_RE.captures(line)?.get(1)?.as_str().parse().ok(),
        }
    }
}

/// Converts `HH:MM:SS[.fraction]` into whole seconds, truncating the fraction.
///
/// Negative timestamps, which ffmpeg reports before the first packet, count as
/// zero.
pub fn parse_time_to_seconds(time: &str) -> Result<u64, TranscodeError> {
    let time = time.trim();
    if time.starts_with('-') {
        return Ok(0);
    }

    let whole = time.split('.').next().unwrap_or_default();
    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() != 3 {
        return Err(TranscodeError::parse(format!(
            "expected HH:MM:SS timestamp, got {:?}",
            time
        )));
    }

    let field = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| TranscodeError::parse(format!("invalid timestamp field in {:?}", time)))
    };
    let hours = field(parts[0])?;
    let minutes = field(parts[1])?;
    let seconds = field(parts[2])?;

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// `round(elapsed * 100 / total)`, or `None` when the total is zero.
///
/// Not clamped: the result exceeds 100 when the total underestimates the
/// real length.
pub fn percentage(elapsed: u64, total: u64) -> Option<u32> {
    if total == 0 {
        return None;
    }
    let pct = (elapsed as f64 * 100.0 / total as f64).round();
    Some(pct.min(u32::MAX as f64) as u32)
}
