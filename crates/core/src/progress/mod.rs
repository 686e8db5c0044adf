//! Progress parsing for long-running ffmpeg invocations.
//!
//! ffmpeg is run with `-progress -`, which writes `key=value` lines to stdout.
//! [`ProgressMarker`] extracts the elapsed time or frame count from a line,
//! [`ProgressTracker`] turns it into a percentage of a precomputed total and
//! only reports increases. Two-phase operations blend their phases with
//! [`PhaseWeight`].

mod parser;
mod tracker;
mod types;

pub use parser::{parse_time_to_seconds, percentage, ProgressMarker};
pub use tracker::{PhaseWeight, ProgressTracker};
pub use types::{Stage, TranscodeProgressEvent};
