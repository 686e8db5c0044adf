//! EBU R128 loudness measurement and normalization.
//!
//! Normalization is two-pass: an analysis run of the `loudnorm` filter prints
//! its statistics as a JSON block on stderr, and the encoding run feeds those
//! measurements back into the filter so it can normalize linearly.

mod extract;
mod filter;
mod types;

pub use extract::{find_last_json_object, parse_loudness_stats};
pub use filter::{measurement_filter, normalization_filter};
pub use types::{LoudnessEvent, LoudnessStats, LoudnessTarget, NormalizationStandard};
