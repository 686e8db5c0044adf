//! Types for the progress module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Loudness measurement pass of a normalized audio transcode.
    #[serde(rename = "obtaining normalization values")]
    ObtainingNormalizationValues,
    /// The encoding pass.
    #[serde(rename = "transcoding")]
    Transcoding,
}

impl Stage {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ObtainingNormalizationValues => "obtaining normalization values",
            Self::Transcoding => "transcoding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress update emitted while a transcode runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeProgressEvent {
    /// Progress of the current stage (0-100).
    pub percentage: u32,
    /// Progress blended across all stages (0-100).
    pub total: u32,
    /// Stage this event belongs to.
    pub stage: Stage,
}
