//! Types for the loudness module.

use serde::{Deserialize, Deserializer, Serialize};

use crate::progress::TranscodeProgressEvent;
use crate::transcoder::TranscodeError;

/// Loudness normalization standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationStandard {
    /// EBU R128, implemented by ffmpeg's `loudnorm` filter.
    #[default]
    #[serde(rename = "ebuR128")]
    EbuR128,
}

/// Loudness the output should be normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessTarget {
    /// Normalization standard.
    #[serde(rename = "type", default)]
    pub standard: NormalizationStandard,
    /// Integrated loudness target, LUFS.
    pub input_i: f64,
    /// Loudness range target, LU.
    pub input_lra: f64,
    /// Maximum true peak, dBTP.
    pub input_tp: f64,
}

impl LoudnessTarget {
    /// An EBU R128 target.
    pub fn ebu_r128(input_i: f64, input_lra: f64, input_tp: f64) -> Self {
        Self {
            standard: NormalizationStandard::EbuR128,
            input_i,
            input_lra,
            input_tp,
        }
    }

    /// Rejects values outside the ranges `loudnorm` accepts.
    pub fn validate(&self) -> Result<(), TranscodeError> {
        if !(-70.0..=-5.0).contains(&self.input_i) {
            return Err(TranscodeError::precondition(format!(
                "integrated loudness {} outside [-70, -5] LUFS",
                self.input_i
            )));
        }
        if !(1.0..=50.0).contains(&self.input_lra) {
            return Err(TranscodeError::precondition(format!(
                "loudness range {} outside [1, 50] LU",
                self.input_lra
            )));
        }
        if !(-9.0..=0.0).contains(&self.input_tp) {
            return Err(TranscodeError::precondition(format!(
                "true peak {} outside [-9, 0] dBTP",
                self.input_tp
            )));
        }
        Ok(())
    }
}

impl Default for LoudnessTarget {
    /// The broadcast target of EBU R128: -23 LUFS, 7 LU, -2 dBTP.
    fn default() -> Self {
        Self::ebu_r128(-23.0, 7.0, -2.0)
    }
}

/// Statistics printed by the `loudnorm` filter after an analysis pass.
///
/// The `input_*` fields are measured; the `output_*` fields are what the filter
/// predicts for a second pass with these measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoudnessStats {
    #[serde(deserialize_with = "de_level")]
    pub input_i: f64,
    #[serde(deserialize_with = "de_level")]
    pub input_tp: f64,
    #[serde(deserialize_with = "de_level")]
    pub input_lra: f64,
    #[serde(deserialize_with = "de_level")]
    pub input_thresh: f64,
    #[serde(deserialize_with = "de_level")]
    pub output_i: f64,
    #[serde(deserialize_with = "de_level")]
    pub output_tp: f64,
    #[serde(default, deserialize_with = "de_opt_level")]
    pub output_lra: Option<f64>,
    #[serde(deserialize_with = "de_level")]
    pub output_thresh: f64,
    /// "dynamic" or "linear".
    pub normalization_type: String,
    #[serde(deserialize_with = "de_level")]
    pub target_offset: f64,
}

/// Element of a loudness measurement stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoudnessEvent {
    /// The analysis pass advanced.
    Progress(TranscodeProgressEvent),
    /// Terminal element: the parsed filter statistics.
    Stats(LoudnessStats),
}

impl LoudnessEvent {
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress(_))
    }

    /// The statistics, if this is the terminal element.
    pub fn into_stats(self) -> Option<LoudnessStats> {
        match self {
            Self::Stats(stats) => Some(stats),
            Self::Progress(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Level {
    Number(f64),
    Text(String),
}

impl Level {
    fn value<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Self::Number(n) => Ok(n),
            // "-inf" is printed for silent input; f64 parsing accepts it.
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid level {:?}", s))),
        }
    }
}

fn de_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Level::deserialize(deserializer)?.value()
}

fn de_opt_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Option::<Level>::deserialize(deserializer)?
        .map(Level::value)
        .transpose()
}
