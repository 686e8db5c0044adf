//! Turns parsed markers into deduplicated, phase-blended progress events.

use super::parser::{percentage, ProgressMarker};
use super::types::{Stage, TranscodeProgressEvent};

/// Share of the overall progress a phase occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseWeight {
    /// Single-phase operation: `total == percentage`.
    Whole,
    /// First of two phases: `floor(raw / 2)`.
    FirstHalf,
    /// Second of two phases: `50 + floor(raw / 2)`.
    SecondHalf,
}

impl PhaseWeight {
    /// Maps a phase percentage onto the overall scale.
    ///
    /// Halves always clamp the raw value to 100 so the first phase can never
    /// overlap the second.
    pub fn rescale(&self, raw: u32) -> u32 {
        match self {
            Self::Whole => raw,
            Self::FirstHalf => raw.min(100) / 2,
            Self::SecondHalf => 50 + raw.min(100) / 2,
        }
    }
}

/// Per-phase progress state.
///
/// An event is produced only when the phase percentage increases and the
/// blended total increases past the last total emitted by any earlier phase.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    marker: ProgressMarker,
    total: u64,
    clamp: bool,
    weight: PhaseWeight,
    stage: Stage,
    last_percentage: Option<u32>,
    last_total: Option<u32>,
}

impl ProgressTracker {
    /// Creates a tracker for one phase measured against `total` seconds or frames.
    pub fn new(marker: ProgressMarker, total: u64, stage: Stage) -> Self {
        Self {
            marker,
            total,
            clamp: true,
            weight: PhaseWeight::Whole,
            stage,
            last_percentage: None,
            last_total: None,
        }
    }

    /// Sets the phase weight.
    pub fn with_weight(mut self, weight: PhaseWeight) -> Self {
        self.weight = weight;
        self
    }

    /// Enables or disables clamping of the phase percentage to 100.
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Continues after an earlier phase that last emitted `total`.
    pub fn after(mut self, last_total: Option<u32>) -> Self {
        self.last_total = last_total;
        self
    }

    /// The last blended total emitted.
    pub fn last_total(&self) -> Option<u32> {
        self.last_total
    }

    /// Feeds one output line; returns an event if progress advanced.
    pub fn feed_line(&mut self, line: &str) -> Option<TranscodeProgressEvent> {
        let elapsed = self.marker.elapsed(line)?;
        let mut pct = percentage(elapsed, self.total)?;
        if self.clamp {
            pct = pct.min(100);
        }

        if self.last_percentage.is_some_and(|last| pct <= last) {
            return None;
        }
        self.last_percentage = Some(pct);

        let total = self.weight.rescale(pct);
        if self.last_total.is_some_and(|last| total <= last) {
            return None;
        }
        self.last_total = Some(total);

        Some(TranscodeProgressEvent {
            percentage: pct,
            total,
            stage: self.stage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out_time(seconds: u64) -> String {
        format!(
            "out_time={:02}:{:02}:{:02}.000000",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        )
    }

    #[test]
    fn test_single_phase_dedup() {
        let mut tracker = ProgressTracker::new(ProgressMarker::OutTime, 200, Stage::Transcoding);

        let totals: Vec<u32> = [0, 1, 1, 2, 3, 3, 200]
            .iter()
            .filter_map(|s| tracker.feed_line(&out_time(*s)))
            .map(|e| e.total)
            .collect();

        // 1s of 200s rounds to 1%, 2s -> 1% (dup), 3s -> 2%
        assert_eq!(totals, vec![0, 1, 2, 100]);
    }

    #[test]
    fn test_ignores_unrelated_lines() {
        let mut tracker = ProgressTracker::new(ProgressMarker::OutTime, 10, Stage::Transcoding);
        assert!(tracker.feed_line("bitrate=128.0kbits/s").is_none());
        assert!(tracker.feed_line("out_time=N/A").is_none());
        assert!(tracker.last_total().is_none());
    }

    #[test]
    fn test_zero_total_emits_nothing() {
        let mut tracker = ProgressTracker::new(ProgressMarker::OutTime, 0, Stage::Transcoding);
        assert!(tracker.feed_line(&out_time(5)).is_none());
    }

    #[test]
    fn test_clamp_toggle() {
        let mut clamped = ProgressTracker::new(ProgressMarker::OutTime, 10, Stage::Transcoding);
        assert_eq!(clamped.feed_line(&out_time(11)).unwrap().percentage, 100);

        let mut raw = ProgressTracker::new(ProgressMarker::OutTime, 10, Stage::Transcoding)
            .with_clamp(false);
        assert_eq!(raw.feed_line(&out_time(11)).unwrap().percentage, 110);
    }

    #[test]
    fn test_frame_marker_against_packet_count() {
        let mut tracker = ProgressTracker::new(ProgressMarker::Frame, 400, Stage::Transcoding);
        assert_eq!(tracker.feed_line("frame=100").unwrap().percentage, 25);
        assert!(tracker.feed_line("frame=101").is_none());
        assert_eq!(tracker.feed_line("frame=400").unwrap().percentage, 100);
    }

    #[test]
    fn test_two_phase_blend_is_strictly_increasing() {
        let mut first = ProgressTracker::new(
            ProgressMarker::OutTime,
            100,
            Stage::ObtainingNormalizationValues,
        )
        .with_weight(PhaseWeight::FirstHalf);

        let mut events = Vec::new();
        for s in [0, 1, 2, 3, 50, 99, 100, 120] {
            events.extend(first.feed_line(&out_time(s)));
        }

        let mut second = ProgressTracker::new(ProgressMarker::OutTime, 100, Stage::Transcoding)
            .with_weight(PhaseWeight::SecondHalf)
            .after(first.last_total());
        for s in [0, 1, 2, 3, 50, 100] {
            events.extend(second.feed_line(&out_time(s)));
        }

        let totals: Vec<u32> = events.iter().map(|e| e.total).collect();
        assert_eq!(totals, vec![0, 1, 25, 49, 50, 51, 75, 100]);
        assert!(totals.windows(2).all(|w| w[0] < w[1]));

        let first_max = events
            .iter()
            .filter(|e| e.stage == Stage::ObtainingNormalizationValues)
            .map(|e| e.total)
            .max()
            .unwrap();
        let second_min = events
            .iter()
            .filter(|e| e.stage == Stage::Transcoding)
            .map(|e| e.total)
            .min()
            .unwrap();
        assert!(first_max < second_min);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(PhaseWeight::Whole.rescale(130), 130);
        assert_eq!(PhaseWeight::FirstHalf.rescale(99), 49);
        assert_eq!(PhaseWeight::FirstHalf.rescale(130), 50);
        assert_eq!(PhaseWeight::SecondHalf.rescale(0), 50);
        assert_eq!(PhaseWeight::SecondHalf.rescale(100), 100);
    }
}
