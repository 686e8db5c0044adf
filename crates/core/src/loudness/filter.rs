//! `loudnorm` filter expressions.

use super::types::{LoudnessStats, LoudnessTarget};

/// Filter for the analysis pass: prints statistics as JSON when done.
pub fn measurement_filter(target: &LoudnessTarget) -> String {
    format!(
        "loudnorm=I={}:LRA={}:tp={}:print_format=json",
        target.input_i, target.input_lra, target.input_tp
    )
}

/// Filter for the encoding pass, seeded with the analysis results.
pub fn normalization_filter(target: &LoudnessTarget, measured: &LoudnessStats) -> String {
    format!(
        "loudnorm=I={}:LRA={}:tp={}:measured_I={}:measured_LRA={}:measured_tp={}:measured_thresh={}:offset={}:linear=true",
        target.input_i,
        target.input_lra,
        target.input_tp,
        measured.input_i,
        measured.input_lra,
        measured.input_tp,
        measured.input_thresh,
        measured.target_offset,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_filter() {
        let target = LoudnessTarget::ebu_r128(-16.0, 11.0, -1.5);
        assert_eq!(
            measurement_filter(&target),
            "loudnorm=I=-16:LRA=11:tp=-1.5:print_format=json"
        );
    }

    #[test]
    fn test_normalization_filter_carries_target_and_measured() {
        let target = LoudnessTarget::ebu_r128(-16.0, 11.0, -1.5);
        let measured = LoudnessStats {
            input_i: -27.61,
            input_tp: -4.47,
            input_lra: 18.06,
            input_thresh: -39.2,
            output_i: -16.58,
            output_tp: -1.5,
            output_lra: Some(14.78),
            output_thresh: -27.71,
            normalization_type: "dynamic".to_string(),
            target_offset: 0.58,
        };
        assert_eq!(
            normalization_filter(&target, &measured),
            "loudnorm=I=-16:LRA=11:tp=-1.5:measured_I=-27.61:measured_LRA=18.06:measured_tp=-4.47:measured_thresh=-39.2:offset=0.58:linear=true"
        );
    }
}
