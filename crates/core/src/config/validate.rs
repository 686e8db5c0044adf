use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Binary paths are not empty
/// - Channel capacity is not 0
/// - Default loudness target is inside the ranges loudnorm accepts
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let transcoder = &config.transcoder;

    if transcoder.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "transcoder.ffmpeg_path cannot be empty".to_string(),
        ));
    }
    if transcoder.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "transcoder.ffprobe_path cannot be empty".to_string(),
        ));
    }
    if transcoder.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.channel_capacity cannot be 0".to_string(),
        ));
    }

    transcoder
        .default_loudness
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("transcoder.default_loudness: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loudness::LoudnessTarget;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_path_fails() {
        let mut config = Config::default();
        config.transcoder.ffprobe_path = PathBuf::new();
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("ffprobe_path"));
    }

    #[test]
    fn test_validate_zero_capacity_fails() {
        let mut config = Config::default();
        config.transcoder.channel_capacity = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_loudness_out_of_range_fails() {
        let mut config = Config::default();
        config.transcoder.default_loudness = LoudnessTarget::ebu_r128(-23.0, 0.0, -2.0);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("default_loudness"));
    }
}
