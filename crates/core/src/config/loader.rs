use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Environment variables are prefixed with `TRANSCODER_` and nest with `__`,
/// e.g. `TRANSCODER_TRANSCODER__FFMPEG_PATH=/opt/ffmpeg/bin/ffmpeg`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment(Figment::new().merge(Toml::file(path)))
}

/// Load configuration from defaults and environment variables only
pub fn load_default_config() -> Result<Config, ConfigError> {
    figment(Figment::new())
}

fn figment(base: Figment) -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(base)
        .merge(Env::prefixed("TRANSCODER_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::StderrPolicy;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[transcoder]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
stderr_policy = "error_markers"

[transcoder.default_loudness]
input_i = -16
input_lra = 11
input_tp = -1.5

[logging]
json = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(
            config.transcoder.ffmpeg_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.transcoder.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.transcoder.stderr_policy, StderrPolicy::ErrorMarkers);
        assert_eq!(config.transcoder.default_loudness.input_i, -16.0);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_str_empty_is_default() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_str_bad_policy() {
        let toml = r#"
[transcoder]
stderr_policy = "sometimes"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/transcoder.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[transcoder]
ffprobe_path = "/usr/local/bin/ffprobe"
channel_capacity = 16
video_progress = "frames"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.transcoder.ffprobe_path,
            PathBuf::from("/usr/local/bin/ffprobe")
        );
        assert_eq!(config.transcoder.channel_capacity, 16);
        assert_eq!(config.transcoder.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "transcoder.toml",
                r#"
[transcoder]
ffmpeg_path = "/from/file"
"#,
            )?;
            jail.set_env("TRANSCODER_TRANSCODER__FFMPEG_PATH", "/from/env");
            jail.set_env("TRANSCODER_LOGGING__LEVEL", "debug");

            let config = load_config(Path::new("transcoder.toml")).unwrap();
            assert_eq!(config.transcoder.ffmpeg_path, PathBuf::from("/from/env"));
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }
}
