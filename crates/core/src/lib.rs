pub mod config;
pub mod loudness;
pub mod probe;
pub mod process;
pub mod progress;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config,
    ConfigError, LoggingConfig,
};
pub use loudness::{LoudnessEvent, LoudnessStats, LoudnessTarget, NormalizationStandard};
pub use probe::{FileInformation, Prober, StreamInformation, StreamKind};
pub use process::{ProcessError, ProcessExit, ProcessSpawner, TokioSpawner};
pub use progress::{Stage, TranscodeProgressEvent};
pub use transcoder::{
    AudioCodec, AudioConvertOptions, ErrorKind, Preset, ProgressStream, RateControl,
    StderrPolicy, TranscodeError, Transcoder, TranscoderConfig, VideoCodec,
    VideoProgressBasis, VideoTranscodeOptions,
};
