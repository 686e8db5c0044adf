use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcoder_core::loudness::LoudnessEvent;
use transcoder_core::transcoder::default_thumbnail_path;
use transcoder_core::{
    load_config, load_default_config, validate_config, AudioCodec, AudioConvertOptions, Config,
    LoggingConfig, LoudnessTarget, Preset, ProgressStream, RateControl, StreamKind, Transcoder,
    TranscodeProgressEvent, VideoCodec, VideoTranscodeOptions,
};

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "transcoder.toml";

#[derive(Debug, Parser)]
#[command(name = "transcoder", version, about = "Progress-reporting ffmpeg front end")]
struct Cli {
    /// Configuration file (also TRANSCODER_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print container and stream information as JSON
    Probe { input: PathBuf },

    /// Print the duration of the first stream of a kind, in seconds
    Duration {
        input: PathBuf,
        #[arg(long, default_value = "audio", value_parser = parse_enum::<StreamKind>)]
        stream: StreamKind,
    },

    /// Print the packet count of the first stream of a kind
    Packets {
        input: PathBuf,
        #[arg(long, default_value = "video", value_parser = parse_enum::<StreamKind>)]
        stream: StreamKind,
    },

    /// Transcode video
    Video {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_parser = parse_enum::<VideoCodec>)]
        codec: VideoCodec,
        #[arg(long, default_value = "medium", value_parser = parse_enum::<Preset>)]
        preset: Preset,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Move the index to the front of the file
        #[arg(long)]
        fast_start: bool,
        /// Frames per second
        #[arg(long)]
        frame_rate: Option<f64>,
        /// Megabits per second
        #[arg(long)]
        bit_rate: Option<f64>,
    },

    /// Transcode audio, optionally normalizing loudness
    Audio {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_parser = parse_enum::<AudioCodec>)]
        codec: AudioCodec,
        /// Constant bit rate in kbps
        #[arg(long, conflicts_with = "quality")]
        bitrate: Option<u32>,
        /// Variable bit rate quality
        #[arg(long)]
        quality: Option<f64>,
        /// Sample rate in kHz
        #[arg(long)]
        frequency: Option<f64>,
        /// Normalize loudness before encoding
        #[arg(long)]
        normalize: bool,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Measure loudness without writing output
    Loudness {
        input: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Extract a single frame
    Thumbnail {
        input: PathBuf,
        /// Defaults to <input stem>.thumb.png next to the input
        output: Option<PathBuf>,
        #[arg(long, default_value = "00:00:01.000")]
        at: String,
    },

    /// Check that ffmpeg and ffprobe can be run
    Check,
}

/// Overrides for the configured loudness target.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
struct TargetArgs {
    /// Integrated loudness, LUFS
    #[arg(long, allow_hyphen_values = true)]
    target_i: Option<f64>,
    /// Loudness range, LU
    #[arg(long)]
    target_lra: Option<f64>,
    /// True peak, dBTP
    #[arg(long, allow_hyphen_values = true)]
    target_tp: Option<f64>,
}

impl TargetArgs {
    fn resolve(&self, base: LoudnessTarget) -> LoudnessTarget {
        LoudnessTarget {
            input_i: self.target_i.unwrap_or(base.input_i),
            input_lra: self.target_lra.unwrap_or(base.input_lra),
            input_tp: self.target_tp.unwrap_or(base.input_tp),
            ..base
        }
    }
}

/// Parses a CLI value with the same names the config file uses.
fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unsupported value '{}'", value))
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    init_logging(&config.logging);
    validate_config(&config).context("Configuration validation failed")?;

    let transcoder = Transcoder::new(config.transcoder.clone());

    match cli.command {
        Command::Probe { input } => {
            let info = transcoder
                .probe(&input)
                .await
                .with_context(|| format!("Failed to probe {:?}", input))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Duration { input, stream } => {
            let seconds = transcoder
                .stream_duration(&input, stream)
                .await
                .with_context(|| format!("Failed to query duration of {:?}", input))?;
            println!("{}", seconds);
        }
        Command::Packets { input, stream } => {
            let packets = transcoder
                .packet_count(&input, stream)
                .await
                .with_context(|| format!("Failed to count packets of {:?}", input))?;
            println!("{}", packets);
        }
        Command::Video {
            input,
            output,
            codec,
            preset,
            width,
            height,
            fast_start,
            frame_rate,
            bit_rate,
        } => {
            let options = VideoTranscodeOptions {
                codec,
                preset,
                width,
                height,
                fast_start,
                frame_rate,
                bit_rate,
            };
            let stream = transcoder.transcode_video(&input, &output, &options)?;
            report_progress(stream).await.context("Video transcode failed")?;
            info!(output = %output.display(), "Done");
        }
        Command::Audio {
            input,
            output,
            codec,
            bitrate,
            quality,
            frequency,
            normalize,
            target,
        } => {
            let options = audio_options(codec, bitrate, quality, frequency)?;
            let normalization =
                normalize.then(|| target.resolve(config.transcoder.default_loudness));
            let stream = transcoder.transcode_audio(&input, &output, &options, normalization)?;
            report_progress(stream).await.context("Audio transcode failed")?;
            info!(output = %output.display(), "Done");
        }
        Command::Loudness { input, target } => {
            let target = target.resolve(config.transcoder.default_loudness);
            let stream = transcoder.measure_loudness(&input, &target)?;
            drain(stream, |event| {
                match event {
                    LoudnessEvent::Progress(progress) => log_progress(&progress),
                    LoudnessEvent::Stats(stats) => {
                        println!("{}", serde_json::to_string_pretty(&stats)?)
                    }
                }
                Ok(())
            })
            .await
            .context("Loudness measurement failed")?;
        }
        Command::Thumbnail { input, output, at } => {
            let output = output.unwrap_or_else(|| default_thumbnail_path(&input));
            transcoder
                .thumbnail_at(&input, &at, &output)
                .await
                .context("Thumbnail extraction failed")?;
            println!("{}", output.display());
        }
        Command::Check => {
            let versions = transcoder
                .validate()
                .await
                .context("ffmpeg installation check failed")?;
            println!("{}", versions.ffmpeg);
            println!("{}", versions.ffprobe);
        }
    }

    Ok(())
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("TRANSCODER_CONFIG").ok().map(PathBuf::from));

    match path {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(Path::new(DEFAULT_CONFIG_FILE))
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_FILE)),
        None => load_default_config().context("Failed to load configuration"),
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command results
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn audio_options(
    codec: AudioCodec,
    bitrate: Option<u32>,
    quality: Option<f64>,
    frequency: Option<f64>,
) -> Result<AudioConvertOptions> {
    let rate_control = match (bitrate, quality) {
        (Some(_), None) => RateControl::ConstantRate,
        (None, Some(_)) => RateControl::VariableRate,
        _ => bail!("exactly one of --bitrate or --quality is required"),
    };
    Ok(AudioConvertOptions {
        codec,
        rate_control,
        frequency,
        quality,
        bitrate,
    })
}

/// Drains `stream`, handing each item to `on_item`.
///
/// The first Ctrl-C asks ffmpeg to quit, which still finalizes the output.
/// A second one abandons the run; dropping the stream kills ffmpeg.
async fn drain<T>(
    mut stream: ProgressStream<T>,
    mut on_item: impl FnMut(T) -> Result<()>,
) -> Result<()> {
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut stopping = false;

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => on_item(item?)?,
                None => return Ok(()),
            },
            _ = &mut interrupt => {
                if stopping {
                    warn!("Interrupted again, killing ffmpeg");
                    bail!("interrupted");
                }
                warn!("Interrupted, asking ffmpeg to finish the output");
                stream.stop();
                stopping = true;
                interrupt.set(tokio::signal::ctrl_c());
            }
        }
    }
}

async fn report_progress(stream: ProgressStream<TranscodeProgressEvent>) -> Result<()> {
    drain(stream, |event| {
        log_progress(&event);
        Ok(())
    })
    .await
}

fn log_progress(event: &TranscodeProgressEvent) {
    info!(
        stage = %event.stage,
        percentage = event.percentage,
        total = event.total,
        "Progress"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_video_command() {
        let cli = Cli::try_parse_from([
            "transcoder",
            "video",
            "in.mkv",
            "out.mp4",
            "--codec",
            "h265",
            "--preset",
            "slow",
            "--width",
            "1280",
            "--height",
            "720",
            "--fast-start",
        ])
        .unwrap();

        match cli.command {
            Command::Video {
                codec,
                preset,
                width,
                fast_start,
                ..
            } => {
                assert_eq!(codec, VideoCodec::H265);
                assert_eq!(preset, Preset::Slow);
                assert_eq!(width, Some(1280));
                assert!(fast_start);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_audio_with_negative_target() {
        let cli = Cli::try_parse_from([
            "transcoder",
            "audio",
            "in.wav",
            "out.mp3",
            "--codec",
            "mp3",
            "--quality",
            "2",
            "--normalize",
            "--target-i",
            "-16",
        ])
        .unwrap();

        match cli.command {
            Command::Audio {
                normalize, target, ..
            } => {
                assert!(normalize);
                let resolved = target.resolve(LoudnessTarget::default());
                assert_eq!(resolved.input_i, -16.0);
                assert_eq!(resolved.input_lra, 7.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_codec_rejected() {
        let result = Cli::try_parse_from([
            "transcoder", "audio", "in.wav", "out.x", "--codec", "mp4", "--bitrate", "128",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_audio_options_rate_control() {
        let cbr = audio_options(AudioCodec::Mp3, Some(128), None, Some(44.1)).unwrap();
        assert_eq!(cbr.rate_control, RateControl::ConstantRate);

        let vbr = audio_options(AudioCodec::Mp3, None, Some(2.0), None).unwrap();
        assert_eq!(vbr.rate_control, RateControl::VariableRate);

        assert!(audio_options(AudioCodec::Mp3, None, None, None).is_err());
    }
}
