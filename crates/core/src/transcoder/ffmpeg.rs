//! FFmpeg-based transcoder implementation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use super::args::{audio_args, loudness_args, thumbnail_args, version_args, video_args};
use super::config::{TranscoderConfig, VideoProgressBasis};
use super::error::TranscodeError;
use super::stream::{ProgressSink, ProgressStream};
use super::supervise::{supervise, tail_lines, Halt, StderrHandling};
use super::types::{AudioConvertOptions, VideoTranscodeOptions};
use crate::loudness::{normalization_filter, parse_loudness_stats, LoudnessEvent, LoudnessStats, LoudnessTarget};
use crate::probe::{FileInformation, Prober, StreamKind};
use crate::process::{capture_output, ChildProcess, ProcessExit, ProcessSpawner, TokioSpawner};
use crate::progress::{PhaseWeight, ProgressMarker, ProgressTracker, Stage, TranscodeProgressEvent};

/// Stderr lines attached to a failure.
const DIAGNOSTIC_TAIL: usize = 20;

/// First line of each binary's `-version` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolVersions {
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Runs ffmpeg and ffprobe jobs.
///
/// Streaming operations return a [`ProgressStream`] immediately and drive the
/// process on a spawned task, so they must be called inside a Tokio runtime.
/// Invalid options are rejected before anything is spawned.
#[derive(Clone)]
pub struct Transcoder {
    config: Arc<TranscoderConfig>,
    spawner: Arc<dyn ProcessSpawner>,
    prober: Prober,
}

impl Transcoder {
    /// Creates a transcoder that runs real processes.
    pub fn new(config: TranscoderConfig) -> Self {
        Self::with_spawner(config, Arc::new(TokioSpawner::new()))
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Creates a transcoder that starts processes through `spawner`.
    pub fn with_spawner(config: TranscoderConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        let prober = Prober::new(config.ffprobe_path.clone(), Arc::clone(&spawner));
        Self {
            config: Arc::new(config),
            spawner,
            prober,
        }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// See [`Prober::probe`].
    pub async fn probe(&self, path: &Path) -> Result<FileInformation, TranscodeError> {
        self.prober.probe(path).await
    }

    /// See [`Prober::stream_duration`].
    pub async fn stream_duration(&self, path: &Path, kind: StreamKind) -> Result<u64, TranscodeError> {
        self.prober.stream_duration(path, kind).await
    }

    /// See [`Prober::packet_count`].
    pub async fn packet_count(&self, path: &Path, kind: StreamKind) -> Result<u64, TranscodeError> {
        self.prober.packet_count(path, kind).await
    }

    /// Transcodes the video of `input` into `output`.
    ///
    /// Progress is measured against the video stream's duration (or packet
    /// count, depending on configuration); each whole percentage is reported
    /// once with stage `transcoding`.
    pub fn transcode_video(
        &self,
        input: &Path,
        output: &Path,
        options: &VideoTranscodeOptions,
    ) -> Result<ProgressStream<TranscodeProgressEvent>, TranscodeError> {
        options.validate()?;

        let span = tracing::info_span!(
            "transcode_video",
            invocation = %Uuid::new_v4(),
            input = %input.display(),
            output = %output.display(),
            codec = options.codec.ffmpeg_codec(),
            pid = tracing::field::Empty,
        );
        let (sink, stream) = ProgressStream::channel(self.config.channel_capacity);
        let this = self.clone();
        let (input, output, options) = (input.to_path_buf(), output.to_path_buf(), options.clone());

        tokio::spawn(
            async move {
                let outcome = this.video_job(&input, &output, &options, &sink).await;
                sink.conclude(outcome).await;
            }
            .instrument(span),
        );
        Ok(stream)
    }

    /// Transcodes the audio of `input` into `output`.
    ///
    /// With a `normalization` target the job runs in two phases: a loudness
    /// analysis reported as 0-49% with stage `obtaining normalization values`,
    /// then the encoding seeded with the measurements reported as 50-100%.
    /// A failure in the first phase ends the stream without starting the
    /// second.
    pub fn transcode_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &AudioConvertOptions,
        normalization: Option<LoudnessTarget>,
    ) -> Result<ProgressStream<TranscodeProgressEvent>, TranscodeError> {
        options.validate()?;
        if let Some(target) = &normalization {
            target.validate()?;
        }

        let span = tracing::info_span!(
            "transcode_audio",
            invocation = %Uuid::new_v4(),
            input = %input.display(),
            output = %output.display(),
            codec = options.codec.ffmpeg_codec(),
            normalized = normalization.is_some(),
            pid = tracing::field::Empty,
        );
        let (sink, stream) = ProgressStream::channel(self.config.channel_capacity);
        let this = self.clone();
        let (input, output, options) = (input.to_path_buf(), output.to_path_buf(), options.clone());

        tokio::spawn(
            async move {
                let outcome = this
                    .audio_job(&input, &output, &options, normalization, &sink)
                    .await;
                sink.conclude(outcome).await;
            }
            .instrument(span),
        );
        Ok(stream)
    }

    /// Measures the loudness of `input` without writing anything.
    ///
    /// The stream yields progress events followed by a single
    /// [`LoudnessEvent::Stats`] as its last element.
    pub fn measure_loudness(
        &self,
        input: &Path,
        target: &LoudnessTarget,
    ) -> Result<ProgressStream<LoudnessEvent>, TranscodeError> {
        target.validate()?;

        let span = tracing::info_span!(
            "measure_loudness",
            invocation = %Uuid::new_v4(),
            input = %input.display(),
            pid = tracing::field::Empty,
        );
        let (sink, stream) = ProgressStream::channel(self.config.channel_capacity);
        let this = self.clone();
        let (input, target) = (input.to_path_buf(), *target);

        tokio::spawn(
            async move {
                let outcome = this.measure_job(&input, &target, &sink).await;
                sink.conclude(outcome).await;
            }
            .instrument(span),
        );
        Ok(stream)
    }

    /// Writes the frame at `timestamp` (e.g. `00:00:01.000`) to `output`.
    pub async fn thumbnail_at(
        &self,
        input: &Path,
        timestamp: &str,
        output: &Path,
    ) -> Result<(), TranscodeError> {
        if timestamp.trim().is_empty() {
            return Err(TranscodeError::precondition("timestamp must not be empty"));
        }

        let span = tracing::info_span!(
            "thumbnail",
            invocation = %Uuid::new_v4(),
            input = %input.display(),
            timestamp = timestamp,
            pid = tracing::field::Empty,
        );
        async {
            let child = self.spawn_ffmpeg(&thumbnail_args(input, timestamp, output))?;
            let captured = capture_output(child).await?;

            let policy = self.config.stderr_policy;
            if let Some(line) = captured.stderr.lines().find(|line| policy.is_fatal(line)) {
                return Err(TranscodeError::process_failed(
                    format!("ffmpeg reported: {}", line.trim()),
                    Some(captured.exit.clone()),
                    Some(tail_lines(&captured.stderr, DIAGNOSTIC_TAIL)),
                ));
            }
            self.check_exit(&captured.exit, &captured.stderr)?;

            info!(output = %output.display(), "Thumbnail written");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Checks that both binaries can be run.
    pub async fn validate(&self) -> Result<ToolVersions, TranscodeError> {
        let ffmpeg = self.version_of(&self.config.ffmpeg_path).await?;
        let ffprobe = self.version_of(&self.config.ffprobe_path).await?;
        Ok(ToolVersions { ffmpeg, ffprobe })
    }

    async fn version_of(&self, program: &Path) -> Result<String, TranscodeError> {
        let child = self.spawner.spawn(program, &version_args())?;
        let captured = capture_output(child).await?;
        if !captured.exit.success() {
            return Err(TranscodeError::process_failed(
                format!("{} -version exited with {}", program.display(), captured.exit),
                Some(captured.exit),
                Some(tail_lines(&captured.stderr, DIAGNOSTIC_TAIL)),
            ));
        }

        let version = captured.stdout.lines().next().unwrap_or_default().trim().to_string();
        info!(program = %program.display(), version = %version, "Binary available");
        Ok(version)
    }

    async fn video_job(
        &self,
        input: &Path,
        output: &Path,
        options: &VideoTranscodeOptions,
        sink: &ProgressSink<TranscodeProgressEvent>,
    ) -> Result<(), Halt> {
        let (marker, total) = match self.config.video_progress {
            VideoProgressBasis::Duration => (
                ProgressMarker::OutTime,
                sink.or_cancelled(self.prober.stream_duration(input, StreamKind::Video))
                    .await?,
            ),
            VideoProgressBasis::Frames => (
                ProgressMarker::Frame,
                sink.or_cancelled(self.prober.packet_count(input, StreamKind::Video))
                    .await?,
            ),
        };
        if total == 0 {
            warn!("Video stream has zero length, no progress will be reported");
        }

        let child = self.spawn_ffmpeg(&video_args(input, output, options)?)?;
        let mut tracker = ProgressTracker::new(marker, total, Stage::Transcoding)
            .with_clamp(self.config.clamp_percentage);
        let finished = supervise(child, sink, self.stderr_handling(), |line| {
            tracker.feed_line(line)
        })
        .await?;
        self.check_exit(&finished.exit, &finished.diagnostics)?;

        info!(last = ?tracker.last_total(), "Video transcode finished");
        Ok(())
    }

    async fn audio_job(
        &self,
        input: &Path,
        output: &Path,
        options: &AudioConvertOptions,
        normalization: Option<LoudnessTarget>,
        sink: &ProgressSink<TranscodeProgressEvent>,
    ) -> Result<(), Halt> {
        let duration = sink
            .or_cancelled(self.prober.stream_duration(input, StreamKind::Audio))
            .await?;
        if duration == 0 {
            warn!("Audio stream has zero length, no progress will be reported");
        }

        let (loudnorm, weight, last_total) = match normalization {
            Some(target) => {
                let mut tracker = ProgressTracker::new(
                    ProgressMarker::OutTime,
                    duration,
                    Stage::ObtainingNormalizationValues,
                )
                .with_weight(PhaseWeight::FirstHalf);
                let analysis = self
                    .analyze_loudness(input, &target, sink, |line| tracker.feed_line(line))
                    .await;
                if sink.is_stopped() {
                    info!("Stopped during loudness analysis, skipping encode");
                    return Ok(());
                }
                let stats = analysis?;
                debug!(
                    input_i = stats.input_i,
                    input_tp = stats.input_tp,
                    input_lra = stats.input_lra,
                    "Measured loudness"
                );
                (
                    Some(normalization_filter(&target, &stats)),
                    PhaseWeight::SecondHalf,
                    tracker.last_total(),
                )
            }
            None => (None, PhaseWeight::Whole, None),
        };

        let args = audio_args(input, output, options, loudnorm.as_deref())?;
        let child = self.spawn_ffmpeg(&args)?;
        let mut tracker = ProgressTracker::new(ProgressMarker::OutTime, duration, Stage::Transcoding)
            .with_weight(weight)
            .with_clamp(self.config.clamp_percentage)
            .after(last_total);
        let finished = supervise(child, sink, self.stderr_handling(), |line| {
            tracker.feed_line(line)
        })
        .await?;
        self.check_exit(&finished.exit, &finished.diagnostics)?;

        info!(last = ?tracker.last_total(), "Audio transcode finished");
        Ok(())
    }

    async fn measure_job(
        &self,
        input: &Path,
        target: &LoudnessTarget,
        sink: &ProgressSink<LoudnessEvent>,
    ) -> Result<(), Halt> {
        let duration = sink
            .or_cancelled(self.prober.stream_duration(input, StreamKind::Audio))
            .await?;

        let mut tracker = ProgressTracker::new(
            ProgressMarker::OutTime,
            duration,
            Stage::ObtainingNormalizationValues,
        )
        .with_clamp(self.config.clamp_percentage);
        let stats = self
            .analyze_loudness(input, target, sink, |line| {
                tracker.feed_line(line).map(LoudnessEvent::Progress)
            })
            .await?;

        info!(input_i = stats.input_i, "Loudness measured");
        sink.emit(LoudnessEvent::Stats(stats)).await
    }

    /// Runs the `loudnorm` analysis pass, publishing whatever `on_line` maps
    /// progress lines to.
    async fn analyze_loudness<T, F>(
        &self,
        input: &Path,
        target: &LoudnessTarget,
        sink: &ProgressSink<T>,
        on_line: F,
    ) -> Result<LoudnessStats, Halt>
    where
        F: FnMut(&str) -> Option<T>,
    {
        let child = self.spawn_ffmpeg(&loudness_args(input, target))?;
        // The analysis pass runs at the default log level; its stderr carries
        // the banner and the statistics block.
        let finished = supervise(child, sink, StderrHandling::Collect, on_line).await?;

        if !finished.exit.success() && self.config.check_exit_status {
            return Err(TranscodeError::process_failed(
                format!("ffmpeg loudness analysis exited with {}", finished.exit),
                Some(finished.exit),
                Some(tail_lines(&finished.diagnostics, DIAGNOSTIC_TAIL)),
            )
            .into());
        }
        Ok(parse_loudness_stats(&finished.diagnostics)?)
    }

    fn spawn_ffmpeg(&self, args: &[String]) -> Result<Box<dyn ChildProcess>, TranscodeError> {
        debug!(program = %self.config.ffmpeg_path.display(), args = ?args, "Running ffmpeg");
        let child = self.spawner.spawn(&self.config.ffmpeg_path, args)?;
        if let Some(pid) = child.id() {
            Span::current().record("pid", pid);
        }
        Ok(child)
    }

    fn stderr_handling(&self) -> StderrHandling {
        StderrHandling::Judge(self.config.stderr_policy)
    }

    fn check_exit(&self, exit: &ProcessExit, diagnostics: &str) -> Result<(), TranscodeError> {
        if exit.success() {
            return Ok(());
        }
        if !self.config.check_exit_status {
            warn!(exit = %exit, "ffmpeg exited unsuccessfully, ignoring");
            return Ok(());
        }
        Err(TranscodeError::process_failed(
            format!("ffmpeg exited with {}", exit),
            Some(exit.clone()),
            (!diagnostics.is_empty()).then(|| tail_lines(diagnostics, DIAGNOSTIC_TAIL)),
        ))
    }
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Output path for a thumbnail of `input` next to it, e.g. `clip.mp4` to
/// `clip.thumb.png`.
pub fn default_thumbnail_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string());
    input.with_file_name(format!("{}.thumb.png", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSpawner, ScriptedProcess};
    use crate::transcoder::types::{AudioCodec, VideoCodec};
    use futures::StreamExt;

    fn transcoder(mock: &MockSpawner) -> Transcoder {
        Transcoder::with_spawner(TranscoderConfig::default(), Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_invalid_audio_options_spawn_nothing() {
        let mock = MockSpawner::new();
        let mut options = AudioConvertOptions::constant(AudioCodec::Mp3, 128);
        options.bitrate = None;

        let result = transcoder(&mock).transcode_audio(
            Path::new("in.wav"),
            Path::new("out.mp3"),
            &options,
            None,
        );
        assert!(matches!(result, Err(TranscodeError::Precondition { .. })));
        assert_eq!(mock.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_loudness_target_spawns_nothing() {
        let mock = MockSpawner::new();
        let result = transcoder(&mock)
            .measure_loudness(Path::new("in.wav"), &LoudnessTarget::ebu_r128(0.0, 7.0, -2.0));
        assert!(matches!(result, Err(TranscodeError::Precondition { .. })));
        assert_eq!(mock.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_video_uses_frame_count_when_configured() {
        let mock = MockSpawner::new();
        mock.push(ScriptedProcess::new().stdout("200\n"));
        mock.push(ScriptedProcess::new().stdout("frame=50\nframe=100\nframe=200\n"));

        let config = TranscoderConfig::default().with_video_progress(VideoProgressBasis::Frames);
        let transcoder = Transcoder::with_spawner(config, Arc::new(mock.clone()));
        let stream = transcoder
            .transcode_video(
                Path::new("in.mkv"),
                Path::new("out.mp4"),
                &VideoTranscodeOptions::new(VideoCodec::H264),
            )
            .unwrap();

        let totals: Vec<u32> = stream.map(|e| e.unwrap().total).collect().await;
        assert_eq!(totals, vec![25, 50, 100]);
        assert!(mock.spawns()[0].command_line().contains("stream=nb_read_packets"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_stream() {
        let mock = MockSpawner::new();
        mock.push(ScriptedProcess::new().stdout("10\n"));
        mock.push(
            ScriptedProcess::new()
                .stdout("out_time=00:00:05.000000\n")
                .exit(ProcessExit::with_code(1)),
        );

        let stream = transcoder(&mock)
            .transcode_audio(
                Path::new("in.wav"),
                Path::new("out.mp3"),
                &AudioConvertOptions::constant(AudioCodec::Mp3, 128),
                None,
            )
            .unwrap();
        let err = stream.finish().await.unwrap_err();
        assert!(err.to_string().contains("exit code 1"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_tolerated_when_unchecked() {
        let mock = MockSpawner::new();
        mock.push(ScriptedProcess::new().stdout("10\n"));
        mock.push(
            ScriptedProcess::new()
                .stdout("out_time=00:00:10.000000\n")
                .exit(ProcessExit::with_code(1)),
        );

        let mut config = TranscoderConfig::default();
        config.check_exit_status = false;
        let transcoder = Transcoder::with_spawner(config, Arc::new(mock.clone()));
        let last = transcoder
            .transcode_audio(
                Path::new("in.wav"),
                Path::new("out.mp3"),
                &AudioConvertOptions::constant(AudioCodec::Mp3, 128),
                None,
            )
            .unwrap()
            .finish()
            .await
            .unwrap();
        assert_eq!(last.map(|e| e.total), Some(100));
    }

    #[tokio::test]
    async fn test_validate_reports_versions() {
        let mock = MockSpawner::new();
        mock.push(ScriptedProcess::new().stdout("ffmpeg version 6.1.1\nbuilt with gcc\n"));
        mock.push(ScriptedProcess::new().stdout("ffprobe version 6.1.1\n"));

        let versions = transcoder(&mock).validate().await.unwrap();
        assert_eq!(versions.ffmpeg, "ffmpeg version 6.1.1");
        assert_eq!(versions.ffprobe, "ffprobe version 6.1.1");
        assert_eq!(mock.spawns()[1].program, PathBuf::from("ffprobe"));
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let mock = MockSpawner::new();
        mock.push(ScriptedProcess::not_found());

        let err = transcoder(&mock).validate().await.unwrap_err();
        assert_eq!(err.kind(), crate::transcoder::ErrorKind::Spawn);
    }

    #[test]
    fn test_default_thumbnail_path() {
        assert_eq!(
            default_thumbnail_path(Path::new("/media/clip.mp4")),
            PathBuf::from("/media/clip.thumb.png")
        );
    }
}
