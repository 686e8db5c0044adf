//! Scripted process spawner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::Notify;

use crate::process::{BoxedReader, ChildProcess, ProcessError, ProcessExit, ProcessSpawner};

/// Script for one child process.
///
/// Scripts are consumed in the order they were pushed, one per spawn.
#[derive(Debug, Clone)]
pub struct ScriptedProcess {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit: ProcessExit,
    stalled: bool,
    stdin_closed: bool,
    spawn_error: Option<io::ErrorKind>,
}

impl Default for ScriptedProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProcess {
    /// A process that writes nothing and exits with code 0.
    pub fn new() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: ProcessExit::with_code(0),
            stalled: false,
            stdin_closed: false,
            spawn_error: None,
        }
    }

    /// A spawn that fails because the binary does not exist.
    pub fn not_found() -> Self {
        Self::spawn_failure(io::ErrorKind::NotFound)
    }

    /// A spawn that fails with the given error kind.
    pub fn spawn_failure(kind: io::ErrorKind) -> Self {
        Self {
            spawn_error: Some(kind),
            ..Self::new()
        }
    }

    /// Appends bytes to stdout.
    pub fn stdout(mut self, data: impl AsRef<[u8]>) -> Self {
        self.stdout.extend_from_slice(data.as_ref());
        self
    }

    /// Appends bytes to stderr.
    pub fn stderr(mut self, data: impl AsRef<[u8]>) -> Self {
        self.stderr.extend_from_slice(data.as_ref());
        self
    }

    /// Sets the exit reported once the pipes are drained.
    pub fn exit(mut self, exit: ProcessExit) -> Self {
        self.exit = exit;
        self
    }

    /// After writing its output the process hangs until killed or told to
    /// quit. A quit closes its pipes and reports the scripted exit.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// The process has no usable stdin, so a quit request turns into a kill.
    pub fn without_stdin(mut self) -> Self {
        self.stdin_closed = true;
        self
    }
}

/// A spawn observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedSpawn {
    /// Program that was requested.
    pub program: PathBuf,
    /// Argument vector that was requested.
    pub args: Vec<String>,
    state: Arc<ChildState>,
}

impl RecordedSpawn {
    /// Whether the child was killed, explicitly or by being dropped unreaped.
    pub fn was_killed(&self) -> bool {
        self.state.killed.load(Ordering::SeqCst)
    }

    /// Whether the child received the quit command on stdin.
    pub fn was_quit(&self) -> bool {
        self.state.quit.load(Ordering::SeqCst)
    }

    /// The argument vector joined with spaces.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Debug, Default)]
struct ChildState {
    killed: AtomicBool,
    quit: AtomicBool,
    exit_notify: Notify,
    /// Write halves of stalled pipes; dropping them ends the output.
    writers: Mutex<Vec<DuplexStream>>,
}

impl ChildState {
    fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        self.release();
    }

    fn quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.release();
    }

    fn exited(&self) -> bool {
        self.killed.load(Ordering::SeqCst) || self.quit.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.writers.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.exit_notify.notify_one();
    }
}

#[derive(Debug, Default)]
struct Inner {
    scripts: VecDeque<ScriptedProcess>,
    spawns: Vec<RecordedSpawn>,
}

/// Mock implementation of [`ProcessSpawner`].
///
/// Acts as a spy: every spawn attempt is recorded with its program and
/// arguments, including attempts that fail.
///
/// # Example
///
/// ```rust,ignore
/// use transcoder_core::testing::{MockSpawner, ScriptedProcess};
///
/// let spawner = MockSpawner::new();
/// spawner.push(ScriptedProcess::new().stdout("10.000000\n"));
/// spawner.push(ScriptedProcess::new().stdout("out_time=00:00:05.000000\n"));
///
/// let transcoder = Transcoder::with_spawner(TranscoderConfig::default(), Arc::new(spawner.clone()));
/// // ...
/// assert_eq!(spawner.spawn_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSpawner {
    inner: Arc<Mutex<Inner>>,
}

impl MockSpawner {
    /// Creates a spawner with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues the script for the next spawn.
    pub fn push(&self, script: ScriptedProcess) {
        self.lock().scripts.push_back(script);
    }

    /// All recorded spawn attempts, in order.
    pub fn spawns(&self) -> Vec<RecordedSpawn> {
        self.lock().spawns.clone()
    }

    /// Number of spawn attempts.
    pub fn spawn_count(&self) -> usize {
        self.lock().spawns.len()
    }

    /// Number of children that were killed.
    pub fn killed_count(&self) -> usize {
        self.lock().spawns.iter().filter(|s| s.was_killed()).count()
    }

    /// Scripts not consumed yet.
    pub fn remaining_scripts(&self) -> usize {
        self.lock().scripts.len()
    }
}

impl ProcessSpawner for MockSpawner {
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, ProcessError> {
        let mut inner = self.lock();
        let state = Arc::new(ChildState::default());
        inner.spawns.push(RecordedSpawn {
            program: program.to_path_buf(),
            args: args.to_vec(),
            state: Arc::clone(&state),
        });

        let script = inner.scripts.pop_front().ok_or_else(|| ProcessError::Spawn {
            path: program.to_path_buf(),
            source: io::Error::other("no scripted process left"),
        })?;

        if let Some(kind) = script.spawn_error {
            return Err(ProcessError::from_spawn(program, io::Error::from(kind)));
        }

        let stdout = pipe(script.stdout, script.stalled, &state);
        let stderr = pipe(script.stderr, script.stalled, &state);

        Ok(Box::new(MockChild {
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit: script.exit,
            stalled: script.stalled,
            stdin_closed: script.stdin_closed,
            state,
            reaped: false,
        }))
    }
}

/// Scripted output; a stalled pipe stays open until the child exits.
fn pipe(data: Vec<u8>, stalled: bool, state: &ChildState) -> BoxedReader {
    let cursor = io::Cursor::new(data);
    if stalled {
        let (reader, writer) = tokio::io::duplex(64);
        state
            .writers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(writer);
        Box::pin(cursor.chain(reader))
    } else {
        Box::pin(cursor)
    }
}

struct MockChild {
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
    exit: ProcessExit,
    stalled: bool,
    stdin_closed: bool,
    state: Arc<ChildState>,
    reaped: bool,
}

#[async_trait]
impl ChildProcess for MockChild {
    fn id(&self) -> Option<u32> {
        if self.reaped {
            None
        } else {
            Some(4242)
        }
    }

    fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.stderr.take()
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        if self.stalled {
            while !self.state.exited() {
                self.state.exit_notify.notified().await;
            }
        }
        self.reaped = true;

        if self.state.killed.load(Ordering::SeqCst) {
            Ok(ProcessExit::with_signal("SIGKILL"))
        } else {
            Ok(self.exit.clone())
        }
    }

    async fn quit(&mut self) -> Result<(), ProcessError> {
        if self.stdin_closed {
            return self.start_kill();
        }
        if !self.reaped {
            self.state.quit();
        }
        Ok(())
    }

    fn start_kill(&mut self) -> Result<(), ProcessError> {
        if !self.reaped {
            self.state.kill();
        }
        Ok(())
    }
}

impl Drop for MockChild {
    fn drop(&mut self) {
        if !self.reaped {
            self.state.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_spawns_and_replays_output() {
        let spawner = MockSpawner::new();
        spawner.push(
            ScriptedProcess::new()
                .stdout("hello\n")
                .stderr("warn\n")
                .exit(ProcessExit::with_code(2)),
        );

        let args = vec!["-v".to_string(), "error".to_string()];
        let mut child = spawner.spawn(Path::new("ffmpeg"), &args).unwrap();

        let mut out = String::new();
        child
            .take_stdout()
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
        assert_eq!(child.wait().await.unwrap(), ProcessExit::with_code(2));

        let spawns = spawner.spawns();
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].command_line(), "-v error");
        assert!(!spawns[0].was_killed());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let spawner = MockSpawner::new();
        spawner.push(ScriptedProcess::not_found());

        let result = spawner.spawn(Path::new("ffmpeg"), &[]);
        assert!(matches!(result, Err(ProcessError::NotFound { .. })));
        assert_eq!(spawner.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_scripts_fail() {
        let spawner = MockSpawner::new();
        assert!(matches!(
            spawner.spawn(Path::new("ffmpeg"), &[]),
            Err(ProcessError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_stalled_child_exits_when_killed() {
        let spawner = MockSpawner::new();
        spawner.push(ScriptedProcess::new().stalled());

        let mut child = spawner.spawn(Path::new("ffmpeg"), &[]).unwrap();
        let exit = child.kill().await.unwrap();

        assert_eq!(exit.signal.as_deref(), Some("SIGKILL"));
        assert_eq!(spawner.killed_count(), 1);
    }

    #[tokio::test]
    async fn test_quit_releases_stalled_child() {
        let spawner = MockSpawner::new();
        spawner.push(ScriptedProcess::new().stdout("partial\n").stalled());

        let mut child = spawner.spawn(Path::new("ffmpeg"), &[]).unwrap();
        let mut stdout = child.take_stdout().unwrap();
        child.quit().await.unwrap();

        let mut out = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "partial\n");
        assert!(child.wait().await.unwrap().success());

        let spawn = &spawner.spawns()[0];
        assert!(spawn.was_quit());
        assert!(!spawn.was_killed());
    }

    #[tokio::test]
    async fn test_quit_without_stdin_kills() {
        let spawner = MockSpawner::new();
        spawner.push(ScriptedProcess::new().stalled().without_stdin());

        let mut child = spawner.spawn(Path::new("ffmpeg"), &[]).unwrap();
        child.quit().await.unwrap();

        let exit = child.wait().await.unwrap();
        assert_eq!(exit.signal.as_deref(), Some("SIGKILL"));
        assert!(!spawner.spawns()[0].was_quit());
    }

    #[tokio::test]
    async fn test_dropping_unreaped_child_kills_it() {
        let spawner = MockSpawner::new();
        spawner.push(ScriptedProcess::new().stalled());

        let child = spawner.spawn(Path::new("ffmpeg"), &[]).unwrap();
        drop(child);

        assert!(spawner.spawns()[0].was_killed());
    }
}
