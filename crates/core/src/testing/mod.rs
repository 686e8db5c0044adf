//! Testing utilities: a scripted stand-in for the ffmpeg/ffprobe binaries.
//!
//! [`MockSpawner`] replaces [`TokioSpawner`](crate::process::TokioSpawner) so
//! the controllers can be exercised without real binaries, and doubles as a
//! spy on spawn counts, argument vectors and kills.
//!
//! # Example
//!
//! ```rust,ignore
//! use transcoder_core::testing::{MockSpawner, ScriptedProcess};
//!
//! let spawner = MockSpawner::new();
//! spawner.push(ScriptedProcess::new().stdout("60.000000\n"));
//! spawner.push(ScriptedProcess::new().stdout("out_time=00:00:30.000000\n").stalled());
//! ```

mod mock_spawner;

pub use mock_spawner::{MockSpawner, RecordedSpawn, ScriptedProcess};
