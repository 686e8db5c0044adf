//! Process invoker for the external media binaries.
//!
//! Spawning goes through the [`ProcessSpawner`] trait so the controllers can be
//! driven by the real [`TokioSpawner`] in production and by a scripted double in
//! tests. A spawned [`ChildProcess`] exposes its stdout and stderr pipes
//! separately, a single terminal [`ProcessExit`], and a forceful kill.

mod capture;
mod error;
mod lines;
mod spawner;
mod traits;
mod types;

pub use capture::{capture_output, CapturedOutput};
pub use error::ProcessError;
pub use lines::LineReader;
pub use spawner::TokioSpawner;
pub use traits::{BoxedReader, ChildProcess, ProcessSpawner};
pub use types::{signal_name, ProcessExit};
