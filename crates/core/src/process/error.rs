//! Error types for the process module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or supervising a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The binary does not exist or is not on `PATH`.
    #[error("Binary not found at path: {path}")]
    NotFound { path: PathBuf },

    /// The OS refused to start the binary.
    #[error("Failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipe that should have been captured was not.
    #[error("{stream} of the child process was not captured")]
    MissingPipe { stream: &'static str },

    /// I/O error while reading pipes, waiting or killing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Maps a spawn failure to `NotFound` or `Spawn`.
    pub fn from_spawn(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Spawn { path, source }
        }
    }

    /// Whether the process never started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Spawn { .. })
    }
}
