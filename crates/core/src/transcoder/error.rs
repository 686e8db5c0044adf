//! Error types for the transcoder module.

use thiserror::Error;

use crate::process::{ProcessError, ProcessExit};

/// Broad category of a [`TranscodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The binary could not be started at all.
    Spawn,
    /// The tool ran and failed (non-zero exit, fatal stderr, pipe I/O).
    Runtime,
    /// The tool ran but its output could not be understood.
    Parse,
    /// The request was rejected before any process was spawned.
    Precondition,
}

/// Errors that can occur while probing or transcoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Starting or supervising a child process failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The external tool reported a failure.
    #[error("Process failed: {reason}")]
    ProcessFailed {
        reason: String,
        exit: Option<ProcessExit>,
        stderr: Option<String>,
    },

    /// Output of the external tool could not be parsed.
    #[error("Failed to parse tool output: {reason}")]
    Parse { reason: String },

    /// Invalid options, detected before spawning.
    #[error("Invalid options: {reason}")]
    Precondition { reason: String },
}

impl TranscodeError {
    /// Creates a process failure with optional captured stderr.
    pub fn process_failed(
        reason: impl Into<String>,
        exit: Option<ProcessExit>,
        stderr: Option<String>,
    ) -> Self {
        Self::ProcessFailed {
            reason: reason.into(),
            exit,
            stderr,
        }
    }

    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Process(e) if e.is_spawn_failure() => ErrorKind::Spawn,
            Self::Process(_) | Self::ProcessFailed { .. } => ErrorKind::Runtime,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Precondition { .. } => ErrorKind::Precondition,
        }
    }

    /// Captured stderr output, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ProcessFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
