//! Types shared by process implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal event of a child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code, absent when the process was terminated by a signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Name of the terminating signal (e.g. `SIGKILL`), Unix only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

impl ProcessExit {
    /// A normal exit with the given code.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// A termination by the given signal.
    pub fn with_signal(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status
                .signal()
                .map(|sig| signal_name(sig).map_or_else(|| format!("SIG{}", sig), str::to_string))
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Returns the conventional name of a POSIX signal number.
pub fn signal_name(signal: i32) -> Option<&'static str> {
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        6 => "SIGABRT",
        8 => "SIGFPE",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_zero_code() {
        assert!(ProcessExit::with_code(0).success());
        assert!(!ProcessExit::with_code(1).success());
        assert!(!ProcessExit::with_signal("SIGKILL").success());
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(9), Some("SIGKILL"));
        assert_eq!(signal_name(15), Some("SIGTERM"));
        assert_eq!(signal_name(64), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProcessExit::with_code(1).to_string(), "exit code 1");
        assert_eq!(
            ProcessExit::with_signal("SIGKILL").to_string(),
            "signal SIGKILL"
        );
    }
}
