//! Subprocess request/response types for the script-backed probability source.

use std::time::Duration;

/// Arguments, environment and time limit for one run.
#[derive(Debug, Clone)]
pub struct ScriptInput {
    /// Appended after the program (and the script path, when interpreted).
    pub args: Vec<String>,
    pub env_vars: Vec<(String, String)>,
    /// `None` inherits the parent's working directory.
    pub working_directory: Option<String>,
    /// The child is killed once this elapses.
    pub timeout: Duration,
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Why a script could not be run to completion.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("Script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    IoError(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found() {
        let err = ScriptError::NotFound("/tmp/missing.py".to_string());
        assert_eq!(err.to_string(), "Script not found: /tmp/missing.py");
    }

    #[test]
    fn display_timeout() {
        let err = ScriptError::Timeout { elapsed_ms: 5000 };
        assert_eq!(err.to_string(), "Script timed out after 5000ms");
    }

    #[test]
    fn display_io_error() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file gone");
        let err = ScriptError::IoError(inner);
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file gone"));
    }

    #[test]
    fn error_source_only_for_io() {
        let err = ScriptError::IoError(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());

        let err = ScriptError::Timeout { elapsed_ms: 100 };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn success_means_exit_zero() {
        let mut output = ScriptOutput::default();
        assert!(output.success());
        output.exit_code = 2;
        assert!(!output.success());
    }
}
