//! Result and error types for Sanar.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Sanar operations
pub type SanarResult<T> = Result<T, SanarError>;

/// Errors that can occur in Sanar
#[derive(Debug, Error)]
pub enum SanarError {
    /// UI tree snapshot could not be parsed
    #[error("UI tree parse error: {message}")]
    TreeParse {
        /// Error message
        message: String,
    },

    /// Locator string could not be parsed for the requested dialect
    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator {
        /// Offending locator
        locator: String,
        /// Error message
        message: String,
    },

    /// Candidate generation failed
    #[error("Candidate generation failed: {message}")]
    Generation {
        /// Error message
        message: String,
    },

    /// Test script could not be parsed
    #[error("Failed to parse script {path}: {message}")]
    ScriptParse {
        /// Script path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    FileRead {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File could not be written
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Several independent artifacts failed; each failure is kept
    #[error("{} artifact(s) failed: {}", .errors.len(), summarize(.errors))]
    Partial {
        /// Individual failures, in processing order
        errors: Vec<SanarError>,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SanarError {
    /// Create a read error for `path`
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a write error for `path`
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Collapse a list of failures into a single error, if any.
    pub fn from_failures(mut errors: Vec<SanarError>) -> SanarResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Partial { errors }),
        }
    }
}

fn summarize(errors: &[SanarError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_names_path() {
        let err = SanarError::read(
            "tests/login.robot",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("tests/login.robot"));
    }

    #[test]
    fn test_from_failures_empty_is_ok() {
        assert!(SanarError::from_failures(Vec::new()).is_ok());
    }

    #[test]
    fn test_from_failures_single_is_unwrapped() {
        let err = SanarError::from_failures(vec![SanarError::config("bad")]).unwrap_err();
        assert!(matches!(err, SanarError::Config { .. }));
    }

    #[test]
    fn test_from_failures_many_lists_all() {
        let err = SanarError::from_failures(vec![
            SanarError::write("a.robot", std::io::Error::other("denied")),
            SanarError::write("b.robot", std::io::Error::other("denied")),
        ])
        .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("2 artifact(s) failed"));
        assert!(text.contains("a.robot"));
        assert!(text.contains("b.robot"));
    }
}
