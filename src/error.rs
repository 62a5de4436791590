//! Error types for analysis runs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by discovery, configuration and the per-file stages.
///
/// Only [`AnalysisError::RootNotFound`] and configuration errors stop a
/// run; the per-file variants are recorded as skipped files.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("root path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("analysis of {path} panicked: {message}")]
    Panicked { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = AnalysisError::Unreadable {
            path: "img/logo.png".to_string(),
            reason: "binary content".to_string(),
        };
        assert_eq!(err.to_string(), "cannot read img/logo.png: binary content");

        let err = AnalysisError::RootNotFound(PathBuf::from("/no/such/dir"));
        assert_eq!(err.to_string(), "root path does not exist: /no/such/dir");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnalysisError = io.into();
        assert!(matches!(err, AnalysisError::Io(_)));
        assert_eq!(err.to_string(), "denied");
    }
}
