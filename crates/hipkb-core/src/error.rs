//! Error types for the hipkb library.
//!
//! Archive decoding has its own typed error so batch drivers can record a
//! parse failure row and keep going; everything else funnels into [`HipError`].

use std::path::PathBuf;
use thiserror::Error;

/// Irrecoverable conditions raised by the archive reader.
///
/// These are the only failures `parse` can surface; everything else inside a
/// scene is tolerated and dropped.
#[derive(Debug, Error)]
pub enum ArchiveFormatError {
    #[error("gzip decompression failed: {message}")]
    Gzip { message: String },

    #[error("no CPIO magic found in archive head")]
    NoMagic,

    #[error("invalid CPIO header at offset {offset}")]
    BadHeader { offset: usize },
}

/// Main error type for hipkb operations.
#[derive(Debug, Error)]
pub enum HipError {
    #[error(transparent)]
    Archive(#[from] ArchiveFormatError),

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for hipkb operations.
pub type Result<T> = std::result::Result<T, HipError>;

// Conversion implementations for common error types

impl From<std::io::Error> for HipError {
    fn from(err: std::io::Error) -> Self {
        HipError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for HipError {
    fn from(err: serde_json::Error) -> Self {
        HipError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for HipError {
    fn from(err: rusqlite::Error) -> Self {
        HipError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for HipError {
    fn from(err: reqwest::Error) -> Self {
        HipError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl HipError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        HipError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this failure is a format failure that should be recorded as an
    /// error row on the archive's record rather than aborting the batch.
    pub fn is_format_failure(&self) -> bool {
        matches!(self, HipError::Archive(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_error_display() {
        let err = ArchiveFormatError::BadHeader { offset: 110 };
        assert_eq!(err.to_string(), "invalid CPIO header at offset 110");
        assert_eq!(
            ArchiveFormatError::NoMagic.to_string(),
            "no CPIO magic found in archive head"
        );
    }

    #[test]
    fn test_format_failure_classification() {
        let err: HipError = ArchiveFormatError::NoMagic.into();
        assert!(err.is_format_failure());

        let err = HipError::Config {
            message: "bad cache dir".into(),
        };
        assert!(!err.is_format_failure());
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = HipError::io_with_path(io, "/tmp/missing.hip");
        match err {
            HipError::Io { path, .. } => {
                assert_eq!(path.as_deref(), Some(std::path::Path::new("/tmp/missing.hip")));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
