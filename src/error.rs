//! Error types for resolving the run and moving files.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors; the run aborts before any file is touched.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Input and output directories cannot be the same: {path}")]
    SameDirectory { path: PathBuf },

    #[error("Input directory not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Input path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Cannot resolve output directory {path}: {source}")]
    OutputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::InputNotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Per-file failure while moving; reported and skipped.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("Failed to move {src} -> {dst}: {source}")]
    Io {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_input_not_found() {
        let err = SweepError::io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, SweepError::InputNotFound { .. }));
        assert_eq!(err.to_string(), "Input directory not found: /nope");
    }

    #[test]
    fn test_io_other_kind_keeps_source() {
        let err = SweepError::io(
            "/locked",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SweepError::Io { .. }));
        assert!(err.to_string().contains("denied"));
    }
}
