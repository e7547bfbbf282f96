use std::path::PathBuf;
use thiserror::Error;

use crate::case::CaseError;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Test case not found: {0}")]
    CaseNotFound(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Target registry not found at {0}")]
    TargetsNotFound(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed test case at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: CaseError,
    },

    #[error("Test case has no usable identity: {0}")]
    Unidentified(#[from] CaseError),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, source: CaseError) -> Self {
        StorageError::Malformed {
            path: path.into(),
            source,
        }
    }
}
