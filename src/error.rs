//! Error handling module
//!
//! Provides the unified error type for the drift pipeline.
//! Only snapshot loading errors abort a run; everything raised while
//! generating recommendations is isolated to the column it belongs to.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load schema snapshot {}: {reason}", path.display())]
    SnapshotLoad { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable error code, embedded in failure markers and JSON output
    pub fn code(&self) -> &'static str {
        match self {
            AppError::SnapshotLoad { .. } => "SNAPSHOT_LOAD_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::SnapshotLoad { .. })
    }
}

/// Result type alias for pipeline operations
pub type AppResult<T> = Result<T, AppError>;

/// Helper function to create a snapshot load error
pub fn snapshot_error(path: &Path, reason: impl Into<String>) -> AppError {
    AppError::SnapshotLoad {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Helper function to create a generation error
pub fn generation_error(msg: impl Into<String>) -> AppError {
    AppError::Generation(msg.into())
}
