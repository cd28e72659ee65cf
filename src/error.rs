use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for extraction, merge and sync operations
#[derive(Debug, Error)]
pub enum LocError {
    /// Scan or merge root does not exist or is not a directory
    #[error("Source directory not found: {path}\n\nTip: Check the path or run from the repository root")]
    RootNotFound { path: PathBuf },

    /// Failed to parse a YAML document (non-fatal per file, logged)
    #[error("Failed to parse YAML file {file}: {reason}")]
    YamlParse { file: PathBuf, reason: String },

    /// Translation catalog file is missing (merge aborts, no documents touched)
    #[error("Translation catalog not found: {path}\n\nTip: Run `extract` first or check the download path")]
    CatalogMissing { path: PathBuf },

    /// Translation catalog exists but is not valid JSON in either accepted shape
    #[error("Failed to read translation catalog {path}:\n{reason}\n\nTip: The catalog must be a JSON array of entries or a flat key-to-translation object")]
    CatalogFormat { path: PathBuf, reason: String },

    /// Remote service replied with a non-success status
    #[error("Remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Downloaded artifact could not be unpacked
    #[error("Failed to unpack downloaded artifact: {0}")]
    Artifact(String),

    /// Another extraction/merge/sync operation is already in flight
    #[error("An operation is already running.\n\nTip: Wait for it to finish or cancel it first")]
    Busy,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Generic(String),
}

impl LocError {
    /// Create a YamlParse error from a file path and reason
    pub fn yaml_parse(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::YamlParse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create a Remote error from a status code and message body
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }
}

/// Result type alias for LocError
pub type Result<T> = std::result::Result<T, LocError>;
