use std::path::PathBuf;

use thiserror::Error;

/// Errors that can be returned by civitai-fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The input does not contain a `/models/<id>` segment, or carries a
    /// non-numeric `modelVersionId`.
    #[error("invalid model URL: {url}")]
    InvalidUrl { url: String },

    /// The metadata endpoint answered with a non-200 status.
    #[error("metadata request failed with status {status}")]
    Remote { status: u16 },

    /// A file download answered with a non-200 status.
    #[error("download of {url} failed with status {status}")]
    Download { status: u16, url: String },

    /// The requested version id is not listed by the model.
    #[error("model version {version_id} not found")]
    VersionNotFound { version_id: u64 },

    /// The model lists no versions at all.
    #[error("model {model_id} has no versions")]
    NoVersionAvailable { model_id: u64 },

    /// The selected version lists no files.
    #[error("model version {version_id} has no downloadable files")]
    NoFileAvailable { version_id: u64 },

    /// The bytes written differ from the size advertised by the metadata.
    #[error("incomplete download {}: expected {expected} bytes, wrote {actual}", path.display())]
    IncompleteDownload {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Transport-level HTTP failure (connect, TLS, body read, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model page template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Errors raised while uploading a single file to the publishing service.
///
/// These never abort a batch; [`crate::publish::publish_dir`] records them
/// per file.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The hub answered with a non-success status.
    #[error("hub rejected {operation} with status {status}: {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The hub response was missing an expected field.
    #[error("invalid hub response: {message}")]
    InvalidResponse { message: String },
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
