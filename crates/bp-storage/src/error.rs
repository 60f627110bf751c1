// error.rs — Error types for trigger parsing and object retrieval.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading triggers or objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist in the bucket.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// A key or bucket name would resolve outside the store root.
    #[error("path traversal detected: '{path}'")]
    PathTraversal { path: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The trigger document is not valid JSON or has the wrong shape.
    #[error("malformed trigger: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    /// An object key could not be percent-decoded.
    #[error("invalid object key encoding: '{key}'")]
    InvalidKey { key: String },
}
