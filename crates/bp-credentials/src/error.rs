// error.rs — Error types for credential retrieval.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a secret.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No secret with this identifier exists in the store.
    #[error("secret not found: '{secret_id}'")]
    NotFound { secret_id: String },

    /// The secret exists but holds no usable value.
    #[error("secret '{secret_id}' is empty")]
    Empty { secret_id: String },

    /// The identifier could escape the store (path separators, `..`).
    #[error("invalid secret identifier: '{secret_id}'")]
    InvalidId { secret_id: String },

    /// Reading the secret from disk failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}
