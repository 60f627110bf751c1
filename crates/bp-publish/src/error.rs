// error.rs — Error types for publishing, configuration and the pipeline.

use std::path::PathBuf;
use thiserror::Error;

use bp_credentials::CredentialError;
use bp_storage::StorageError;

/// Errors a publish attempt can surface.
///
/// "Nothing to commit" is deliberately absent: unchanged content is a
/// successful [`crate::CommitRef`] with `created == false`.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The token was rejected (missing, invalid or expired).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The repository host could not be reached, the clone failed, or the
    /// invocation deadline passed.
    #[error("repository unreachable: {0}")]
    Unreachable(String),

    /// The remote refused the push (branch protection, non-fast-forward).
    #[error("push rejected: {0}")]
    PushRejected(String),

    /// Writing to the local working tree failed.
    #[error("local I/O error at {path}: {source}")]
    LocalIO {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The task violates a precondition (empty content, bad branch name).
    #[error("invalid publish task: {0}")]
    InvalidTask(String),
}

impl PublishError {
    /// Short stable label for logs and exit reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Unauthorized(_) => "unauthorized",
            PublishError::Unreachable(_) => "unreachable",
            PublishError::PushRejected(_) => "push_rejected",
            PublishError::LocalIO { .. } => "local_io",
            PublishError::InvalidTask(_) => "invalid_task",
        }
    }
}

/// Errors loading or validating a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from handling one trigger event end to end.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
