//! Core RepositoryPublisher trait

use std::time::Instant;

use crate::error::PublishError;
use crate::task::{CommitRef, PublishTask};

pub type Result<T> = std::result::Result<T, PublishError>;

/// Backend that lands a task's content on a remote branch.
///
/// Implementations must leave the remote untouched unless the full
/// commit and push succeed, must treat byte-identical content as a
/// successful no-op, and must give up with [`PublishError::Unreachable`]
/// once `deadline` has passed.
pub trait RepositoryPublisher: Send + Sync {
    /// Clone, write, commit and push `task` to its target branch.
    ///
    /// For git: `ls-remote` + `fetch` + `add` + `commit` + `push`
    /// For the in-memory fake: a map update
    fn publish(&self, task: &PublishTask, deadline: Instant) -> Result<CommitRef>;

    /// Backend display name (for logs)
    fn name(&self) -> &str;
}
