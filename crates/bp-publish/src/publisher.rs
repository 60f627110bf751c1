// publisher.rs — The Publisher: precondition checks, deadline, delegation.
//
// Publisher is what callers hold. It validates a task before any network or
// disk work, stamps the invocation deadline, and hands the task to a
// RepositoryPublisher backend. Backends do the actual clone/commit/push.

use std::time::{Duration, Instant};

use crate::adapter::RepositoryPublisher;
use crate::error::PublishError;
use crate::task::{CommitRef, PublishTask};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs one publish attempt per call. No retries.
pub struct Publisher {
    backend: Box<dyn RepositoryPublisher>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(backend: Box<dyn RepositoryPublisher>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound the whole invocation; expiry surfaces as `Unreachable`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Publish `task`, consuming it.
    pub fn publish(&self, task: PublishTask) -> Result<CommitRef, PublishError> {
        task.validate().map_err(PublishError::InvalidTask)?;
        if task.credential.is_empty() {
            return Err(PublishError::Unauthorized(format!(
                "no token for {}",
                task.target_repo
            )));
        }

        let span = tracing::info_span!(
            "publish",
            task_id = %task.task_id,
            repo = %task.target_repo,
            branch = %task.target_branch,
            path = %task.target_path,
        );
        let _enter = span.enter();

        tracing::info!(
            key = %task.source_object_key,
            bytes = task.source_bytes.len(),
            sha256 = %task.content_sha256(),
            backend = self.backend.name(),
            "publishing object"
        );

        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + MAX_TIMEOUT);
        let result = self.backend.publish(&task, deadline);

        match &result {
            Ok(commit) if commit.created => {
                tracing::info!(commit = %commit.commit_id, "published");
            }
            Ok(commit) => {
                tracing::info!(commit = %commit.commit_id, "already up to date");
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "publish failed");
            }
        }
        result
    }
}
