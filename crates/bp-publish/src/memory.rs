//! In-memory publisher - a fake remote for tests and dry runs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::adapter::{RepositoryPublisher, Result};
use crate::error::PublishError;
use crate::task::{CommitRef, PublishTask, RepoSlug};

/// One commit on an in-memory branch: the full tree after the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    pub commit_id: String,
    pub message: String,
    pub files: BTreeMap<String, Vec<u8>>,
}

type BranchKey = (RepoSlug, String);

/// Publisher that keeps branches in a map instead of a real remote.
///
/// Behaves like a hosting service with a few switches:
/// - accepted tokens (if none are registered, any non-empty token works)
/// - repositories that cannot be reached
/// - branches that reject direct pushes
///
/// A branch that does not exist yet starts from the head of the default
/// branch (`main` unless changed), the way a git remote's `HEAD` would seed it.
pub struct InMemoryPublisher {
    branches: Mutex<HashMap<BranchKey, Vec<MemoryCommit>>>,
    default_branch: String,
    accepted_tokens: HashSet<String>,
    unreachable: HashSet<RepoSlug>,
    protected: HashSet<BranchKey>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self {
            branches: Mutex::new(HashMap::new()),
            default_branch: "main".to_string(),
            accepted_tokens: HashSet::new(),
            unreachable: HashSet::new(),
            protected: HashSet::new(),
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_accepted_token(mut self, token: impl Into<String>) -> Self {
        self.accepted_tokens.insert(token.into());
        self
    }

    pub fn with_unreachable_repo(mut self, repo: RepoSlug) -> Self {
        self.unreachable.insert(repo);
        self
    }

    pub fn with_protected_branch(mut self, repo: RepoSlug, branch: impl Into<String>) -> Self {
        self.protected.insert((repo, branch.into()));
        self
    }

    /// Commits on a branch, oldest first.
    pub fn commits(&self, repo: &RepoSlug, branch: &str) -> Vec<MemoryCommit> {
        self.lock()
            .get(&(repo.clone(), branch.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Content of `path` at the head of a branch.
    pub fn file(&self, repo: &RepoSlug, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.commits(repo, branch)
            .last()
            .and_then(|head| head.files.get(path).cloned())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BranchKey, Vec<MemoryCommit>>> {
        self.branches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryPublisher for InMemoryPublisher {
    fn publish(&self, task: &PublishTask, deadline: Instant) -> Result<CommitRef> {
        if Instant::now() >= deadline {
            return Err(PublishError::Unreachable(
                "deadline passed before publish".to_string(),
            ));
        }
        if self.unreachable.contains(&task.target_repo) {
            return Err(PublishError::Unreachable(format!(
                "cannot reach {}",
                task.target_repo
            )));
        }

        let token = task.credential.expose();
        let token_ok = !task.credential.is_empty()
            && (self.accepted_tokens.is_empty() || self.accepted_tokens.contains(token));
        if !token_ok {
            return Err(PublishError::Unauthorized(format!(
                "token rejected for {}",
                task.target_repo
            )));
        }

        let key = (task.target_repo.clone(), task.target_branch.clone());
        let mut branches = self.lock();
        let existing = branches.get(&key).filter(|history| !history.is_empty());
        let is_new = existing.is_none();
        let mut history = match existing {
            Some(history) => history.clone(),
            None => branches
                .get(&(task.target_repo.clone(), self.default_branch.clone()))
                .and_then(|default| default.last().cloned())
                .into_iter()
                .collect(),
        };

        let head = history.last();
        let unchanged = head.and_then(|c| c.files.get(&task.target_path))
            == Some(&task.source_bytes);
        if unchanged && !is_new {
            let head = head.map(|c| c.commit_id.clone()).unwrap_or_default();
            tracing::debug!(commit = %head, "in-memory: content unchanged");
            return Ok(CommitRef {
                commit_id: head,
                branch: task.target_branch.clone(),
                created: false,
                content_sha256: task.content_sha256(),
            });
        }

        if self.protected.contains(&key) {
            return Err(PublishError::PushRejected(format!(
                "branch {} of {} is protected",
                task.target_branch, task.target_repo
            )));
        }

        // A new branch whose base already has the content is created at
        // that base without a new commit.
        if !unchanged {
            let mut files = head.map(|c| c.files.clone()).unwrap_or_default();
            files.insert(task.target_path.clone(), task.source_bytes.clone());
            let parent = head.map(|c| c.commit_id.as_str()).unwrap_or("");
            let commit_id = commit_id(parent, &task.target_path, &task.content_sha256());
            history.push(MemoryCommit {
                commit_id,
                message: format!("Add {} from object storage", task.target_file_name()),
                files,
            });
        }

        let commit_id = history
            .last()
            .map(|c| c.commit_id.clone())
            .unwrap_or_default();
        branches.insert(key, history);
        tracing::debug!(commit = %commit_id, "in-memory: branch updated");

        Ok(CommitRef {
            commit_id,
            branch: task.target_branch.clone(),
            created: true,
            content_sha256: task.content_sha256(),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn commit_id(parent: &str, path: &str, content_sha256: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(content_sha256.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..40].to_string()
}
