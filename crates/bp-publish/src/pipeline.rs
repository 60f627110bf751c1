// pipeline.rs — From a storage trigger to a published commit.
//
// Flow for one event:
//   1. Ignore events for other buckets/keys
//   2. Read the object bytes from the ObjectStore
//   3. Resolve the push token from the SecretStore
//   4. Build a PublishTask and hand it to the Publisher

use bp_credentials::{FileSecretStore, SecretStore};
use bp_storage::{LocalObjectStore, ObjectStore, StorageEvent};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::git::GitPublisher;
use crate::publisher::Publisher;
use crate::task::{CommitRef, PublishTask, RepoSlug};

/// What handling an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The event was for a different object.
    Ignored,
    /// The publish ran; see `CommitRef::created` for whether it pushed.
    Published(CommitRef),
}

/// The watcher-to-publisher wiring for one configured object.
pub struct Pipeline {
    bucket: String,
    key: String,
    target_repo: RepoSlug,
    target_branch: String,
    target_path: String,
    secret_id: String,
    objects: Box<dyn ObjectStore>,
    secrets: Box<dyn SecretStore>,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        objects: Box<dyn ObjectStore>,
        secrets: Box<dyn SecretStore>,
        publisher: Publisher,
    ) -> Self {
        Self {
            bucket: config.source.bucket.clone(),
            key: config.source.key.clone(),
            target_repo: config.target.repo.clone(),
            target_branch: config.target.branch.clone(),
            target_path: config.target_path(),
            secret_id: config.credentials.secret_id.clone(),
            objects,
            secrets,
            publisher,
        }
    }

    /// Local bucket directory, file-backed secrets, git CLI publisher.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let publisher = Publisher::new(Box::new(GitPublisher::from_config(&config.git)))
            .with_timeout(config.git.timeout());
        Self::new(
            config,
            Box::new(LocalObjectStore::new(config.source.root.clone())),
            Box::new(FileSecretStore::new(config.credentials.dir.clone())),
            publisher,
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn matches(&self, event: &StorageEvent) -> bool {
        event.bucket == self.bucket && event.key == self.key
    }

    pub fn handle(&self, event: &StorageEvent) -> Result<PipelineOutcome, PipelineError> {
        if !self.matches(event) {
            tracing::debug!(
                bucket = %event.bucket,
                key = %event.key,
                "event is for another object; ignoring"
            );
            return Ok(PipelineOutcome::Ignored);
        }

        let bytes = self.objects.get(&event.bucket, &event.key)?;
        let credential = self.secrets.resolve(&self.secret_id)?;

        let task = PublishTask::new(
            event.key.clone(),
            bytes,
            self.target_repo.clone(),
            self.target_branch.clone(),
            self.target_path.clone(),
            credential,
        );
        let commit = self.publisher.publish(task)?;
        Ok(PipelineOutcome::Published(commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::memory::InMemoryPublisher;
    use bp_credentials::StaticSecretStore;
    use bp_storage::StorageError;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
[source]
bucket = "my-source-bucket"
key = "incoming/report.csv"

[target]
repo = "acme/data"

[credentials]
secret_id = "my-github-token"
"#;

    fn pipeline(root: &std::path::Path, secrets: StaticSecretStore) -> Pipeline {
        let config = PipelineConfig::from_toml_str(CONFIG).unwrap();
        Pipeline::new(
            &config,
            Box::new(LocalObjectStore::new(root)),
            Box::new(secrets),
            Publisher::new(Box::new(InMemoryPublisher::new())),
        )
    }

    fn put_object(root: &std::path::Path, bytes: &[u8]) {
        let dir = root.join("my-source-bucket/incoming");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("report.csv"), bytes).unwrap();
    }

    #[test]
    fn other_objects_are_ignored() {
        let root = tempdir().unwrap();
        let p = pipeline(root.path(), StaticSecretStore::new());
        let outcome = p
            .handle(&StorageEvent::new("my-source-bucket", "other.csv"))
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Ignored);
        let outcome = p
            .handle(&StorageEvent::new("another-bucket", "incoming/report.csv"))
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Ignored);
    }

    #[test]
    fn publishes_then_noops() {
        let root = tempdir().unwrap();
        put_object(root.path(), b"A,B,C\n1,2,3\n");
        let p = pipeline(
            root.path(),
            StaticSecretStore::new().with_secret("my-github-token", "tok"),
        );
        let event = StorageEvent::new("my-source-bucket", "incoming/report.csv");

        match p.handle(&event).unwrap() {
            PipelineOutcome::Published(commit) => assert!(commit.created),
            other => panic!("unexpected outcome: {:?}", other),
        }
        match p.handle(&event).unwrap() {
            PipelineOutcome::Published(commit) => assert!(!commit.created),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn missing_object_surfaces_storage_error() {
        let root = tempdir().unwrap();
        let p = pipeline(
            root.path(),
            StaticSecretStore::new().with_secret("my-github-token", "tok"),
        );
        let err = p
            .handle(&StorageEvent::new("my-source-bucket", "incoming/report.csv"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_secret_surfaces_credential_error() {
        let root = tempdir().unwrap();
        put_object(root.path(), b"x");
        let p = pipeline(root.path(), StaticSecretStore::new());
        let err = p
            .handle(&StorageEvent::new("my-source-bucket", "incoming/report.csv"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Credential(_)));
    }

    #[test]
    fn empty_object_is_invalid_task() {
        let root = tempdir().unwrap();
        put_object(root.path(), b"");
        let p = pipeline(
            root.path(),
            StaticSecretStore::new().with_secret("my-github-token", "tok"),
        );
        let err = p
            .handle(&StorageEvent::new("my-source-bucket", "incoming/report.csv"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Publish(PublishError::InvalidTask(_))
        ));
    }
}
