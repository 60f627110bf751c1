//! # bp-publish
//!
//! Publishes a storage object into a hosted git repository: clone the
//! target branch, write the object at the target path, commit, push.
//!
//! ## Key components
//!
//! - [`PublishTask`]: one unit of work, the object bytes plus the
//!   destination repository, branch, path and push credential.
//! - [`RepositoryPublisher`]: the narrow seam around the push side effect.
//!   [`GitPublisher`] drives the `git` CLI; [`InMemoryPublisher`] keeps
//!   branches in memory for tests.
//! - [`Publisher`]: checks a task's preconditions, sets the invocation
//!   deadline, and delegates to a backend.
//! - [`Pipeline`]: turns a [`bp_storage::StorageEvent`] into a publish by
//!   reading the object and resolving the credential.
//!
//! Publishing unchanged content is a successful no-op: the returned
//! [`CommitRef`] has `created == false` and points at the existing head.

pub mod adapter;
pub mod config;
pub mod error;
pub mod git;
pub mod memory;
pub mod pipeline;
pub mod publisher;
pub mod task;
pub mod workdir;

pub use adapter::RepositoryPublisher;
pub use config::{CredentialsConfig, GitConfig, PipelineConfig, SourceConfig, TargetConfig};
pub use error::{ConfigError, PipelineError, PublishError};
pub use git::{GitIdentity, GitPublisher, RemoteHost};
pub use memory::{InMemoryPublisher, MemoryCommit};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use publisher::Publisher;
pub use task::{CommitRef, PublishTask, RepoSlug};
pub use workdir::WorkDir;
