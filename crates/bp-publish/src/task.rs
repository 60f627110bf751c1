// task.rs — PublishTask, its destination coordinates, and the commit result.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use bp_credentials::SecretToken;

/// A hosted repository named as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| format!("repository '{}' is not in owner/name form", s))?;

        let valid_part = |part: &str| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(format!("repository '{}' is not in owner/name form", s));
        }

        // A trailing ".git" is accepted and dropped; the remote URL adds it back.
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(format!("repository '{}' has an empty name", s));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.to_string()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One unit of publish work, created per trigger and consumed once.
#[derive(Debug, Clone)]
pub struct PublishTask {
    /// Correlation id for logs.
    pub task_id: Uuid,
    pub source_object_key: String,
    pub source_bytes: Vec<u8>,
    pub target_repo: RepoSlug,
    pub target_branch: String,
    /// Destination path inside the repository, relative, `/`-separated.
    pub target_path: String,
    pub credential: SecretToken,
}

impl PublishTask {
    pub fn new(
        source_object_key: impl Into<String>,
        source_bytes: Vec<u8>,
        target_repo: RepoSlug,
        target_branch: impl Into<String>,
        target_path: impl Into<String>,
        credential: SecretToken,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            source_object_key: source_object_key.into(),
            source_bytes,
            target_repo,
            target_branch: target_branch.into(),
            target_path: target_path.into(),
            credential,
        }
    }

    /// Lowercase hex SHA-256 of the content being published.
    pub fn content_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.source_bytes);
        format!("{:x}", hasher.finalize())
    }

    /// File name component of the target path.
    pub fn target_file_name(&self) -> &str {
        self.target_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_path)
    }

    /// Check everything that can be checked without touching the remote.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_bytes.is_empty() {
            return Err(format!(
                "object '{}' has no content to publish",
                self.source_object_key
            ));
        }
        validate_branch(&self.target_branch)?;
        validate_target_path(&self.target_path)?;
        Ok(())
    }
}

/// Result of a publish: where the branch head now is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub commit_id: String,
    pub branch: String,
    /// False when the target branch already held this content and nothing
    /// was pushed.
    pub created: bool,
    pub content_sha256: String,
}

/// Reject names git would refuse as a branch, plus anything that reads as
/// an option.
pub fn validate_branch(branch: &str) -> Result<(), String> {
    let bad = branch.is_empty()
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with('.')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("//")
        || branch.contains("@{")
        || branch
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));
    if bad {
        return Err(format!("'{}' is not a valid branch name", branch));
    }
    Ok(())
}

/// Target paths must stay inside the working tree and out of `.git`.
pub fn validate_target_path(path: &str) -> Result<(), String> {
    let p = Path::new(path);
    if path.is_empty() || p.components().next().is_none() {
        return Err("target path is empty".to_string());
    }
    for (index, component) in p.components().enumerate() {
        match component {
            Component::Normal(part) if index == 0 && part == ".git" => {
                return Err(format!("target path '{}' points into .git", path));
            }
            Component::Normal(_) => {}
            _ => {
                return Err(format!(
                    "target path '{}' must be relative without '.' or '..'",
                    path
                ))
            }
        }
    }
    if path.ends_with('/') {
        return Err(format!("target path '{}' names a directory", path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(bytes: &[u8]) -> PublishTask {
        PublishTask::new(
            "report.csv",
            bytes.to_vec(),
            "acme/data".parse().unwrap(),
            "main",
            "reports/report.csv",
            SecretToken::new("tok"),
        )
    }

    #[test]
    fn slug_parses_owner_and_name() {
        let slug: RepoSlug = "my-org/my-repo".parse().unwrap();
        assert_eq!(slug.owner(), "my-org");
        assert_eq!(slug.name(), "my-repo");
        assert_eq!(slug.to_string(), "my-org/my-repo");
    }

    #[test]
    fn slug_drops_git_suffix() {
        let slug: RepoSlug = "acme/data.git".parse().unwrap();
        assert_eq!(slug.name(), "data");
    }

    #[test]
    fn slug_rejects_bad_forms() {
        for bad in ["acme", "acme/", "/data", "a/b/c", "../data", "acme/da ta", "acme/.."] {
            assert!(bad.parse::<RepoSlug>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn branch_validation() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("release/2024-q3").is_ok());
        for bad in ["", "-f", "a..b", "has space", "x.lock", "a:b", "trail/"] {
            assert!(validate_branch(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn target_path_validation() {
        assert!(validate_target_path("report.csv").is_ok());
        assert!(validate_target_path("data/2024/report.xlsx").is_ok());
        for bad in ["", "/abs.csv", "../up.csv", "a/../b.csv", ".git/config", "./x.csv", "dir/"] {
            assert!(validate_target_path(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn empty_content_fails_validation() {
        assert!(task(b"").validate().is_err());
        assert!(task(b"A,B\n").validate().is_ok());
    }

    #[test]
    fn content_digest_and_file_name() {
        let t = task(b"abc");
        assert_eq!(
            t.content_sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(t.target_file_name(), "report.csv");
    }

    #[test]
    fn debug_output_hides_credential() {
        let t = PublishTask::new(
            "k",
            b"x".to_vec(),
            "acme/data".parse().unwrap(),
            "main",
            "k",
            SecretToken::new("ghp_verysecret"),
        );
        assert!(!format!("{:?}", t).contains("ghp_verysecret"));
    }
}
