//! Pipeline configuration structures

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::git::RemoteHost;
use crate::task::{validate_branch, validate_target_path, RepoSlug};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Add {file} from object storage";

/// Longest invocation timeout accepted.
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Top-level pipeline configuration, usually `pipeline.toml`.
///
/// ```toml
/// [source]
/// bucket = "my-source-bucket"
/// key = "report.xlsx"
///
/// [target]
/// repo = "my-org/my-repo"
/// branch = "main"
///
/// [credentials]
/// secret_id = "my-github-token"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub git: GitConfig,
}

/// The object to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub bucket: String,

    /// Object key within the bucket (e.g. "incoming/report.xlsx").
    pub key: String,

    /// Directory holding one subdirectory per bucket, for the local store.
    #[serde(default = "default_bucket_root")]
    pub root: PathBuf,
}

/// Where the object lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Repository in "owner/name" form.
    pub repo: RepoSlug,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Path in the repository; defaults to the file name of the source key.
    pub path: Option<String>,
}

/// Where the push token comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub secret_id: String,

    /// Directory of the file-backed secret store.
    #[serde(default = "default_secrets_dir")]
    pub dir: PathBuf,
}

/// Git publisher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Hosting service for HTTPS remotes.
    #[serde(default = "default_host")]
    pub host: String,

    /// When set, repositories are bare repos under this directory instead of
    /// on `host`.
    pub remote_root: Option<PathBuf>,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// `{file}` and `{key}` are substituted.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Whole-invocation timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Parent directory for scoped working directories (system temp if unset).
    pub work_root: Option<PathBuf>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            remote_root: None,
            author_name: default_author_name(),
            author_email: default_author_email(),
            commit_message: default_commit_message(),
            timeout_secs: default_timeout_secs(),
            work_root: None,
        }
    }
}

impl GitConfig {
    pub fn remote_host(&self) -> RemoteHost {
        match &self.remote_root {
            Some(root) => RemoteHost::Local { root: root.clone() },
            None => RemoteHost::Https {
                host: self.host.clone(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Serde default functions
fn default_bucket_root() -> PathBuf {
    PathBuf::from("buckets")
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_secrets_dir() -> PathBuf {
    PathBuf::from("/run/secrets")
}

fn default_host() -> String {
    "github.com".to_string()
}

fn default_author_name() -> String {
    "bucketpush".to_string()
}

fn default_author_email() -> String {
    "bucketpush@localhost".to_string()
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl PipelineConfig {
    /// Load and validate a config file. Relative paths inside it are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        Ok(config)
    }

    /// Parse and validate without touching the filesystem.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("source.bucket is empty".to_string()));
        }
        if self.source.key.trim().is_empty() {
            return Err(ConfigError::Invalid("source.key is empty".to_string()));
        }
        if self.credentials.secret_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "credentials.secret_id is empty".to_string(),
            ));
        }
        validate_branch(&self.target.branch).map_err(ConfigError::Invalid)?;
        validate_target_path(&self.target_path()).map_err(ConfigError::Invalid)?;
        if self.git.timeout_secs == 0 || self.git.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "git.timeout_secs must be between 1 and {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.git.remote_root.is_none() && self.git.host.trim().is_empty() {
            return Err(ConfigError::Invalid("git.host is empty".to_string()));
        }
        Ok(())
    }

    /// Destination path: explicit `target.path`, else the source file name.
    pub fn target_path(&self) -> String {
        match &self.target.path {
            Some(path) => path.clone(),
            None => self
                .source
                .key
                .rsplit('/')
                .next()
                .unwrap_or(&self.source.key)
                .to_string(),
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.source.root);
        resolve(&mut self.credentials.dir);
        if let Some(root) = self.git.remote_root.as_mut() {
            resolve(root);
        }
        if let Some(root) = self.git.work_root.as_mut() {
            resolve(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[source]
bucket = "my-source-bucket"
key = "incoming/report.xlsx"

[target]
repo = "my-org/my-repo"

[credentials]
secret_id = "my-github-token"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = PipelineConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.target.branch, "main");
        assert_eq!(config.target_path(), "report.xlsx");
        assert_eq!(config.git.timeout_secs, 300);
        assert_eq!(config.credentials.dir, PathBuf::from("/run/secrets"));
        assert_eq!(
            config.git.remote_host(),
            RemoteHost::Https {
                host: "github.com".to_string()
            }
        );
    }

    #[test]
    fn explicit_target_path_and_local_remote() {
        let toml = format!(
            "{}\n[git]\nremote_root = \"/srv/git\"\ntimeout_secs = 30\n",
            MINIMAL.replace(
                "repo = \"my-org/my-repo\"",
                "repo = \"my-org/my-repo\"\npath = \"sheets/q3.xlsx\""
            )
        );
        let config = PipelineConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.target_path(), "sheets/q3.xlsx");
        assert_eq!(config.git.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.git.remote_host(),
            RemoteHost::Local {
                root: PathBuf::from("/srv/git")
            }
        );
    }

    #[test]
    fn bad_repo_slug_fails_parse() {
        let toml = MINIMAL.replace("my-org/my-repo", "not-a-slug");
        assert!(matches!(
            PipelineConfig::from_toml_str(&toml),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let cases = [
            MINIMAL.replace("secret_id = \"my-github-token\"", "secret_id = \"\""),
            MINIMAL.replace(
                "repo = \"my-org/my-repo\"",
                "repo = \"my-org/my-repo\"\nbranch = \"bad branch\"",
            ),
            MINIMAL.replace(
                "repo = \"my-org/my-repo\"",
                "repo = \"my-org/my-repo\"\npath = \"../escape.xlsx\"",
            ),
            format!("{}\n[git]\ntimeout_secs = 0\n", MINIMAL),
        ];
        for toml in cases {
            assert!(
                matches!(
                    PipelineConfig::from_toml_str(&toml),
                    Err(ConfigError::Invalid(_))
                ),
                "should be invalid:\n{toml}"
            );
        }
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            "{}\n[git]\nremote_root = \"remotes\"\n",
            MINIMAL.replace(
                "secret_id = \"my-github-token\"",
                "secret_id = \"my-github-token\"\ndir = \"secrets\""
            )
        );
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, toml).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.source.root, dir.path().join("buckets"));
        assert_eq!(config.credentials.dir, dir.path().join("secrets"));
        assert_eq!(config.git.remote_root, Some(dir.path().join("remotes")));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            PipelineConfig::load(Path::new("/nonexistent/pipeline.toml")),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
