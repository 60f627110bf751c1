// store.rs — SecretStore trait and its backends.
//
// A SecretStore maps a secret identifier (e.g. "my-github-token") to a
// SecretToken. Backends never log the resolved value; only the identifier
// shows up in tracing output.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CredentialError;
use crate::token::SecretToken;

/// Lookup of push tokens by secret identifier.
pub trait SecretStore: Send + Sync {
    fn resolve(&self, secret_id: &str) -> Result<SecretToken, CredentialError>;
}

/// Secrets stored one-per-file in a directory: `<dir>/<secret_id>`.
///
/// Trailing whitespace (usually the newline an editor or `echo` leaves) is
/// stripped from the value.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn secret_path(&self, secret_id: &str) -> Result<PathBuf, CredentialError> {
        if secret_id.is_empty()
            || secret_id.contains("..")
            || secret_id.contains('/')
            || secret_id.contains('\\')
        {
            return Err(CredentialError::InvalidId {
                secret_id: secret_id.to_string(),
            });
        }
        Ok(self.dir.join(secret_id))
    }
}

impl SecretStore for FileSecretStore {
    fn resolve(&self, secret_id: &str) -> Result<SecretToken, CredentialError> {
        let path = self.secret_path(secret_id)?;
        if !path.is_file() {
            return Err(CredentialError::NotFound {
                secret_id: secret_id.to_string(),
            });
        }

        let raw = fs::read_to_string(&path)
            .map_err(|source| CredentialError::IoError { path, source })?;
        let token = SecretToken::new(raw.trim_end());
        if token.is_empty() {
            return Err(CredentialError::Empty {
                secret_id: secret_id.to_string(),
            });
        }

        tracing::debug!(secret_id, "resolved secret from file store");
        Ok(token)
    }
}

/// In-memory secret store.
#[derive(Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, SecretToken>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .insert(secret_id.into(), SecretToken::new(value));
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve(&self, secret_id: &str) -> Result<SecretToken, CredentialError> {
        let token = self
            .secrets
            .get(secret_id)
            .ok_or_else(|| CredentialError::NotFound {
                secret_id: secret_id.to_string(),
            })?;
        if token.is_empty() {
            return Err(CredentialError::Empty {
                secret_id: secret_id.to_string(),
            });
        }
        Ok(token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_reads_and_trims() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("my-github-token"), "ghp_abc\n").unwrap();

        let store = FileSecretStore::new(dir.path());
        let token = store.resolve("my-github-token").unwrap();
        assert_eq!(token.expose(), "ghp_abc");
    }

    #[test]
    fn file_store_missing_secret() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(matches!(
            store.resolve("absent"),
            Err(CredentialError::NotFound { .. })
        ));
    }

    #[test]
    fn file_store_empty_secret() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blank"), "\n").unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(matches!(
            store.resolve("blank"),
            Err(CredentialError::Empty { .. })
        ));
    }

    #[test]
    fn file_store_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(CredentialError::InvalidId { .. })
        ));
        assert!(matches!(
            store.resolve("nested/secret"),
            Err(CredentialError::InvalidId { .. })
        ));
    }

    #[test]
    fn static_store_lookup() {
        let store = StaticSecretStore::new().with_secret("tok", "value");
        assert_eq!(store.resolve("tok").unwrap().expose(), "value");
        assert!(store.resolve("other").is_err());
    }
}
