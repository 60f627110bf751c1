// store.rs — ObjectStore trait and the local-directory backend.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Read access to objects by bucket and key.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Buckets as directories: object `key` in `bucket` lives at
/// `<root>/<bucket>/<key>`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing a bucket.
    pub fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        check_relative(bucket)?;
        if bucket.contains('/') {
            return Err(StorageError::PathTraversal {
                path: bucket.to_string(),
            });
        }
        Ok(self.root.join(bucket))
    }

    /// Full path of an object. Rejects keys that could escape the bucket.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        check_relative(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let bytes = fs::read(&path).map_err(|source| StorageError::IoError {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(bucket, key, size = bytes.len(), "read object");
        Ok(bytes)
    }
}

fn check_relative(segment: &str) -> Result<(), StorageError> {
    let path = Path::new(segment);
    let escapes = segment.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(StorageError::PathTraversal {
            path: segment.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_object_from_bucket_dir() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("src/incoming")).unwrap();
        fs::write(root.path().join("src/incoming/report.xlsx"), b"xlsx").unwrap();

        let store = LocalObjectStore::new(root.path());
        assert_eq!(store.get("src", "incoming/report.xlsx").unwrap(), b"xlsx");
    }

    #[test]
    fn missing_object_is_not_found() {
        let root = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        assert!(matches!(
            store.get("src", "report.xlsx"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn rejects_escaping_keys_and_buckets() {
        let root = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        for (bucket, key) in [
            ("src", "../other/report.xlsx"),
            ("src", "/etc/passwd"),
            ("..", "report.xlsx"),
            ("a/b", "report.xlsx"),
            ("src", ""),
        ] {
            assert!(
                matches!(
                    store.get(bucket, key),
                    Err(StorageError::PathTraversal { .. })
                ),
                "{bucket}/{key} should be rejected"
            );
        }
    }
}
