// workdir.rs — Scoped working directory for one publish.
//
// Each publish gets a fresh temporary directory that holds the clone. The
// directory is removed when the WorkDir is dropped, so every exit path
// (success, error, early return) cleans up.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::PublishError;
use crate::task::validate_target_path;

const WORKDIR_PREFIX: &str = "bp-publish-";

/// An exclusive, self-deleting working directory.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a working directory under `parent`, or the system temp dir.
    pub fn acquire(parent: Option<&Path>) -> Result<Self, PublishError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);

        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|source| PublishError::LocalIO {
                    path: parent.to_path_buf(),
                    source,
                })?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|source| PublishError::LocalIO {
            path: parent
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        tracing::debug!(path = %dir.path().display(), "acquired working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` at `relative_path`, creating parent directories.
    ///
    /// Paths that could escape the working tree or land inside `.git` are
    /// rejected before anything is written.
    pub fn write_file(&self, relative_path: &str, content: &[u8]) -> Result<PathBuf, PublishError> {
        let full_path = self.resolve_path(relative_path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|source| PublishError::LocalIO {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&full_path, content).map_err(|source| PublishError::LocalIO {
            path: full_path.clone(),
            source,
        })?;

        Ok(full_path)
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<(), PublishError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| PublishError::LocalIO { path, source })
    }

    fn resolve_path(&self, relative_path: &str) -> Result<PathBuf, PublishError> {
        validate_target_path(relative_path).map_err(|reason| PublishError::LocalIO {
            path: PathBuf::from(relative_path),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, reason),
        })?;
        Ok(self.dir.path().join(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_creates_nested_file() {
        let work = WorkDir::acquire(None).unwrap();
        let path = work.write_file("data/2024/report.csv", b"A,B\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"A,B\n");
        assert!(path.starts_with(work.path()));
    }

    #[test]
    fn rejects_escaping_paths() {
        let work = WorkDir::acquire(None).unwrap();
        for bad in ["../outside.csv", "/etc/passwd", ".git/config"] {
            assert!(
                matches!(work.write_file(bad, b"x"), Err(PublishError::LocalIO { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn directory_removed_on_drop() {
        let work = WorkDir::acquire(None).unwrap();
        let path = work.path().to_path_buf();
        work.write_file("a.txt", b"a").unwrap();
        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn acquire_under_parent() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("work");
        let work = WorkDir::acquire(Some(&root)).unwrap();
        assert!(work.path().starts_with(&root));
        let path = work.path().to_path_buf();
        work.close().unwrap();
        assert!(!path.exists());
    }
}
