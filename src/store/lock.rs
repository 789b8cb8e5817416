//! Advisory lock on the sibling `<store>.lock` file.

use fs4::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::StoreError;

/// Exclusive lock held for the lifetime of the guard.
///
/// The lock file only serves mutual exclusion; nothing is ever written to it.
#[derive(Debug)]
pub(crate) struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Block until the lock at `path` is held.
    pub(crate) fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(StoreError::io(path))?;

        file.lock_exclusive().map_err(StoreError::io(path))?;
        tracing::trace!("Acquired store lock {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release store lock {}: {}", self.path.display(), e);
        }
    }
}

/// `<path>.lock`, next to the data file.
pub(crate) fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path_for(Path::new("results/pubmed_res.json")),
            PathBuf::from("results/pubmed_res.json.lock")
        );
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json.lock");

        drop(StoreLock::acquire(&path).unwrap());
        let again = StoreLock::acquire(&path);
        assert!(again.is_ok());
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
