// Sealstore — Advisory store lock
//
// Cooperative file-based mutual exclusion around store creation and schema
// migration. Ordinary reads and per-call transactions never take this lock;
// the transactional engine's own isolation covers those.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::FileExt;

use super::paths::path_with_suffix;
use super::StoreError;

/// Suffix appended to the store path to form the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// An exclusive advisory lock on a store, held for the guard's lifetime.
///
/// The lock file is created if absent and unlinked on release. Release
/// failures are logged and swallowed; they must never mask whatever error
/// caused the holder to unwind.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock for the store at `store_path`, blocking until
    /// granted.
    pub fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        let path = path_with_suffix(store_path, LOCK_SUFFIX);
        let file = open_lock_file(&path)?;
        file.lock_exclusive()?;
        tracing::debug!(path = %path.display(), "store lock acquired");
        Ok(Self { file, path })
    }

    /// Try to acquire without blocking; `None` means another holder has it.
    pub fn try_acquire(store_path: &Path) -> Result<Option<Self>, StoreError> {
        let path = path_with_suffix(store_path, LOCK_SUFFIX);
        let file = open_lock_file(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "could not unlock store lock");
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not remove lock file");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(StoreError::Io)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.sqlite3");

        let lock = StoreLock::acquire(&store).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), dir.path().join("store.sqlite3.lock"));
    }

    #[test]
    fn test_held_lock_blocks_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.sqlite3");

        let _held = StoreLock::acquire(&store).unwrap();
        let second = StoreLock::try_acquire(&store).unwrap();
        assert!(second.is_none(), "second holder must observe lock-held");
    }

    #[test]
    fn test_drop_releases_and_removes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.sqlite3");
        let lock_path;

        {
            let lock = StoreLock::acquire(&store).unwrap();
            lock_path = lock.path().to_path_buf();
        }

        assert!(!lock_path.exists(), "lock file must be removed on release");
        let reacquired = StoreLock::try_acquire(&store).unwrap();
        assert!(reacquired.is_some());
    }
}
