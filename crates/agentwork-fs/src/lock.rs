//! Cross-process advisory locking.
//!
//! The lock is taken on a dedicated file rather than on the index itself: the
//! index is replaced by atomic rename on every write, so a lock held on the old
//! inode would not exclude a writer that opens the new one.
//!
//! Advisory locks are cooperative. Every process touching the data directory
//! must go through [`SharedFileLock`] for the exclusion to hold.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Shared/exclusive advisory lock on a lock file.
#[derive(Debug, Clone)]
pub struct SharedFileLock {
    path: PathBuf,
}

/// Held lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl SharedFileLock {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until a shared (read) lock is held.
    ///
    /// # Errors
    /// Returns error if the lock file cannot be opened or locked.
    pub fn acquire_shared(&self) -> io::Result<LockGuard> {
        let file = self.open()?;
        FileExt::lock_shared(&file)?;
        Ok(LockGuard { file })
    }

    /// Block until an exclusive (write) lock is held.
    ///
    /// # Errors
    /// Returns error if the lock file cannot be opened or locked.
    pub fn acquire_exclusive(&self) -> io::Result<LockGuard> {
        let file = self.open()?;
        FileExt::lock_exclusive(&file)?;
        Ok(LockGuard { file })
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release advisory lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shared_locks_coexist() {
        let temp = tempfile::tempdir().unwrap();
        let lock = SharedFileLock::new(temp.path().join("index.lock"));

        let first = lock.acquire_shared().unwrap();
        let second = lock.acquire_shared().unwrap();
        drop((first, second));

        assert!(lock.path().exists());
    }

    #[test]
    fn test_exclusive_lock_serializes_holders() {
        let temp = tempfile::tempdir().unwrap();
        let lock = SharedFileLock::new(temp.path().join("index.lock"));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    let _guard = lock.acquire_exclusive().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
