//! Exclusive per-tree lock for isolation runs.

use crate::ReaperError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = "isolation.lock";

/// Held for the whole run; the lock file is removed on drop.
#[derive(Debug)]
pub struct IsolationLock {
    path: PathBuf,
}

impl IsolationLock {
    /// # Errors
    /// `ReaperError::Locked` if another run holds the lock.
    pub fn acquire(work_dir: &Path) -> Result<Self, ReaperError> {
        fs::create_dir_all(work_dir)?;
        let path = work_dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ReaperError::Locked(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(lock = %path.display(), "isolation lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IsolationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "could not remove isolation lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_drop() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join(".warden");

        let lock = IsolationLock::acquire(&work).unwrap();
        assert!(lock.path().is_file());
        assert!(matches!(
            IsolationLock::acquire(&work),
            Err(ReaperError::Locked(_))
        ));

        drop(lock);
        assert!(!work.join(LOCK_FILE).exists());
        let again = IsolationLock::acquire(&work).unwrap();
        assert!(again.path().is_file());
    }
}
