//! Exclusive run lock
//!
//! Two runs against the same data directory would race on the dedup check
//! and store the same bill twice. `RunLock` holds an exclusive advisory lock
//! on `run.lock` for as long as it lives.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

pub const LOCK_FILE: &str = "run.lock";

pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting
    ///
    /// Returns `Ok(None)` when another process holds it.
    pub fn try_acquire(data_dir: &Path) -> Result<Option<Self>> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_lock_is_refused_until_release() {
        let dir = tempdir().unwrap();

        let first = RunLock::try_acquire(dir.path()).unwrap();
        assert!(first.is_some());
        assert!(first.as_ref().unwrap().path().ends_with(LOCK_FILE));

        assert!(RunLock::try_acquire(dir.path()).unwrap().is_none());

        drop(first);
        assert!(RunLock::try_acquire(dir.path()).unwrap().is_some());
    }
}
