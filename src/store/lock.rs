use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const RUN_LOCK_FILE: &str = "run.lock";

/// Exclusive lock file that keeps scheduled runs from overlapping across
/// processes.
pub struct RunLock {
    lock: RwLock<File>,
}

impl RunLock {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create lock directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open run lock: {}", path.display()))?;

        Ok(Self {
            lock: RwLock::new(file),
        })
    }

    /// Takes the lock without waiting. `None` when another run holds it.
    pub fn try_acquire(&mut self) -> Result<Option<RwLockWriteGuard<'_, File>>> {
        match self.lock.try_write() {
            Ok(guard) => {
                debug!("Acquired run lock");
                Ok(Some(guard))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e).context("Failed to take run lock"),
        }
    }
}
