//! Directory lock
//!
//! Keeps two recovery runs (or a run and a live server that honors the same
//! sentinel) out of one data directory at the same time.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{RecoveryError, Result};

/// Sentinel file created inside the data directory
pub const LOCK_FILE_NAME: &str = "__recoverylock_dont_delete_me";

/// Exclusive advisory lock on a data directory, released on drop
#[derive(Debug)]
pub struct RecoveryLock {
    path: PathBuf,
    file: Option<File>,
}

impl RecoveryLock {
    /// Take the lock without blocking
    ///
    /// On contention the error carries the pid recorded by the current holder,
    /// when it can be read.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if let Err(source) = FileExt::try_lock_exclusive(&file) {
            let holder = read_holder(&mut file);
            return Err(RecoveryError::Locked { path, holder, source });
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.sync_data()?;

        tracing::debug!(path = %path.display(), "acquired recovery lock");
        Ok(Self { path, file: Some(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now instead of at drop
    pub fn release(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file)?;
            tracing::debug!(path = %self.path.display(), "released recovery lock");
        }
        Ok(())
    }
}

impl Drop for RecoveryLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // Closing the descriptor releases the lock even if this fails
            let _ = FileExt::unlock(&file);
        }
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
