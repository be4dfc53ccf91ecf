//! Advisory lock keeping two sessions off the same document.
//!
//! The document itself is replaced by rename on every save, so the lock lives
//! on a hidden sidecar file next to it. The sidecar outlives the lock, so
//! every session contends on the same file.

use crate::errors::LockError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock on a document, released on drop.
#[derive(Debug)]
pub struct DocumentLock {
    file: File,
    lock_path: PathBuf,
}

impl DocumentLock {
    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// `LockError::FileBusy` if another session holds it,
    /// `LockError::AcquisitionFailed` if the lock file cannot be used.
    pub fn acquire(document: &Path) -> Result<Self, LockError> {
        let lock_path = lock_path_for(document);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| LockError::AcquisitionFailed {
                path: document.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Locked {:?}", lock_path);
                Ok(Self { file, lock_path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::FileBusy {
                    path: document.to_path_buf(),
                })
            }
            Err(source) => Err(LockError::AcquisitionFailed {
                path: document.to_path_buf(),
                source,
            }),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!("Unlocked {:?}", self.lock_path),
            Err(e) => warn!("Failed to release lock {:?}: {}", self.lock_path, e),
        }
    }
}

fn lock_path_for(document: &Path) -> PathBuf {
    let name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    document.with_file_name(format!(".{}.lock", name))
}
