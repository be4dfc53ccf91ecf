//! Secure temporary file handling with tmpfs preference.
//!
//! The terminal host hands decrypted buffers to an external editor through a
//! temporary file. Those files live on RAM-backed tmpfs where available, are
//! readable only by the owner, and are overwritten before removal.

use crate::constants::{TEMP_FILE_PREFIX, TMPFS_PATHS};
use crate::errors::AppResult;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Get a secure temporary directory, preferring tmpfs when available.
///
/// Falls back to the system temp directory with a warning.
pub fn get_secure_temp_dir() -> PathBuf {
    for candidate in TMPFS_PATHS {
        let path = Path::new(candidate);
        if path.is_dir() && is_writable(path) {
            debug!("Using tmpfs temp dir {:?}", path);
            return path.to_path_buf();
        }
    }
    let fallback = std::env::temp_dir();
    warn!(
        "No tmpfs available, decrypted text will touch {:?} until the editor exits",
        fallback
    );
    fallback
}

fn is_writable(dir: &Path) -> bool {
    tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .is_ok()
}

/// A temporary file holding plaintext, wiped when dropped.
///
/// ```no_run
/// use sealdoc::crypto::temp::PlaintextFile;
///
/// let file = PlaintextFile::create("draft", ".txt")?;
/// assert_eq!(file.read()?, "draft");
/// // overwritten and removed here
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PlaintextFile {
    file: Option<NamedTempFile>,
}

impl PlaintextFile {
    /// Write `contents` to a new owner-only temp file with the given suffix.
    ///
    /// The suffix lets editors pick a syntax mode from the plaintext name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be created or written.
    pub fn create(contents: &str, suffix: &str) -> AppResult<Self> {
        let dir = get_secure_temp_dir();
        // tempfile creates files with 0o600 on Unix
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(suffix)
            .tempfile_in(&dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        debug!("Created plaintext temp file {:?}", file.path());
        Ok(Self { file: Some(file) })
    }

    /// Path handed to the editor.
    pub fn path(&self) -> &Path {
        self.file
            .as_ref()
            .map(NamedTempFile::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Read the current contents back (after the editor exits).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file is missing or not UTF-8.
    pub fn read(&self) -> AppResult<String> {
        Ok(fs::read_to_string(self.path())?)
    }
}

impl Drop for PlaintextFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = secure_delete(file) {
                warn!("Failed to securely delete plaintext temp file: {}", e);
            }
        }
    }
}

/// Replace `path` with `contents` by writing an owner-only temp file next to
/// it and renaming it into place.
///
/// # Errors
///
/// Any I/O error from creating, writing, syncing or renaming the temp file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Best-effort secure file deletion (overwrite + remove).
///
/// Not cryptographically secure (SSD wear leveling, filesystem journals), but
/// better than a plain unlink. Editors may have replaced the file by rename, so
/// the overwrite goes through the path rather than the original handle.
fn secure_delete(file: NamedTempFile) -> std::io::Result<()> {
    let path = file.path().to_path_buf();
    if let Ok(metadata) = fs::metadata(&path) {
        let mut handle = OpenOptions::new().write(true).open(&path)?;
        let len = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        handle.write_all(&vec![0u8; len])?;
        handle.sync_all()?;
    }
    file.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_secure_temp_dir_exists() {
        let dir = get_secure_temp_dir();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_plaintext_file_roundtrip_and_cleanup() {
        let file = PlaintextFile::create("hello", ".md").unwrap();
        let path = file.path().to_path_buf();

        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".md"));
        assert_eq!(file.read().unwrap(), "hello");

        drop(file);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_plaintext_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let file = PlaintextFile::create("secret", ".txt").unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, crate::constants::DEFAULT_FILE_PERMISSIONS);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.enc");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.enc");
        write_atomic(&path, b"x").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, crate::constants::DEFAULT_FILE_PERMISSIONS);
    }

    #[test]
    fn test_cleanup_survives_editor_replacing_file() {
        let file = PlaintextFile::create("before", ".txt").unwrap();
        let path = file.path().to_path_buf();

        // editors like vim write a new file and rename it over the original
        let replacement = path.with_extension("swp");
        fs::write(&replacement, "after").unwrap();
        fs::rename(&replacement, &path).unwrap();

        assert_eq!(file.read().unwrap(), "after");
        drop(file);
        assert!(!path.exists());
    }
}
