//! Encrypt a plain text file into a managed document.

use crate::config::Config;
use crate::crypto::temp::write_atomic;
use crate::crypto::{armor, cipher_from_config, Cipher};
use crate::errors::{AppError, AppResult, CryptoError};
use crate::host::lock::DocumentLock;
use crate::host::terminal::SecretSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// Encrypt `input` into `output` (default: `input` plus the managed suffix).
///
/// The input is left untouched. Returns the path written.
///
/// # Errors
///
/// Returns an error if:
/// - The input cannot be read or is not UTF-8 text
/// - The output already exists or is open in another session
/// - No usable new passphrase was entered
/// - Encryption fails
pub fn seal_file(config: &Config, input: &Path, output: Option<&Path>) -> AppResult<PathBuf> {
    seal_file_with(
        config,
        &cipher_from_config(config),
        &SecretSource::from_env(),
        input,
        output,
    )
}

/// [`seal_file`] with explicit collaborators.
///
/// # Errors
///
/// Same as [`seal_file`].
pub fn seal_file_with<C: Cipher + ?Sized>(
    config: &Config,
    cipher: &C,
    secrets: &SecretSource,
    input: &Path,
    output: Option<&Path>,
) -> AppResult<PathBuf> {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let mut name = input.as_os_str().to_os_string();
            name.push(&config.suffix);
            PathBuf::from(name)
        }
    };
    if output.exists() {
        return Err(AppError::Config(format!(
            "Refusing to overwrite existing file {:?}",
            output
        )));
    }

    let plaintext =
        Zeroizing::new(String::from_utf8(fs::read(input)?).map_err(CryptoError::NotText)?);

    let _lock = DocumentLock::acquire(&output)?;
    let passphrase = secrets.read_new()?;
    let ciphertext = cipher.encrypt(plaintext.as_bytes(), &passphrase)?;
    write_atomic(&output, armor(&ciphertext).as_bytes())?;

    info!("Sealed {:?} into {:?}", input, output);
    Ok(output)
}
