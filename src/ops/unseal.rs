//! Decrypt a managed document for reading.

use crate::config::Config;
use crate::crypto::{cipher_from_config, unarmor, Cipher};
use crate::errors::{AppResult, CryptoError};
use crate::host::terminal::SecretSource;
use std::fs;
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// Decrypt `input` and return its text. Nothing is written to disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the armor is malformed, the
/// passphrase is wrong or the plaintext is not UTF-8.
pub fn unseal_file(config: &Config, input: &Path) -> AppResult<Zeroizing<String>> {
    unseal_file_with(&cipher_from_config(config), &SecretSource::from_env(), input)
}

/// [`unseal_file`] with explicit collaborators.
///
/// # Errors
///
/// Same as [`unseal_file`].
pub fn unseal_file_with<C: Cipher + ?Sized>(
    cipher: &C,
    secrets: &SecretSource,
    input: &Path,
) -> AppResult<Zeroizing<String>> {
    let armored = fs::read_to_string(input)?;
    let ciphertext = unarmor(&armored)?;
    let passphrase = secrets.read_existing()?;

    debug!("Decrypting {:?} with {}", input, cipher.name());
    let plaintext = cipher.decrypt(&ciphertext, &passphrase)?;
    let text = String::from_utf8(plaintext).map_err(CryptoError::NotText)?;
    Ok(Zeroizing::new(text))
}
