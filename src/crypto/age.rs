//! In-process cipher backend using the age passphrase (scrypt) recipient.
//!
//! Useful where gpg is not installed. Ciphertext is the binary age format, so
//! it is armored exactly like gpg output before it reaches a buffer.

use crate::crypto::cipher::Cipher;
use crate::errors::CryptoError;
use age::secrecy::SecretString;
use std::io::{Read, Write};

/// Cipher backend backed by the `age` crate.
///
/// # Example
///
/// ```no_run
/// use sealdoc::crypto::{AgeCipher, Cipher};
/// use age::secrecy::SecretString;
///
/// let passphrase = SecretString::new("my-secret-passphrase".to_string());
/// let encrypted = AgeCipher.encrypt(b"Secret data", &passphrase)?;
/// let decrypted = AgeCipher.decrypt(&encrypted, &passphrase)?;
/// assert_eq!(decrypted, b"Secret data");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeCipher;

fn encryption_failed(message: impl ToString) -> CryptoError {
    CryptoError::EncryptionFailed {
        exit_code: None,
        diagnostics: message.to_string(),
    }
}

fn decryption_failed(message: impl ToString) -> CryptoError {
    CryptoError::DecryptionFailed {
        exit_code: None,
        diagnostics: message.to_string(),
    }
}

impl Cipher for AgeCipher {
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>, CryptoError> {
        let encryptor = age::Encryptor::with_user_passphrase(passphrase.clone());

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(encryption_failed)?;
        writer.write_all(plaintext).map_err(encryption_failed)?;
        writer.finish().map_err(encryption_failed)?;

        Ok(encrypted)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        passphrase: &SecretString,
    ) -> Result<Vec<u8>, CryptoError> {
        let decryptor = match age::Decryptor::new(ciphertext).map_err(decryption_failed)? {
            age::Decryptor::Passphrase(d) => d,
            _ => return Err(decryption_failed("not passphrase-encrypted")),
        };

        let mut reader = decryptor
            .decrypt(passphrase, None)
            .map_err(decryption_failed)?;
        let mut decrypted = Vec::new();
        reader
            .read_to_end(&mut decrypted)
            .map_err(decryption_failed)?;

        Ok(decrypted)
    }

    fn name(&self) -> &'static str {
        "age"
    }
}
