//! Cryptographic building blocks for encrypted documents.
//!
//! # Module Structure
//!
//! - `cipher`: the `Cipher` trait and the gpg process backend
//! - `age`: in-process backend using the age crate
//! - `armor`: text armor so ciphertext can live in a text buffer
//! - `temp`: secure temporary files for handing plaintext to an editor
//!
//! # Example
//!
//! ```
//! use sealdoc::crypto::armor::{armor, unarmor};
//!
//! let text = armor(&[0u8, 1, 2, 254, 255]);
//! assert_eq!(unarmor(&text)?, vec![0u8, 1, 2, 254, 255]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod age;
pub mod armor;
pub mod cipher;
pub mod temp;

use crate::config::{Backend, Config};

// Re-export commonly used types
pub use self::age::AgeCipher;
pub use self::armor::{armor, unarmor};
pub use self::cipher::{Cipher, GpgCipher};

/// Build the cipher backend selected by `config`.
pub fn cipher_from_config(config: &Config) -> Box<dyn Cipher> {
    match config.backend {
        Backend::Gpg => Box::new(GpgCipher::new(config.gpg_program.clone())),
        Backend::Age => Box::new(AgeCipher),
    }
}
