//! Error handling utilities for the sealdoc application.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, the
//! domain-specific error enums it wraps, and the convenience alias `AppResult`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents specific error cases that can occur when interacting with external editors.
///
/// # Examples
///
/// ```
/// use sealdoc::errors::EditorError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "command not found");
/// let error = EditorError::CommandNotFound {
///     command: "vim".to_string(),
///     source: io_error,
/// };
///
/// assert!(format!("{}", error).contains("not found"));
/// assert!(format!("{}", error).contains("vim"));
/// ```
#[derive(Debug, Error)]
pub enum EditorError {
    /// Error when the specified editor command cannot be found.
    #[error("Editor command '{command}' not found: {source}. Please check that the editor is installed and available in your PATH.")]
    CommandNotFound {
        /// The editor command that was not found
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when permission is denied to execute the editor command.
    #[error("Permission denied when trying to execute editor '{command}': {source}. Please check file permissions or try running with appropriate access rights.")]
    PermissionDenied {
        /// The editor command that had permission denied
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor command fails to execute due to other I/O errors.
    #[error("Failed to execute editor '{command}': {source}. Please check system resources, disk space, or editor installation.")]
    ExecutionFailed {
        /// The editor command that failed to execute
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor exits with a non-zero status code.
    #[error("Editor '{command}' exited with non-zero status code: {status_code}. Your changes were not applied to the document.")]
    NonZeroExit {
        /// The editor command that exited with a non-zero status
        command: String,
        /// The exit status code
        status_code: i32,
    },
}

/// Errors raised while guarding a document against concurrent sessions.
///
/// ```
/// use sealdoc::errors::LockError;
/// use std::path::PathBuf;
///
/// let error = LockError::FileBusy {
///     path: PathBuf::from("/notes/secret.enc"),
/// };
///
/// assert!(format!("{}", error).contains("already open"));
/// ```
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock on the document.
    #[error("Document is already open in another sealdoc session: {path}. Close the other session and try again.")]
    FileBusy {
        /// The path to the locked document
        path: PathBuf,
    },

    /// Acquiring the lock failed for a technical reason.
    #[error("Failed to acquire lock for document {path}: {source}. Please check file permissions and ensure the directory is accessible.")]
    AcquisitionFailed {
        /// The path to the document that couldn't be locked
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Failures of the cipher backends, the armor codec and passphrase entry.
///
/// Wrong passphrases and tool misconfiguration are deliberately reported through
/// the same `DecryptionFailed` variant: the external tool does not let us tell
/// them apart reliably.
///
/// ```
/// use sealdoc::errors::CryptoError;
///
/// let error = CryptoError::DecryptionFailed {
///     exit_code: Some(2),
///     diagnostics: "gpg: decryption failed: Bad session key".to_string(),
/// };
/// let message = format!("{}", error);
/// assert!(message.contains("Decryption failed"));
/// assert!(message.contains("Bad session key"));
/// ```
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The cipher program could not be started.
    #[error("Failed to start cipher program '{program}': {source}. Check that it is installed or set SEALDOC_GPG.")]
    SpawnFailure {
        /// The program that failed to spawn
        program: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Piping data to or from the cipher program failed mid-transfer.
    #[error("Lost communication with cipher program '{program}': {source}")]
    Communication {
        /// The program being talked to
        program: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Encryption was rejected by the backend.
    #[error("Encryption failed with code {}:\n{diagnostics}", display_code(.exit_code))]
    EncryptionFailed {
        /// Exit status of the external tool, if one was involved
        exit_code: Option<i32>,
        /// Diagnostic text reported by the backend
        diagnostics: String,
    },

    /// Decryption was rejected by the backend (wrong passphrase or tool error).
    #[error("Decryption failed with code {}:\n{diagnostics}", display_code(.exit_code))]
    DecryptionFailed {
        /// Exit status of the external tool, if one was involved
        exit_code: Option<i32>,
        /// Diagnostic text reported by the backend
        diagnostics: String,
    },

    /// The stored text is not valid armor.
    #[error("Malformed armor: {0}")]
    MalformedArmor(#[source] base64::DecodeError),

    /// Decryption succeeded but produced bytes that are not UTF-8 text.
    #[error("Decrypted content is not valid UTF-8 text")]
    NotText(#[source] std::string::FromUtf8Error),

    /// The passphrase cannot be delivered to the backend.
    #[error("Unsupported passphrase: {0}")]
    UnsupportedPassphrase(String),

    /// An empty passphrase was entered where one is required.
    #[error("Passphrase cannot be empty")]
    EmptyPassphrase,

    /// The confirmation of a new passphrase did not match.
    #[error("Passphrases do not match")]
    PassphraseMismatch,

    /// Reading the passphrase from the terminal failed.
    #[error("Failed to read passphrase: {0}")]
    PassphrasePrompt(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Represents all possible errors that can occur in the sealdoc application.
///
/// Note: This type does not implement `Clone` to avoid losing error context when
/// cloning `std::io::Error` values.
///
/// # Examples
///
/// ```
/// use sealdoc::errors::AppError;
///
/// let error = AppError::Config("Managed suffix is empty".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Managed suffix is empty");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors when interacting with the text editor.
    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    /// Errors related to document locking.
    #[error("File locking error: {0}")]
    Lock(#[from] LockError),

    /// Errors related to cryptographic operations.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// A document session ended without reaching the requested state.
    #[error("Session error: {0}")]
    Session(String),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;
