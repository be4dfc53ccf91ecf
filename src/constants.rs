//! Constants used throughout the application.
//!
//! Centralised so the CLI, configuration loader and session machinery agree on
//! names, defaults and wire-level details.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "sealdoc";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "Edit encrypted documents as if they were plain text";

// Logging
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable selecting the cipher backend (`gpg` or `age`).
pub const ENV_VAR_BACKEND: &str = "SEALDOC_BACKEND";
/// Environment variable overriding the gpg program.
pub const ENV_VAR_GPG: &str = "SEALDOC_GPG";
/// Environment variable overriding the managed file suffix.
pub const ENV_VAR_SUFFIX: &str = "SEALDOC_SUFFIX";
/// Environment variable overriding the idle re-lock delay, in minutes.
pub const ENV_VAR_RELOCK_MINUTES: &str = "SEALDOC_RELOCK_MINUTES";
/// Environment variable for specifying the preferred editor.
pub const ENV_VAR_SEALDOC_EDITOR: &str = "SEALDOC_EDITOR";
/// Standard environment variable for specifying the default editor.
pub const ENV_VAR_EDITOR: &str = "EDITOR";
/// Non-interactive passphrase used by the terminal host (tests and scripting).
pub const ENV_VAR_TEST_PASSPHRASE: &str = "SEALDOC_TEST_PASSPHRASE";

// Defaults
/// Default command for the editor if not specified otherwise.
pub const DEFAULT_EDITOR_COMMAND: &str = "vim";
/// Default gpg program.
pub const DEFAULT_GPG_PROGRAM: &str = "gpg";
/// Default suffix marking a managed document.
pub const DEFAULT_SUFFIX: &str = ".enc";
/// Default idle re-lock delay in minutes.
pub const DEFAULT_RELOCK_MINUTES: u64 = 10;

// Validation
/// Characters forbidden in editor commands for security reasons.
pub const EDITOR_FORBIDDEN_CHARS: &[char] =
    &['|', '&', ';', '$', '(', ')', '`', '\\', '<', '>', '\'', '"'];
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// Armor
/// Column at which armored text is wrapped.
pub const ARMOR_LINE_WIDTH: usize = 64;

// gpg invocation
/// Arguments shared by every gpg invocation. The passphrase is read from the
/// first line of standard input.
pub const GPG_COMMON_ARGS: &[&str] = &[
    "--batch",
    "--yes",
    "--quiet",
    "--no-tty",
    "--pinentry-mode",
    "loopback",
    "--passphrase-fd",
    "0",
];
/// Arguments selecting symmetric encryption to standard output.
pub const GPG_ENCRYPT_ARGS: &[&str] = &["--symmetric", "--output", "-"];
/// Arguments selecting decryption to standard output.
pub const GPG_DECRYPT_ARGS: &[&str] = &["--decrypt"];

// Prompt labels and notices
/// Label of the unlock prompt.
pub const PROMPT_UNLOCK: &str = "Enter password";
/// Label of the first round of a new-passphrase prompt.
pub const PROMPT_NEW: &str = "Enter new password";
/// Label of the confirmation round of a new-passphrase prompt.
pub const PROMPT_CONFIRM: &str = "Confirm password";
/// Notice shown when an unlock attempt fails.
pub const NOTICE_INVALID_PASSWORD: &str = "Invalid password.";
/// Notice shown when the confirmation round does not match.
pub const NOTICE_MISMATCH: &str = "Passwords do not match.";

// File System Parameters
/// Temporary filesystem paths to check for RAM-based storage.
pub const TMPFS_PATHS: &[&str] = &["/dev/shm", "/run/shm"];
/// Prefix of temporary files holding decrypted buffers.
pub const TEMP_FILE_PREFIX: &str = "sealdoc-";
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;
