//! Configuration management for the sealdoc application.
//!
//! This module handles loading and validating configuration settings from
//! environment variables, with sensible defaults.
//!
//! # Environment Variables
//!
//! - `SEALDOC_BACKEND`: cipher backend, `gpg` (default) or `age`
//! - `SEALDOC_GPG`: gpg program to run (defaults to `gpg`, `~` is expanded)
//! - `SEALDOC_SUFFIX`: filename suffix of managed documents (defaults to `.enc`)
//! - `SEALDOC_RELOCK_MINUTES`: idle minutes before an unlocked document re-locks (defaults to 10)
//! - `SEALDOC_EDITOR`: editor used by `sealdoc open`
//! - `EDITOR`: fallback editor if SEALDOC_EDITOR is not set (defaults to "vim")

use crate::constants::{
    DEFAULT_EDITOR_COMMAND, DEFAULT_GPG_PROGRAM, DEFAULT_RELOCK_MINUTES, DEFAULT_SUFFIX,
    EDITOR_FORBIDDEN_CHARS, ENV_VAR_BACKEND, ENV_VAR_EDITOR, ENV_VAR_GPG, ENV_VAR_RELOCK_MINUTES,
    ENV_VAR_SEALDOC_EDITOR, ENV_VAR_SUFFIX, REDACTED_PLACEHOLDER,
};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which cipher implementation encrypts documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// External gpg process (symmetric mode).
    #[default]
    Gpg,
    /// In-process age passphrase encryption.
    Age,
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpg" => Ok(Backend::Gpg),
            "age" => Ok(Backend::Age),
            other => Err(AppError::Config(format!(
                "Unknown cipher backend '{}'. Expected 'gpg' or 'age'",
                other
            ))),
        }
    }
}

/// Configuration for the sealdoc application.
///
/// # Examples
///
/// Creating a configuration manually:
/// ```
/// use sealdoc::config::{Backend, Config};
/// use std::time::Duration;
///
/// let config = Config {
///     backend: Backend::Age,
///     gpg_program: "gpg".to_string(),
///     suffix: ".enc".to_string(),
///     relock_timeout: Duration::from_secs(600),
///     editor: "nano".to_string(),
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Config {
    /// Cipher implementation.
    pub backend: Backend,

    /// Program invoked by the gpg backend.
    pub gpg_program: String,

    /// Filename suffix marking a managed document.
    pub suffix: String,

    /// Inactivity window after which an unlocked document re-locks.
    pub relock_timeout: Duration,

    /// Editor command used by the terminal host.
    ///
    /// Loaded from SEALDOC_EDITOR, then EDITOR, then defaults to "vim".
    pub editor: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("gpg_program", &REDACTED_PLACEHOLDER)
            .field("suffix", &self.suffix)
            .field("relock_timeout", &self.relock_timeout)
            .field("editor", &REDACTED_PLACEHOLDER)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::default(),
            gpg_program: DEFAULT_GPG_PROGRAM.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            relock_timeout: Duration::from_secs(DEFAULT_RELOCK_MINUTES * 60),
            editor: DEFAULT_EDITOR_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// Validates an editor command string for security.
    ///
    /// The command must be non-empty and contain neither spaces nor shell
    /// metacharacters; it is executed directly, never through a shell.
    fn validate_editor_command(editor_cmd: &str) -> AppResult<&str> {
        if editor_cmd.is_empty() {
            return Err(AppError::Config(
                "Editor command cannot be empty".to_string(),
            ));
        }

        if editor_cmd.contains(' ') {
            return Err(AppError::Config(
                "Editor command cannot contain spaces. Use a wrapper script or shell alias for editors requiring arguments".to_string(),
            ));
        }

        for &ch in EDITOR_FORBIDDEN_CHARS.iter() {
            if editor_cmd.contains(ch) {
                return Err(AppError::Config(format!(
                    "Editor command cannot contain shell metacharacters: '{}'. Use a wrapper script or shell alias instead",
                    ch
                )));
            }
        }

        Ok(editor_cmd)
    }

    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The backend name is unknown
    /// - The gpg program path expansion fails
    /// - The re-lock delay is not a positive whole number of minutes
    /// - The editor command fails validation
    /// - The resulting configuration fails [`Config::validate`]
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sealdoc::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Managing files ending in {}", config.suffix),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let backend = match env::var(ENV_VAR_BACKEND) {
            Ok(value) => value.parse()?,
            Err(_) => Backend::default(),
        };

        let gpg_raw = env::var(ENV_VAR_GPG).unwrap_or_else(|_| DEFAULT_GPG_PROGRAM.to_string());
        let gpg_program = shellexpand::full(&gpg_raw)
            .map_err(|e| AppError::Config(format!("Failed to expand gpg program path: {}", e)))?
            .into_owned();

        let suffix = env::var(ENV_VAR_SUFFIX).unwrap_or_else(|_| DEFAULT_SUFFIX.to_string());

        let relock_timeout = match env::var(ENV_VAR_RELOCK_MINUTES) {
            Ok(value) => {
                let minutes: u64 = value.trim().parse().map_err(|_| {
                    AppError::Config(format!(
                        "{} must be a whole number of minutes, got '{}'",
                        ENV_VAR_RELOCK_MINUTES, value
                    ))
                })?;
                let secs = minutes.checked_mul(60).ok_or_else(|| {
                    AppError::Config(format!(
                        "{} is too large, got '{}'",
                        ENV_VAR_RELOCK_MINUTES, value
                    ))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_RELOCK_MINUTES * 60),
        };

        let editor_raw = env::var(ENV_VAR_SEALDOC_EDITOR)
            .or_else(|_| env::var(ENV_VAR_EDITOR))
            .unwrap_or_else(|_| DEFAULT_EDITOR_COMMAND.to_string());
        let editor = Config::validate_editor_command(&editor_raw)?.to_string();

        let config = Config {
            backend,
            gpg_program,
            suffix,
            relock_timeout,
            editor,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the suffix is empty or does not start with
    /// `.`, the re-lock delay is zero, or the gpg program or editor is empty.
    pub fn validate(&self) -> AppResult<()> {
        if self.suffix.len() < 2 || !self.suffix.starts_with('.') {
            return Err(AppError::Config(format!(
                "Managed suffix must start with '.' and name an extension, got '{}'",
                self.suffix
            )));
        }

        if self.relock_timeout.is_zero() {
            return Err(AppError::Config(
                "Re-lock delay must be at least one minute".to_string(),
            ));
        }

        if self.backend == Backend::Gpg && self.gpg_program.is_empty() {
            return Err(AppError::Config("gpg program is empty".to_string()));
        }

        if self.editor.is_empty() {
            return Err(AppError::Config("Editor command is empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_VARS: &[&str] = &[
        ENV_VAR_BACKEND,
        ENV_VAR_GPG,
        ENV_VAR_SUFFIX,
        ENV_VAR_RELOCK_MINUTES,
        ENV_VAR_SEALDOC_EDITOR,
        ENV_VAR_EDITOR,
    ];

    /// Runs `f` with a clean set of sealdoc variables, restoring the originals after.
    fn with_clean_env<T>(f: impl FnOnce() -> T) -> T {
        let saved: Vec<_> = ALL_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
        for key in ALL_VARS {
            env::remove_var(key);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_debug_impl_redacts_sensitive_info() {
        let config = Config {
            gpg_program: "/home/username/bin/gpg2".to_string(),
            editor: "/home/username/bin/my-vim".to_string(),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains(REDACTED_PLACEHOLDER));
        assert!(!debug_output.contains("/home/username"));
        assert!(debug_output.contains(".enc"));
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        let config = with_clean_env(Config::load).unwrap();

        assert_eq!(config.backend, Backend::Gpg);
        assert_eq!(config.gpg_program, "gpg");
        assert_eq!(config.suffix, ".enc");
        assert_eq!(config.relock_timeout, Duration::from_secs(600));
        assert_eq!(config.editor, "vim");
    }

    #[test]
    #[serial]
    fn test_load_overrides() {
        let config = with_clean_env(|| {
            env::set_var(ENV_VAR_BACKEND, "AGE");
            env::set_var(ENV_VAR_SUFFIX, ".sealed");
            env::set_var(ENV_VAR_RELOCK_MINUTES, "3");
            env::set_var(ENV_VAR_EDITOR, "nano");
            Config::load()
        })
        .unwrap();

        assert_eq!(config.backend, Backend::Age);
        assert_eq!(config.suffix, ".sealed");
        assert_eq!(config.relock_timeout, Duration::from_secs(180));
        assert_eq!(config.editor, "nano");
    }

    #[test]
    #[serial]
    fn test_sealdoc_editor_takes_precedence() {
        let config = with_clean_env(|| {
            env::set_var(ENV_VAR_EDITOR, "nano");
            env::set_var(ENV_VAR_SEALDOC_EDITOR, "code");
            Config::load()
        })
        .unwrap();

        assert_eq!(config.editor, "code");
    }

    #[test]
    #[serial]
    fn test_gpg_program_is_expanded() {
        let config = with_clean_env(|| {
            env::set_var(ENV_VAR_GPG, "$HOME/bin/gpg");
            Config::load()
        })
        .unwrap();

        assert!(!config.gpg_program.contains("$HOME"));
        assert!(config.gpg_program.ends_with("/bin/gpg"));
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_config_errors() {
        let cases = [
            (ENV_VAR_BACKEND, "rot13", "Unknown cipher backend"),
            (ENV_VAR_RELOCK_MINUTES, "soon", "whole number of minutes"),
            (ENV_VAR_RELOCK_MINUTES, "0", "at least one minute"),
            (ENV_VAR_RELOCK_MINUTES, "18446744073709551615", "too large"),
            (ENV_VAR_SUFFIX, "enc", "must start with '.'"),
            (ENV_VAR_EDITOR, "vim --noplugin", "cannot contain spaces"),
        ];

        for (key, value, expected) in cases {
            let result = with_clean_env(|| {
                env::set_var(key, value);
                Config::load()
            });
            match result {
                Err(AppError::Config(msg)) => assert!(
                    msg.contains(expected),
                    "{}={} gave '{}'",
                    key,
                    value,
                    msg
                ),
                other => panic!("Expected Config error for {}={}, got {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_validate_editor_command_with_metacharacters() {
        let test_cases = [
            ("echo>/tmp/file", '>'),
            ("echo|cat", '|'),
            ("vim;echo", ';'),
            ("$(echo)", '$'),
            ("`echo`", '`'),
            ("vim\\test", '\\'),
        ];

        for (cmd, char) in test_cases.iter() {
            match Config::validate_editor_command(cmd) {
                Err(AppError::Config(msg)) => {
                    assert!(msg.contains("Editor command cannot contain shell metacharacters"));
                    assert!(msg.contains(&char.to_string()));
                }
                _ => panic!("Expected Config error for metacharacter '{}'", char),
            }
        }
    }

    #[test]
    fn test_validate_rejects_empty_gpg_only_for_gpg_backend() {
        let gpg = Config {
            gpg_program: String::new(),
            ..Config::default()
        };
        assert!(gpg.validate().is_err());

        let age = Config {
            backend: Backend::Age,
            gpg_program: String::new(),
            ..Config::default()
        };
        assert!(age.validate().is_ok());
    }
}
