//! Symmetric cipher backends.
//!
//! [`Cipher`] is the seam the session state machine encrypts through. The
//! production backend, [`GpgCipher`], shells out to gpg in batch mode; the
//! in-process alternative lives in [`crate::crypto::age`].

use crate::constants::{GPG_COMMON_ARGS, GPG_DECRYPT_ARGS, GPG_ENCRYPT_ARGS};
use crate::errors::CryptoError;
use age::secrecy::{ExposeSecret, SecretString};
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Passphrase-based symmetric encryption.
///
/// Implementations must be stateless with respect to passphrases: nothing
/// supplied to `encrypt` or `decrypt` may outlive the call.
pub trait Cipher {
    /// Encrypt `plaintext` under `passphrase`.
    ///
    /// # Errors
    ///
    /// `CryptoError::EncryptionFailed` if the backend rejects the operation, or
    /// `SpawnFailure`/`Communication`/`UnsupportedPassphrase` for process-level
    /// problems.
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt `ciphertext` under `passphrase`.
    ///
    /// # Errors
    ///
    /// `CryptoError::DecryptionFailed` for a wrong passphrase or corrupt input,
    /// or the process-level errors listed on [`Cipher::encrypt`].
    fn decrypt(&self, ciphertext: &[u8], passphrase: &SecretString)
        -> Result<Vec<u8>, CryptoError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

impl<C: Cipher + ?Sized> Cipher for Box<C> {
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>, CryptoError> {
        (**self).encrypt(plaintext, passphrase)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        passphrase: &SecretString,
    ) -> Result<Vec<u8>, CryptoError> {
        (**self).decrypt(ciphertext, passphrase)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Cipher backend that pipes data through an external gpg process.
///
/// The passphrase is written as the first line of the child's standard input
/// (`--passphrase-fd 0`) followed by the payload, so it never appears in the
/// process table. Any output on standard error, or a non-zero exit status,
/// counts as failure.
///
/// # Examples
///
/// ```no_run
/// use sealdoc::crypto::{Cipher, GpgCipher};
/// use age::secrecy::SecretString;
///
/// let gpg = GpgCipher::new("gpg");
/// let passphrase = SecretString::new("pw".to_string());
/// let ciphertext = gpg.encrypt(b"hello", &passphrase)?;
/// assert_eq!(gpg.decrypt(&ciphertext, &passphrase)?, b"hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct GpgCipher {
    program: String,
    encrypt_args: Vec<String>,
    decrypt_args: Vec<String>,
}

impl GpgCipher {
    /// Create a backend invoking `program` with the standard gpg arguments.
    pub fn new(program: impl Into<String>) -> Self {
        let with_common = |extra: &[&str]| {
            GPG_COMMON_ARGS
                .iter()
                .chain(extra)
                .map(|s| s.to_string())
                .collect()
        };
        Self {
            program: program.into(),
            encrypt_args: with_common(GPG_ENCRYPT_ARGS),
            decrypt_args: with_common(GPG_DECRYPT_ARGS),
        }
    }

    /// Create a backend with explicit argument lists.
    ///
    /// The program must follow the same protocol as gpg with `--passphrase-fd 0`:
    /// read one passphrase line from standard input, then the payload.
    pub fn with_args(
        program: impl Into<String>,
        encrypt_args: Vec<String>,
        decrypt_args: Vec<String>,
    ) -> Self {
        Self {
            program: program.into(),
            encrypt_args,
            decrypt_args,
        }
    }

    /// The program this backend runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(
        &self,
        direction: Direction,
        input: &[u8],
        passphrase: &SecretString,
    ) -> Result<Vec<u8>, CryptoError> {
        let secret = passphrase.expose_secret();
        if secret.contains(['\n', '\r']) {
            return Err(CryptoError::UnsupportedPassphrase(
                "line breaks cannot be passed to the cipher program".to_string(),
            ));
        }

        let args = match direction {
            Direction::Encrypt => &self.encrypt_args,
            Direction::Decrypt => &self.decrypt_args,
        };
        debug!(program = %self.program, ?direction, bytes = input.len(), "Invoking cipher program");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CryptoError::SpawnFailure {
                program: self.program.clone(),
                source,
            })?;
        let mut guard = ChildGuard::new(child);

        let mut feed = Zeroizing::new(Vec::with_capacity(secret.len() + 1 + input.len()));
        feed.extend_from_slice(secret.as_bytes());
        feed.push(b'\n');
        feed.extend_from_slice(input);

        let transfer = guard.communicate(&feed);
        let (stdout, stderr, status) = match transfer {
            Ok(result) => result,
            Err(Transfer { source, stderr, status }) => {
                // A child that exited early on bad input shows up as a broken pipe;
                // its own diagnostics are the more useful report. A child we had
                // to kill has no exit code.
                if let Some(status) = status.filter(|s| s.code().is_some()) {
                    if !stderr.is_empty() || !status.success() {
                        return Err(failure(direction, status, &stderr));
                    }
                }
                warn!(program = %self.program, error = %source, "Cipher program transfer failed");
                return Err(CryptoError::Communication {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        if !stderr.is_empty() || !status.success() {
            return Err(failure(direction, status, &stderr));
        }
        Ok(stdout)
    }
}

fn failure(direction: Direction, status: ExitStatus, stderr: &[u8]) -> CryptoError {
    let exit_code = status.code();
    let diagnostics = String::from_utf8_lossy(stderr).trim_end().to_string();
    match direction {
        Direction::Encrypt => CryptoError::EncryptionFailed {
            exit_code,
            diagnostics,
        },
        Direction::Decrypt => CryptoError::DecryptionFailed {
            exit_code,
            diagnostics,
        },
    }
}

impl Cipher for GpgCipher {
    fn encrypt(&self, plaintext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>, CryptoError> {
        self.run(Direction::Encrypt, plaintext, passphrase)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        passphrase: &SecretString,
    ) -> Result<Vec<u8>, CryptoError> {
        self.run(Direction::Decrypt, ciphertext, passphrase)
    }

    fn name(&self) -> &'static str {
        "gpg"
    }
}

/// Outcome of a failed transfer: the I/O error plus whatever the child managed
/// to report before it was reaped.
struct Transfer {
    source: io::Error,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
}

/// Owns a spawned child and guarantees it is killed and reaped on every exit
/// path, including panics in the pipe threads.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Feed `input` to the child's stdin while draining stdout and stderr, then
    /// wait for it to exit.
    fn communicate(&mut self, input: &[u8]) -> Result<(Vec<u8>, Vec<u8>, ExitStatus), Transfer> {
        let Some(child) = self.child.as_mut() else {
            return Err(Transfer {
                source: io::Error::other("child already reaped"),
                stderr: Vec::new(),
                status: None,
            });
        };
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Transfer {
                source: io::Error::other("child pipes were not captured"),
                stderr: Vec::new(),
                status: None,
            });
        };

        let (written, out, err) = thread::scope(|scope| {
            let writer = scope.spawn(move || write_all_and_close(stdin, input));
            let out_reader = scope.spawn(move || drain(stdout));
            let err_reader = scope.spawn(move || drain(stderr));
            (join(writer), join(out_reader), join(err_reader))
        });

        let (stdout_bytes, stderr_bytes) = match (written, out, err) {
            (Ok(()), Ok(out), Ok(err)) => (out, err),
            (written, out, err) => {
                let stderr = err.as_ref().ok().cloned().unwrap_or_default();
                let source = written
                    .err()
                    .or(out.err())
                    .or(err.err())
                    .unwrap_or_else(|| io::Error::other("cipher pipe failed"));
                let status = self.terminate();
                return Err(Transfer {
                    source,
                    stderr,
                    status,
                });
            }
        };

        let status = self.wait().map_err(|source| Transfer {
            source,
            stderr: stderr_bytes.clone(),
            status: None,
        })?;
        Ok((stdout_bytes, stderr_bytes, status))
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.take() {
            Some(mut child) => child.wait(),
            None => Err(io::Error::other("child already reaped")),
        }
    }

    /// Kill and reap the child. A child that had already exited keeps its own
    /// exit status; one we killed reports no exit code.
    fn terminate(&mut self) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        if let Err(e) = child.kill() {
            debug!(error = %e, "Cipher program could not be signalled");
        }
        match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "Failed to reap cipher program");
                None
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.terminate();
        }
    }
}

// Takes ownership so the pipe closes on return, signalling end of input.
fn write_all_and_close(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    stdin.write_all(input)?;
    stdin.flush()
}

fn drain<R: Read>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("cipher pipe thread panicked")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn passphrase(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn shell(encrypt: &str, decrypt: &str) -> GpgCipher {
        GpgCipher::with_args(
            "sh",
            vec!["-c".to_string(), encrypt.to_string()],
            vec!["-c".to_string(), decrypt.to_string()],
        )
    }

    #[test]
    fn test_passphrase_travels_on_first_stdin_line() {
        let cipher = shell(r#"read pass; printf '%s|' "$pass"; cat"#, "cat");

        let out = cipher.encrypt(b"payload", &passphrase("s3cret")).unwrap();

        assert_eq!(out, b"s3cret|payload");
    }

    #[test]
    fn test_default_args_never_contain_the_passphrase() {
        let cipher = GpgCipher::new("gpg");
        assert!(cipher.encrypt_args.iter().any(|a| a == "--symmetric"));
        assert!(cipher.decrypt_args.iter().any(|a| a == "--decrypt"));
        for args in [&cipher.encrypt_args, &cipher.decrypt_args] {
            assert!(args.windows(2).any(|w| w[0] == "--passphrase-fd" && w[1] == "0"));
            assert!(!args.iter().any(|a| a == "--passphrase"));
        }
    }

    #[test]
    fn test_stderr_output_is_failure_even_with_zero_exit() {
        let cipher = shell("cat >/dev/null; echo 'warning: weak' >&2; exit 0", "cat");

        let err = cipher.encrypt(b"data", &passphrase("pw")).unwrap_err();

        match err {
            CryptoError::EncryptionFailed {
                exit_code,
                diagnostics,
            } => {
                assert_eq!(exit_code, Some(0));
                assert_eq!(diagnostics, "warning: weak");
            }
            other => panic!("Expected EncryptionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_exit_is_decryption_failure() {
        let cipher = shell("cat", "cat >/dev/null; exit 2");

        let err = cipher.decrypt(b"data", &passphrase("pw")).unwrap_err();

        assert!(matches!(
            err,
            CryptoError::DecryptionFailed {
                exit_code: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_child_exiting_before_reading_input_reports_its_diagnostics() {
        let cipher = shell("cat", "echo 'bad session key' >&2; exit 2");
        let large = vec![b'x'; 4 * 1024 * 1024];

        let err = cipher.decrypt(&large, &passphrase("pw")).unwrap_err();

        match err {
            CryptoError::DecryptionFailed { diagnostics, .. } => {
                assert!(diagnostics.contains("bad session key"))
            }
            other => panic!("Expected DecryptionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_large_payload_does_not_deadlock() {
        let cipher = shell("read pass; cat", "read pass; cat");
        let large: Vec<u8> = (0..=255u8).cycle().take(2 * 1024 * 1024).collect();

        let out = cipher.encrypt(&large, &passphrase("pw")).unwrap();

        assert_eq!(out, large);
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let cipher = GpgCipher::new("/nonexistent/sealdoc-gpg");

        let err = cipher.encrypt(b"data", &passphrase("pw")).unwrap_err();

        assert!(matches!(err, CryptoError::SpawnFailure { .. }));
    }

    #[test]
    fn test_multiline_passphrase_is_rejected_before_spawning() {
        let cipher = GpgCipher::new("/nonexistent/sealdoc-gpg");

        let err = cipher.encrypt(b"data", &passphrase("a\nb")).unwrap_err();

        assert!(matches!(err, CryptoError::UnsupportedPassphrase(_)));
    }
}
