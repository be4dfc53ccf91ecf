//! Per-document session: the state machine that keeps a managed document
//! encrypted at rest while it is edited as plain text.
//!
//! # Module Structure
//!
//! - `prompt`: generation-tagged secret prompts
//! - `timer`: idle re-lock tickets
//!
//! # States
//!
//! ```text
//!            activate (managed)            accept
//!   Inert ----------------------> AwaitingPassword ------> Unlocked
//!     ^            cancel (close)        |    ^              |  ^
//!     +----------------------------------+    |   save       v  | saved
//!                                             |            Busy-+
//!                                  saved      |   idle       |
//!                              Locked <-------+--------- Unlocked
//! ```
//!
//! Every handler starts with a dispatch on the current state. Cipher and codec
//! failures never escape a handler: they become a notice plus a defined
//! transition.

pub mod prompt;
pub mod timer;

use crate::config::Config;
use crate::constants::{NOTICE_INVALID_PASSWORD, NOTICE_MISMATCH};
use crate::crypto::{armor, unarmor, Cipher};
use crate::errors::CryptoError;
use crate::host::DocumentHost;
use age::secrecy::SecretString;
use prompt::{secrets_match, PromptFlow, PromptGeneration, PromptPurpose, Submission};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timer::{IdleTimer, TimerTicket};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Opaque identity of one open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0.simple())
    }
}

/// Lifecycle state of a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not managed, or not yet activated.
    Inert,
    /// A prompt is live and the document is read-only.
    AwaitingPassword,
    /// Sealed by the idle timer; the forced save is pending.
    Locked,
    /// Plaintext in the buffer, passphrase cached.
    Unlocked,
    /// Ciphertext in the buffer while a save is in flight.
    Busy,
}

/// Verdict of the pre-save hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    Proceed,
    Abort,
}

/// Tunables shared by all sessions of one process.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Filename suffix marking managed documents.
    pub suffix: String,
    /// Inactivity before the document is sealed again.
    pub relock_timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            suffix: config.suffix.clone(),
            relock_timeout: config.relock_timeout,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One open document and everything needed to keep it sealed on disk.
pub struct DocumentSession<C: Cipher> {
    id: DocumentId,
    cipher: C,
    options: SessionOptions,
    state: SessionState,
    tracked_path: Option<PathBuf>,
    passphrase: Option<SecretString>,
    activated: bool,
    prompt: PromptFlow,
    timer: IdleTimer,
    stash: Option<Zeroizing<String>>,
    last_internal_write: Option<blake3::Hash>,
    pending_echoes: usize,
    // a failed save left the buffer's edits only in memory
    unsaved_buffer: bool,
    // ciphertext left in the buffer when the document was released unopened
    released_ciphertext: Option<blake3::Hash>,
}

impl<C: Cipher> DocumentSession<C> {
    pub fn new(cipher: C, options: SessionOptions) -> Self {
        let timer = IdleTimer::new(options.relock_timeout);
        Self {
            id: DocumentId::new(),
            cipher,
            options,
            state: SessionState::Inert,
            tracked_path: None,
            passphrase: None,
            activated: false,
            prompt: PromptFlow::new(),
            timer,
            stash: None,
            last_internal_write: None,
            pending_echoes: 0,
            unsaved_buffer: false,
            released_ciphertext: None,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last path observed at activation or after a save.
    pub fn tracked_path(&self) -> Option<&Path> {
        self.tracked_path.as_deref()
    }

    pub fn has_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Generation of the live prompt, if one is showing.
    pub fn prompt_generation(&self) -> Option<PromptGeneration> {
        self.prompt.current_generation()
    }

    /// Whether `path` carries the managed suffix.
    pub fn is_managed(&self, path: Option<&Path>) -> bool {
        path.map(|p| p.as_os_str().to_string_lossy().ends_with(&self.options.suffix))
            .unwrap_or(false)
    }

    /// First activation of the document view. Later activations are no-ops.
    #[instrument(skip_all, fields(document = %self.id))]
    pub fn on_activated(&mut self, host: &mut dyn DocumentHost) {
        if self.activated {
            return;
        }
        self.activated = true;
        self.tracked_path = host.current_path();

        match self.state {
            SessionState::Inert if self.is_managed(self.tracked_path.as_deref()) => {
                info!("Managed document opened, asking for password");
                self.begin_unlock(host);
            }
            _ => debug!("Activated unmanaged document"),
        }
    }

    /// Pre-write hook. May rewrite the buffer to ciphertext, or veto the save.
    #[instrument(skip_all, fields(document = %self.id, state = ?self.state))]
    pub fn on_before_save(&mut self, host: &mut dyn DocumentHost) -> SaveDecision {
        let path = host.current_path();
        let managed = self.is_managed(path.as_deref());

        match self.state {
            SessionState::Inert => {
                if !managed {
                    SaveDecision::Proceed
                } else if self.holds_released_ciphertext(host) {
                    info!("Unopened ciphertext saved back under a managed name");
                    SaveDecision::Proceed
                } else {
                    info!("Document is becoming managed, asking for a new password");
                    self.released_ciphertext = None;
                    self.begin_new_passphrase(host);
                    SaveDecision::Abort
                }
            }
            SessionState::AwaitingPassword => {
                if !managed {
                    info!("Saved under an unmanaged name, releasing document");
                    let unopened = self.prompt.purpose().is_some_and(PromptPurpose::is_unlock);
                    self.release(host);
                    if unopened {
                        self.released_ciphertext =
                            Some(blake3::hash(host.read_buffer().as_bytes()));
                    }
                    SaveDecision::Proceed
                } else if self.prompt.purpose().is_some_and(PromptPurpose::is_unlock) {
                    // buffer still holds the ciphertext that was loaded
                    SaveDecision::Proceed
                } else {
                    debug!("Save held back until a password is chosen");
                    SaveDecision::Abort
                }
            }
            SessionState::Unlocked => {
                if managed {
                    self.seal_for_save(host)
                } else {
                    info!("Saved under an unmanaged name, writing plain text");
                    self.release(host);
                    SaveDecision::Proceed
                }
            }
            SessionState::Locked | SessionState::Busy => SaveDecision::Proceed,
        }
    }

    /// Post-write hook, after the host reports a successful write.
    #[instrument(skip_all, fields(document = %self.id, state = ?self.state))]
    pub fn on_after_save(&mut self, host: &mut dyn DocumentHost) {
        self.tracked_path = host.current_path();

        match self.state {
            SessionState::Busy => self.reopen_after_save(host),
            SessionState::Locked => {
                info!("Locked document saved");
                host.set_unmodified(true);
                self.unsaved_buffer = false;
                self.begin_unlock(host);
            }
            SessionState::Inert
                if self.released_ciphertext.is_some()
                    && self.is_managed(self.tracked_path.as_deref()) =>
            {
                self.released_ciphertext = None;
                info!("Document is managed again, asking for password");
                self.begin_unlock(host);
            }
            _ => trace!("Nothing to do after save"),
        }
    }

    /// The host could not write the document.
    #[instrument(skip_all, fields(document = %self.id, state = ?self.state))]
    pub fn on_save_failed(&mut self, host: &mut dyn DocumentHost) {
        match self.state {
            SessionState::Busy => match self.stash.take() {
                Some(plaintext) => {
                    warn!("Save failed, restoring plain text");
                    self.write_internal(host, &plaintext);
                    host.set_unmodified(false);
                    self.state = SessionState::Unlocked;
                    self.timer.cancel_and_reschedule(host);
                }
                None => {
                    self.unsaved_buffer = true;
                    self.fall_back_to_unlock(host);
                }
            },
            SessionState::Locked => {
                warn!("Save of locked document failed, edits are only in the buffer");
                self.unsaved_buffer = true;
                self.begin_unlock(host);
            }
            _ => {}
        }
    }

    /// The buffer text changed.
    pub fn on_modified(&mut self, host: &mut dyn DocumentHost) {
        self.pending_echoes = self.pending_echoes.saturating_sub(1);
        // the fingerprint only covers echoes still due
        let fingerprint = if self.pending_echoes == 0 {
            self.last_internal_write.take()
        } else {
            self.last_internal_write
        };
        if self.state != SessionState::Unlocked {
            trace!("Ignoring modification in state {:?}", self.state);
            return;
        }
        if fingerprint.is_some_and(|hash| blake3::hash(host.read_buffer().as_bytes()) == hash) {
            trace!("Ignoring echo of internal write");
            return;
        }
        self.last_internal_write = None;
        host.set_unmodified(false);
        self.timer.cancel_and_reschedule(host);
    }

    pub fn on_prompt_changed(
        &mut self,
        generation: PromptGeneration,
        value: &str,
        host: &mut dyn DocumentHost,
    ) {
        if self.state != SessionState::AwaitingPassword {
            debug!("Ignoring prompt change in state {:?}", self.state);
            return;
        }
        self.prompt.on_change(generation, value, host);
    }

    #[instrument(skip_all, fields(document = %self.id, %generation))]
    pub fn on_prompt_submitted(&mut self, generation: PromptGeneration, host: &mut dyn DocumentHost) {
        let Some(submission) = self.prompt.submit(generation) else {
            return;
        };

        match submission {
            Submission::Cancelled { purpose } => self.abandon_prompt(purpose, host),
            Submission::Secret { secret, purpose } => match purpose {
                PromptPurpose::Unlock => self.try_unlock(secret, host),
                PromptPurpose::NewPassphrase => {
                    self.prompt
                        .begin(PromptPurpose::ConfirmPassphrase { first: secret }, host);
                }
                PromptPurpose::ConfirmPassphrase { first } => {
                    if secrets_match(&first, &secret) {
                        self.adopt_passphrase(secret, host);
                    } else {
                        warn!("Password confirmation did not match");
                        host.notify_error(NOTICE_MISMATCH);
                        self.prompt.begin(PromptPurpose::NewPassphrase, host);
                    }
                }
            },
        }
    }

    /// Host-level cancel, e.g. Escape. Same outcome as an empty entry.
    #[instrument(skip_all, fields(document = %self.id, %generation))]
    pub fn on_prompt_cancelled(&mut self, generation: PromptGeneration, host: &mut dyn DocumentHost) {
        if let Some(purpose) = self.prompt.cancel(generation) {
            self.abandon_prompt(purpose, host);
        }
    }

    /// Idle re-lock. Acts only on the newest ticket of an open, unlocked
    /// document.
    #[instrument(skip_all, fields(document = %self.id, ticket = ticket.value()))]
    pub fn on_timer_fired(&mut self, ticket: TimerTicket, host: &mut dyn DocumentHost) {
        if !self.timer.fire(ticket) {
            return;
        }
        if self.state != SessionState::Unlocked || !host.is_open() {
            debug!("Idle timer fired in state {:?}, ignoring", self.state);
            return;
        }

        let plaintext = Zeroizing::new(host.read_buffer());
        match self.seal(&plaintext) {
            Ok(armored) => {
                self.write_internal(host, &armored);
                self.passphrase = None;
                self.state = SessionState::Locked;
                host.set_read_only(true);
                info!("Idle timeout reached, document locked");
                host.request_save();
            }
            Err(e) => {
                warn!("Idle re-lock failed: {}", e);
                host.notify_error(&e.to_string());
                self.timer.cancel_and_reschedule(host);
            }
        }
    }

    /// The document view closed. Secrets are dropped and pending callbacks
    /// become stale.
    #[instrument(skip_all, fields(document = %self.id))]
    pub fn on_closed(&mut self, _host: &mut dyn DocumentHost) {
        self.prompt.invalidate();
        self.timer.cancel();
        self.passphrase = None;
        self.stash = None;
        self.last_internal_write = None;
        self.pending_echoes = 0;
        self.unsaved_buffer = false;
        self.released_ciphertext = None;
        if self.state != SessionState::Inert {
            info!("Document closed");
        }
        self.state = SessionState::Inert;
    }

    fn begin_unlock(&mut self, host: &mut dyn DocumentHost) {
        self.state = SessionState::AwaitingPassword;
        host.set_read_only(true);
        self.prompt.begin(PromptPurpose::Unlock, host);
    }

    fn begin_new_passphrase(&mut self, host: &mut dyn DocumentHost) {
        self.state = SessionState::AwaitingPassword;
        host.set_read_only(true);
        self.prompt.begin(PromptPurpose::NewPassphrase, host);
    }

    fn try_unlock(&mut self, secret: SecretString, host: &mut dyn DocumentHost) {
        host.set_read_only(false);

        match self.unseal(&host.read_buffer(), &secret) {
            Ok(plaintext) => {
                self.write_internal(host, &plaintext);
                // edits from before a failed save are still not on disk
                host.set_unmodified(!std::mem::take(&mut self.unsaved_buffer));
                self.passphrase = Some(secret);
                self.state = SessionState::Unlocked;
                self.tracked_path = host.current_path();
                self.timer.cancel_and_reschedule(host);
                info!("Document unlocked");
            }
            Err(e) => {
                warn!("Unlock failed: {}", e);
                let notice = match e {
                    CryptoError::DecryptionFailed { .. }
                    | CryptoError::MalformedArmor(_)
                    | CryptoError::NotText(_) => NOTICE_INVALID_PASSWORD.to_string(),
                    other => other.to_string(),
                };
                host.notify_error(&notice);
                self.begin_unlock(host);
            }
        }
    }

    fn adopt_passphrase(&mut self, secret: SecretString, host: &mut dyn DocumentHost) {
        host.set_read_only(false);
        self.passphrase = Some(secret);
        self.state = SessionState::Unlocked;
        self.timer.cancel_and_reschedule(host);
        info!("New password accepted, saving encrypted");
        host.request_save();
    }

    fn abandon_prompt(&mut self, purpose: PromptPurpose, host: &mut dyn DocumentHost) {
        host.set_read_only(false);
        self.state = SessionState::Inert;
        if purpose.is_unlock() {
            info!("Password entry cancelled, closing document");
            self.passphrase = None;
            self.timer.cancel();
            host.close();
        } else {
            info!("Password entry cancelled, save abandoned");
        }
    }

    fn seal_for_save(&mut self, host: &mut dyn DocumentHost) -> SaveDecision {
        let plaintext = Zeroizing::new(host.read_buffer());
        match self.seal(&plaintext) {
            Ok(armored) => {
                self.write_internal(host, &armored);
                self.stash = Some(plaintext);
                self.timer.cancel();
                self.state = SessionState::Busy;
                SaveDecision::Proceed
            }
            Err(e) => {
                warn!("Encryption before save failed: {}", e);
                host.notify_error(&e.to_string());
                SaveDecision::Abort
            }
        }
    }

    fn reopen_after_save(&mut self, host: &mut dyn DocumentHost) {
        let stash = self.stash.take();
        let reopened = match self.passphrase.as_ref() {
            Some(passphrase) => self.unseal(&host.read_buffer(), passphrase),
            None => Err(CryptoError::EmptyPassphrase),
        };

        let plaintext = match (reopened, stash) {
            (Ok(plaintext), _) => plaintext,
            (Err(e), Some(stash)) => {
                warn!("Re-opening saved document failed: {}", e);
                host.notify_error(&format!("Could not re-open the saved document: {}", e));
                stash
            }
            (Err(e), None) => {
                warn!("Re-opening saved document failed: {}", e);
                host.notify_error(&e.to_string());
                self.fall_back_to_unlock(host);
                return;
            }
        };

        self.write_internal(host, &plaintext);
        host.set_unmodified(true);
        self.state = SessionState::Unlocked;
        self.timer.cancel_and_reschedule(host);
        info!("Document saved encrypted");
    }

    // The buffer holds ciphertext we cannot open: ask again.
    fn fall_back_to_unlock(&mut self, host: &mut dyn DocumentHost) {
        self.passphrase = None;
        self.timer.cancel();
        self.begin_unlock(host);
    }

    fn release(&mut self, host: &mut dyn DocumentHost) {
        self.prompt.invalidate();
        self.timer.cancel();
        self.passphrase = None;
        self.stash = None;
        self.last_internal_write = None;
        self.pending_echoes = 0;
        self.unsaved_buffer = false;
        self.released_ciphertext = None;
        self.state = SessionState::Inert;
        host.set_read_only(false);
    }

    fn holds_released_ciphertext(&self, host: &dyn DocumentHost) -> bool {
        self.released_ciphertext
            .is_some_and(|hash| blake3::hash(host.read_buffer().as_bytes()) == hash)
    }

    fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let passphrase = self.passphrase.as_ref().ok_or(CryptoError::EmptyPassphrase)?;
        let ciphertext = self.cipher.encrypt(plaintext.as_bytes(), passphrase)?;
        Ok(armor(&ciphertext))
    }

    fn unseal(
        &self,
        armored: &str,
        passphrase: &SecretString,
    ) -> Result<Zeroizing<String>, CryptoError> {
        let ciphertext = unarmor(armored)?;
        let plaintext = self.cipher.decrypt(&ciphertext, passphrase)?;
        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(CryptoError::NotText)
    }

    fn write_internal(&mut self, host: &mut dyn DocumentHost, text: &str) {
        self.last_internal_write = Some(blake3::hash(text.as_bytes()));
        self.pending_echoes += 1;
        host.write_buffer(text);
    }
}

impl<C: Cipher> fmt::Debug for DocumentSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("cipher", &self.cipher.name())
            .field("state", &self.state)
            .field("tracked_path", &self.tracked_path)
            .field("has_passphrase", &self.passphrase.is_some())
            .finish_non_exhaustive()
    }
}
