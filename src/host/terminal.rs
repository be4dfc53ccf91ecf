//! A document host for the terminal.
//!
//! The buffer lives in memory. Editing happens in an external editor through a
//! secure temporary file, secrets are read without echo, and deferred tasks are
//! deadlines checked between steps. Events are queued and delivered one at a
//! time, so nothing re-enters the session while a handler runs.

use crate::constants::{ENV_VAR_TEST_PASSPHRASE, PROMPT_CONFIRM, PROMPT_NEW, PROMPT_UNLOCK};
use crate::crypto::temp::{write_atomic, PlaintextFile};
use crate::crypto::Cipher;
use crate::editor::Editor;
use crate::errors::{AppError, AppResult, CryptoError};
use crate::host::lock::DocumentLock;
use crate::host::{dispatch, DocumentHost, HostEvent, PersistentHost};
use crate::session::prompt::{secrets_match, PromptGeneration};
use crate::session::timer::TimerTicket;
use crate::session::{DocumentSession, SessionState};
use age::secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Where prompt answers come from.
pub enum SecretSource {
    /// Ask on the terminal without echo.
    Interactive,
    /// Answer every prompt with the same secret, and give up (answer empty)
    /// once a notice has been shown so a wrong secret cannot loop forever.
    Fixed(SecretString),
}

impl SecretSource {
    /// `Fixed` when `SEALDOC_TEST_PASSPHRASE` is set, otherwise `Interactive`.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR_TEST_PASSPHRASE) {
            Ok(value) if !value.is_empty() => SecretSource::Fixed(SecretString::new(value)),
            _ => SecretSource::Interactive,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, SecretSource::Interactive)
    }

    /// One-shot read of an existing document's passphrase.
    ///
    /// # Errors
    ///
    /// `EmptyPassphrase` for an empty entry, `PassphrasePrompt` if the
    /// terminal cannot be read.
    pub fn read_existing(&self) -> Result<SecretString, CryptoError> {
        let secret = self.read(PROMPT_UNLOCK)?;
        if secret.expose_secret().is_empty() {
            return Err(CryptoError::EmptyPassphrase);
        }
        Ok(secret)
    }

    /// One-shot read of a new passphrase, entered twice.
    ///
    /// # Errors
    ///
    /// `EmptyPassphrase`, `PassphraseMismatch`, or `PassphrasePrompt` if the
    /// terminal cannot be read.
    pub fn read_new(&self) -> Result<SecretString, CryptoError> {
        let first = self.read(PROMPT_NEW)?;
        if first.expose_secret().is_empty() {
            return Err(CryptoError::EmptyPassphrase);
        }
        let second = self.read(PROMPT_CONFIRM)?;
        if !secrets_match(&first, &second) {
            return Err(CryptoError::PassphraseMismatch);
        }
        Ok(first)
    }

    fn read(&self, label: &str) -> Result<SecretString, CryptoError> {
        match self {
            SecretSource::Fixed(secret) => Ok(secret.clone()),
            SecretSource::Interactive => rpassword::prompt_password(format!("{}: ", label))
                .map(SecretString::new)
                .map_err(|e| CryptoError::PassphrasePrompt(e.to_string())),
        }
    }
}

struct PendingPrompt {
    label: String,
    generation: PromptGeneration,
}

/// Terminal implementation of [`PersistentHost`].
pub struct TerminalHost<E: Editor> {
    buffer: Zeroizing<String>,
    path: Option<PathBuf>,
    save_as: PathBuf,
    edit_suffix: String,
    read_only: bool,
    unmodified: bool,
    open: bool,
    events: VecDeque<HostEvent>,
    timers: Vec<(Instant, TimerTicket)>,
    pending_prompt: Option<PendingPrompt>,
    secrets: SecretSource,
    notice_since_answer: bool,
    editor: E,
    _lock: DocumentLock,
}

impl<E: Editor> TerminalHost<E> {
    /// Host the document at `path`.
    ///
    /// An existing file is loaded as-is. A missing one starts as an empty
    /// unsaved buffer that adopts `path` on its first save.
    ///
    /// # Errors
    ///
    /// `AppError::Lock` if another session has the document open,
    /// `AppError::Io` if it exists but cannot be read as text.
    pub fn new(
        path: &Path,
        managed_suffix: &str,
        editor: E,
        secrets: SecretSource,
    ) -> AppResult<Self> {
        let lock = DocumentLock::acquire(path)?;

        let (buffer, current) = if path.exists() {
            (fs::read_to_string(path)?, Some(path.to_path_buf()))
        } else {
            info!("Starting new document {:?}", path);
            (String::new(), None)
        };

        Ok(Self {
            buffer: Zeroizing::new(buffer),
            path: current,
            save_as: path.to_path_buf(),
            edit_suffix: plaintext_suffix(path, managed_suffix),
            read_only: false,
            unmodified: true,
            open: true,
            events: VecDeque::new(),
            timers: Vec::new(),
            pending_prompt: None,
            secrets,
            notice_since_answer: false,
            editor,
            _lock: lock,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_unmodified(&self) -> bool {
        self.unmodified
    }

    /// Drive `session` until the user is done or the document closes.
    ///
    /// The session always receives [`HostEvent::Closed`] before this returns.
    ///
    /// # Errors
    ///
    /// Editor failures and a session stuck without a way forward.
    pub fn run<C: Cipher>(&mut self, session: &mut DocumentSession<C>) -> AppResult<()> {
        self.events.push_back(HostEvent::Activated);
        let result = self.drive(session);
        let closed = dispatch(session, self, HostEvent::Closed);
        result.and(closed)
    }

    fn drive<C: Cipher>(&mut self, session: &mut DocumentSession<C>) -> AppResult<()> {
        loop {
            self.pump(session);
            if !self.open {
                return Ok(());
            }
            if self.read_only
                || !matches!(session.state(), SessionState::Unlocked | SessionState::Inert)
            {
                return Err(AppError::Session(format!(
                    "Document cannot be edited in state {:?}",
                    session.state()
                )));
            }

            if self.edit_once()? {
                self.events.push_back(HostEvent::Modified);
            }
            if !self.unmodified {
                self.request_save();
            }
            self.pump(session);

            if !self.open || !self.edit_again()? {
                if self.open && !self.unmodified {
                    warn!("Discarding unsaved changes to {:?}", self.save_as);
                }
                return Ok(());
            }
        }
    }

    /// Deliver queued events, answer prompts and fire due timers until
    /// nothing is left to do.
    fn pump<C: Cipher>(&mut self, session: &mut DocumentSession<C>) {
        loop {
            self.queue_due_timers();
            if let Some(event) = self.events.pop_front() {
                if let Err(e) = dispatch(session, self, event) {
                    self.notify_error(&e.to_string());
                }
                continue;
            }
            if let Some(prompt) = self.pending_prompt.take() {
                self.answer(prompt);
                continue;
            }
            break;
        }
    }

    fn queue_due_timers(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) = self
            .timers
            .drain(..)
            .partition(|(deadline, _)| *deadline <= now);
        self.timers = pending;
        for (_, ticket) in due {
            self.events.push_back(HostEvent::TimerFired(ticket));
        }
    }

    fn answer(&mut self, prompt: PendingPrompt) {
        let answer = match &self.secrets {
            SecretSource::Fixed(_) if self.notice_since_answer => {
                debug!("Fixed secret was rejected, giving up");
                Zeroizing::new(String::new())
            }
            SecretSource::Fixed(secret) => Zeroizing::new(secret.expose_secret().clone()),
            SecretSource::Interactive => {
                match rpassword::prompt_password(format!("{}: ", prompt.label)) {
                    Ok(value) => Zeroizing::new(value),
                    Err(e) => {
                        warn!("Failed to read password: {}", e);
                        Zeroizing::new(String::new())
                    }
                }
            }
        };
        self.notice_since_answer = false;

        let generation = prompt.generation;
        if answer.is_empty() {
            self.events
                .push_back(HostEvent::PromptSubmitted { generation });
        } else {
            self.events.push_back(HostEvent::PromptChanged {
                generation,
                value: answer.to_string(),
            });
        }
    }

    /// Hand the buffer to the editor. Returns whether the text changed.
    fn edit_once(&mut self) -> AppResult<bool> {
        let file = PlaintextFile::create(&self.buffer, &self.edit_suffix)?;
        self.editor.edit(file.path())?;
        let edited = Zeroizing::new(file.read()?);

        if *edited == *self.buffer {
            debug!("Editor exited without changes");
            return Ok(false);
        }
        self.buffer = edited;
        self.unmodified = false;
        Ok(true)
    }

    fn edit_again(&mut self) -> AppResult<bool> {
        if !self.secrets.is_interactive() {
            return Ok(false);
        }
        eprint!("Edit again? [y/N] ");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(matches!(line.trim(), "y" | "Y" | "yes"))
    }
}

impl<E: Editor> DocumentHost for TerminalHost<E> {
    fn read_buffer(&self) -> String {
        self.buffer.to_string()
    }

    fn write_buffer(&mut self, text: &str) {
        if *self.buffer != text {
            self.buffer = Zeroizing::new(text.to_string());
            self.unmodified = false;
        }
        self.events.push_back(HostEvent::Modified);
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn set_unmodified(&mut self, unmodified: bool) {
        self.unmodified = unmodified;
    }

    fn current_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn prompt_secret(&mut self, label: &str, masked: &str, generation: PromptGeneration) {
        if masked.is_empty() {
            self.pending_prompt = Some(PendingPrompt {
                label: label.to_string(),
                generation,
            });
        } else {
            // relaunch after our own change event: the entry is complete
            self.pending_prompt = None;
            self.events
                .push_back(HostEvent::PromptSubmitted { generation });
        }
    }

    fn schedule_deferred(&mut self, delay: Duration, ticket: TimerTicket) {
        match Instant::now().checked_add(delay) {
            Some(deadline) => self.timers.push((deadline, ticket)),
            None => debug!("Timer delay {:?} is out of range, it will never fire", delay),
        }
    }

    fn notify_error(&mut self, message: &str) {
        eprintln!("{}", message);
        self.notice_since_answer = true;
    }

    fn request_save(&mut self) {
        if self.path.is_none() {
            self.path = Some(self.save_as.clone());
        }
        self.events.push_back(HostEvent::Save);
    }

    fn close(&mut self) {
        self.open = false;
        self.pending_prompt = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl<E: Editor> PersistentHost for TerminalHost<E> {
    /// Replace the file atomically; the document ends up owner-only.
    fn persist(&mut self) -> io::Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "document has no path"))?;
        write_atomic(&path, self.buffer.as_bytes())?;
        self.unmodified = true;
        info!("Wrote {:?}", path);
        Ok(())
    }
}

/// Suffix for the plaintext temp file, so the editor can pick a syntax mode:
/// `notes.md.enc` edits as `.md`, anything else as `.txt`.
fn plaintext_suffix(path: &Path, managed_suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let inner = name.strip_suffix(managed_suffix).unwrap_or(&name);
    match Path::new(inner).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => ".txt".to_string(),
    }
}
