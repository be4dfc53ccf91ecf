//! The contract between a document session and the editor hosting it.
//!
//! A host owns the buffer, the clock and the user interface. It exposes a
//! small set of commands ([`DocumentHost`]) and delivers events one at a time
//! through [`dispatch`]. Commands that would re-enter the session, such as
//! [`DocumentHost::request_save`], a prompt answer or a timer firing, must be
//! queued by the host and delivered after the current handler returns.

pub mod lock;
pub mod terminal;

use crate::constants::REDACTED_PLACEHOLDER;
use crate::crypto::Cipher;
use crate::errors::{AppError, AppResult};
use crate::session::prompt::PromptGeneration;
use crate::session::timer::TimerTicket;
use crate::session::{DocumentSession, SaveDecision};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Commands a session may issue to its host.
pub trait DocumentHost {
    /// Entire buffer text.
    fn read_buffer(&self) -> String;

    /// Replace the entire buffer text.
    ///
    /// Every call is reported back as exactly one modification, even when the
    /// text is unchanged; sessions recognise their own writes.
    fn write_buffer(&mut self, text: &str);

    fn set_read_only(&mut self, read_only: bool);

    /// Set or clear the buffer's "saved" marker.
    fn set_unmodified(&mut self, unmodified: bool);

    /// Path the document is (or is about to be) saved to.
    fn current_path(&self) -> Option<PathBuf>;

    /// Show a secret input request.
    ///
    /// `masked` is the text to pre-fill, one `*` per character entered so
    /// far. Change, submit and cancel callbacks must carry `generation`.
    fn prompt_secret(&mut self, label: &str, masked: &str, generation: PromptGeneration);

    /// Deliver [`HostEvent::TimerFired`] with `ticket` after `delay`.
    fn schedule_deferred(&mut self, delay: Duration, ticket: TimerTicket);

    /// Blocking notice to the user.
    fn notify_error(&mut self, message: &str);

    /// Queue a save of the document.
    fn request_save(&mut self);

    /// Close the document view.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// A host that can write the buffer to its current path.
pub trait PersistentHost: DocumentHost {
    /// Write the buffer to [`DocumentHost::current_path`].
    fn persist(&mut self) -> io::Result<()>;
}

/// One serialized host event.
#[derive(Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The document view was opened or focused.
    Activated,
    /// The buffer text changed.
    Modified,
    /// A save (or save-as, if the path changed) was requested.
    Save,
    PromptChanged {
        generation: PromptGeneration,
        value: String,
    },
    PromptSubmitted {
        generation: PromptGeneration,
    },
    PromptCancelled {
        generation: PromptGeneration,
    },
    TimerFired(TimerTicket),
    Closed,
}

/// Route one event to the session.
///
/// A save runs the full cycle: the pre-save hook, the host write, then the
/// post-save hook (or the failure hook if the write failed).
///
/// # Errors
///
/// Returns `AppError::Io` when the host could not write the document. The
/// session has already recovered by then; the error is for reporting.
pub fn dispatch<C, H>(
    session: &mut DocumentSession<C>,
    host: &mut H,
    event: HostEvent,
) -> AppResult<()>
where
    C: Cipher,
    H: PersistentHost,
{
    debug!("Dispatching {:?} to {}", event, session.id());
    match event {
        HostEvent::Activated => session.on_activated(host),
        HostEvent::Modified => session.on_modified(host),
        HostEvent::Save => match session.on_before_save(host) {
            SaveDecision::Abort => debug!("Save aborted by session"),
            SaveDecision::Proceed => {
                if let Err(e) = host.persist() {
                    warn!("Failed to write document: {}", e);
                    session.on_save_failed(host);
                    return Err(AppError::Io(e));
                }
                session.on_after_save(host);
            }
        },
        HostEvent::PromptChanged { generation, value } => {
            session.on_prompt_changed(generation, &value, host)
        }
        HostEvent::PromptSubmitted { generation } => session.on_prompt_submitted(generation, host),
        HostEvent::PromptCancelled { generation } => session.on_prompt_cancelled(generation, host),
        HostEvent::TimerFired(ticket) => session.on_timer_fired(ticket, host),
        HostEvent::Closed => session.on_closed(host),
    }
    Ok(())
}

// Prompt values must never reach the log.
impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Activated => f.write_str("Activated"),
            HostEvent::Modified => f.write_str("Modified"),
            HostEvent::Save => f.write_str("Save"),
            HostEvent::PromptChanged { generation, .. } => f
                .debug_struct("PromptChanged")
                .field("generation", generation)
                .field("value", &REDACTED_PLACEHOLDER)
                .finish(),
            HostEvent::PromptSubmitted { generation } => f
                .debug_struct("PromptSubmitted")
                .field("generation", generation)
                .finish(),
            HostEvent::PromptCancelled { generation } => f
                .debug_struct("PromptCancelled")
                .field("generation", generation)
                .finish(),
            HostEvent::TimerFired(ticket) => f.debug_tuple("TimerFired").field(ticket).finish(),
            HostEvent::Closed => f.write_str("Closed"),
        }
    }
}
