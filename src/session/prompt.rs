//! Generation-tagged password prompts.
//!
//! Hosts deliver prompt input as "the whole field so far" on every change, and
//! the field may show masked characters for what was typed earlier. The flow
//! keeps the real secret by taking the known prefix (truncated to the new
//! length) and appending whatever new tail the host reports. Whenever the
//! length changes the prompt is relaunched with a fresh generation and a masked
//! echo, so callbacks still carrying the previous generation become no-ops.

use crate::constants::{PROMPT_CONFIRM, PROMPT_NEW, PROMPT_UNLOCK};
use crate::host::DocumentHost;
use age::secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

/// Identifies one input request. Host callbacks must echo it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromptGeneration(u64);

impl PromptGeneration {
    /// Rebuild a generation a host stored as a raw value.
    pub fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value, for hosts that need to store it.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromptGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an accepted secret will be used for.
///
/// The purpose selects both the validator and the continuation the session
/// runs on submission.
pub enum PromptPurpose {
    /// Unlock an existing document; validated by decrypting the buffer.
    Unlock,
    /// First round of choosing a passphrase for a newly managed document.
    NewPassphrase,
    /// Second round; must match the first.
    ConfirmPassphrase {
        /// The secret entered in the first round.
        first: SecretString,
    },
}

impl PromptPurpose {
    /// Label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            PromptPurpose::Unlock => PROMPT_UNLOCK,
            PromptPurpose::NewPassphrase => PROMPT_NEW,
            PromptPurpose::ConfirmPassphrase { .. } => PROMPT_CONFIRM,
        }
    }

    /// Whether this prompt unlocks an existing document.
    pub fn is_unlock(&self) -> bool {
        matches!(self, PromptPurpose::Unlock)
    }
}

impl fmt::Debug for PromptPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptPurpose::Unlock => f.write_str("Unlock"),
            PromptPurpose::NewPassphrase => f.write_str("NewPassphrase"),
            PromptPurpose::ConfirmPassphrase { .. } => f.write_str("ConfirmPassphrase"),
        }
    }
}

/// Result of a final submission.
#[derive(Debug)]
pub enum Submission {
    /// A non-empty secret was entered.
    Secret {
        /// The reconstructed secret.
        secret: SecretString,
        /// What it was asked for.
        purpose: PromptPurpose,
    },
    /// The entry was empty: the user backed out.
    Cancelled {
        /// What was being asked for.
        purpose: PromptPurpose,
    },
}

struct LivePrompt {
    generation: PromptGeneration,
    purpose: PromptPurpose,
    input: Zeroizing<String>,
}

/// At most one live prompt per document, plus the generation counter that
/// retires superseded input requests.
#[derive(Default)]
pub struct PromptFlow {
    counter: u64,
    live: Option<LivePrompt>,
}

impl PromptFlow {
    /// Create a flow with no live prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a prompt is currently accepting input.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Generation of the live prompt, if any.
    pub fn current_generation(&self) -> Option<PromptGeneration> {
        self.live.as_ref().map(|live| live.generation)
    }

    /// Purpose of the live prompt, if any.
    pub fn purpose(&self) -> Option<&PromptPurpose> {
        self.live.as_ref().map(|live| &live.purpose)
    }

    /// Start a prompt, replacing (and invalidating) any live one.
    pub fn begin(&mut self, purpose: PromptPurpose, host: &mut dyn DocumentHost) -> PromptGeneration {
        self.counter += 1;
        let generation = PromptGeneration(self.counter);
        debug!(%generation, ?purpose, "Starting prompt");
        host.prompt_secret(purpose.label(), "", generation);
        self.live = Some(LivePrompt {
            generation,
            purpose,
            input: Zeroizing::new(String::new()),
        });
        generation
    }

    /// Apply a change event carrying the host's whole field value.
    ///
    /// Returns `false` for a stale generation, which is otherwise ignored.
    pub fn on_change(
        &mut self,
        generation: PromptGeneration,
        value: &str,
        host: &mut dyn DocumentHost,
    ) -> bool {
        let Some(live) = self
            .live
            .as_mut()
            .filter(|live| live.generation == generation)
        else {
            debug!(%generation, "Ignoring change for stale prompt");
            return false;
        };

        let old_len = live.input.chars().count();
        let new_len = value.chars().count();
        let keep = old_len.min(new_len);

        let mut rebuilt = Zeroizing::new(String::with_capacity(value.len().max(live.input.len())));
        rebuilt.extend(live.input.chars().take(keep));
        rebuilt.extend(value.chars().skip(keep));
        live.input = rebuilt;

        if new_len != old_len {
            self.counter += 1;
            let fresh = PromptGeneration(self.counter);
            live.generation = fresh;
            host.prompt_secret(live.purpose.label(), &"*".repeat(new_len), fresh);
        }
        true
    }

    /// Final submission of the live prompt.
    ///
    /// Returns `None` for a stale generation. The prompt is consumed either way
    /// the submission resolves; a failed validation starts a new one.
    pub fn submit(&mut self, generation: PromptGeneration) -> Option<Submission> {
        let live = self.take_if_current(generation)?;
        let LivePrompt { purpose, input, .. } = live;
        if input.is_empty() {
            return Some(Submission::Cancelled { purpose });
        }
        Some(Submission::Secret {
            secret: SecretString::new(input.to_string()),
            purpose,
        })
    }

    /// Host-level cancel (e.g. Escape) of the live prompt.
    pub fn cancel(&mut self, generation: PromptGeneration) -> Option<PromptPurpose> {
        self.take_if_current(generation).map(|live| live.purpose)
    }

    /// Drop the live prompt without resolving it.
    pub fn invalidate(&mut self) {
        if let Some(live) = self.live.take() {
            debug!(generation = %live.generation, "Prompt invalidated");
        }
    }

    fn take_if_current(&mut self, generation: PromptGeneration) -> Option<LivePrompt> {
        if self.current_generation() == Some(generation) {
            self.live.take()
        } else {
            debug!(%generation, "Ignoring stale prompt callback");
            None
        }
    }
}

/// Compare two secrets without exposing them to callers.
pub(crate) fn secrets_match(a: &SecretString, b: &SecretString) -> bool {
    a.expose_secret() == b.expose_secret()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::timer::TimerTicket;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct PromptRecorder {
        prompts: Vec<(String, String, PromptGeneration)>,
    }

    impl DocumentHost for PromptRecorder {
        fn read_buffer(&self) -> String {
            String::new()
        }
        fn write_buffer(&mut self, _text: &str) {}
        fn set_read_only(&mut self, _read_only: bool) {}
        fn set_unmodified(&mut self, _unmodified: bool) {}
        fn current_path(&self) -> Option<PathBuf> {
            None
        }
        fn prompt_secret(&mut self, label: &str, masked: &str, generation: PromptGeneration) {
            self.prompts
                .push((label.to_string(), masked.to_string(), generation));
        }
        fn schedule_deferred(&mut self, _delay: Duration, _ticket: TimerTicket) {}
        fn notify_error(&mut self, _message: &str) {}
        fn request_save(&mut self) {}
        fn close(&mut self) {}
        fn is_open(&self) -> bool {
            true
        }
    }

    fn expose(submission: Submission) -> String {
        match submission {
            Submission::Secret { secret, .. } => secret.expose_secret().to_string(),
            Submission::Cancelled { .. } => String::new(),
        }
    }

    #[test]
    fn test_typing_through_masked_field_rebuilds_secret() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let mut generation = flow.begin(PromptPurpose::Unlock, &mut host);
        for value in ["p", "*a", "**s", "***s"] {
            assert!(flow.on_change(generation, value, &mut host));
            generation = flow.current_generation().unwrap();
        }

        assert_eq!(expose(flow.submit(generation).unwrap()), "pass");
        // one relaunch per length change, each masked
        assert_eq!(host.prompts.len(), 5);
        assert_eq!(host.prompts[4].1, "****");
    }

    #[test]
    fn test_backspace_truncates_secret() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let g1 = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.on_change(g1, "abc", &mut host);
        let g2 = flow.current_generation().unwrap();
        flow.on_change(g2, "**", &mut host);
        let g3 = flow.current_generation().unwrap();
        flow.on_change(g3, "**z", &mut host);
        let g4 = flow.current_generation().unwrap();

        assert_eq!(expose(flow.submit(g4).unwrap()), "abz");
    }

    #[test]
    fn test_multibyte_input_is_handled_per_character() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let g1 = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.on_change(g1, "ü", &mut host);
        let g2 = flow.current_generation().unwrap();
        flow.on_change(g2, "*ß", &mut host);
        let g3 = flow.current_generation().unwrap();

        assert_eq!(expose(flow.submit(g3).unwrap()), "üß");
        assert_eq!(host.prompts.last().unwrap().1, "**");
    }

    #[test]
    fn test_change_without_length_change_keeps_generation() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let g1 = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.on_change(g1, "x", &mut host);
        let g2 = flow.current_generation().unwrap();
        assert!(flow.on_change(g2, "*", &mut host));

        assert_eq!(flow.current_generation(), Some(g2));
        assert_eq!(host.prompts.len(), 2);
    }

    #[test]
    fn test_later_prompt_supersedes_earlier() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let first = flow.begin(PromptPurpose::Unlock, &mut host);
        let second = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.on_change(second, "pw", &mut host);
        let current = flow.current_generation().unwrap();

        assert!(!flow.on_change(first, "zzz", &mut host));
        assert!(flow.submit(first).is_none());
        assert!(flow.cancel(first).is_none());
        assert_eq!(expose(flow.submit(current).unwrap()), "pw");
    }

    #[test]
    fn test_submit_from_replaced_request_is_stale() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let g1 = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.on_change(g1, "pw", &mut host);

        // the request that delivered the change was replaced by a masked relaunch
        assert!(flow.submit(g1).is_none());
        assert!(flow.is_live());
    }

    #[test]
    fn test_empty_submission_is_cancel() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let generation = flow.begin(PromptPurpose::NewPassphrase, &mut host);

        match flow.submit(generation) {
            Some(Submission::Cancelled {
                purpose: PromptPurpose::NewPassphrase,
            }) => {}
            other => panic!("Expected cancellation, got {:?}", other),
        }
        assert!(!flow.is_live());
    }

    #[test]
    fn test_invalidate_makes_everything_stale() {
        let mut host = PromptRecorder::default();
        let mut flow = PromptFlow::new();

        let generation = flow.begin(PromptPurpose::Unlock, &mut host);
        flow.invalidate();

        assert!(!flow.on_change(generation, "a", &mut host));
        assert!(flow.submit(generation).is_none());
    }

    #[test]
    fn test_labels_follow_purpose() {
        let first = SecretString::new("a".to_string());
        assert_eq!(PromptPurpose::Unlock.label(), PROMPT_UNLOCK);
        assert_eq!(PromptPurpose::NewPassphrase.label(), PROMPT_NEW);
        assert_eq!(
            PromptPurpose::ConfirmPassphrase { first }.label(),
            PROMPT_CONFIRM
        );
    }
}
