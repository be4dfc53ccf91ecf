//! Editor abstraction for editing unlocked documents.
//!
//! The terminal host hands plaintext to an external editor through a secure
//! temporary file. Going through a trait keeps the host testable with a
//! scripted editor.

use crate::errors::EditorError;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Trait defining the interface for an editor component.
///
/// # Examples
///
/// ```
/// use sealdoc::editor::Editor;
/// use sealdoc::errors::EditorError;
/// use std::path::Path;
///
/// struct DummyEditor;
///
/// impl Editor for DummyEditor {
///     fn edit(&self, path: &Path) -> Result<(), EditorError> {
///         println!("Would edit {:?}", path);
///         Ok(())
///     }
/// }
///
/// DummyEditor.edit(Path::new("notes.txt")).unwrap();
/// ```
pub trait Editor {
    /// Open `path` and block until the user is done with it.
    ///
    /// # Errors
    ///
    /// Implementations return an `EditorError` describing why the edit could
    /// not be completed.
    fn edit(&self, path: &Path) -> Result<(), EditorError>;
}

/// Launches an external editor process and waits for it.
///
/// ```no_run
/// use sealdoc::editor::{Editor, SystemEditor};
/// use std::path::Path;
///
/// let editor = SystemEditor::new("vim");
/// editor.edit(Path::new("/dev/shm/sealdoc-draft.txt"))?;
/// # Ok::<(), sealdoc::errors::EditorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Editor for SystemEditor {
    fn edit(&self, path: &Path) -> Result<(), EditorError> {
        debug!("Launching editor: {} {:?}", self.command, path);

        let status = Command::new(&self.command).arg(path).status();

        match status {
            Err(e) if e.kind() == ErrorKind::NotFound => Err(EditorError::CommandNotFound {
                command: self.command.clone(),
                source: e,
            }),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(EditorError::PermissionDenied {
                    command: self.command.clone(),
                    source: e,
                })
            }
            Err(e) => Err(EditorError::ExecutionFailed {
                command: self.command.clone(),
                source: e,
            }),
            Ok(status) if !status.success() => Err(EditorError::NonZeroExit {
                command: self.command.clone(),
                status_code: status.code().unwrap_or(-1),
            }),
            Ok(_) => Ok(()),
        }
    }
}
