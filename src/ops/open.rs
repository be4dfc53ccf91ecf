//! Interactive editing of an encrypted document.

use crate::config::Config;
use crate::crypto::{cipher_from_config, Cipher};
use crate::editor::{Editor, SystemEditor};
use crate::errors::{AppError, AppResult};
use crate::host::terminal::{SecretSource, TerminalHost};
use crate::session::{DocumentSession, SessionOptions};
use std::path::Path;
use tracing::info;

/// Open `path` in the configured editor, keeping it encrypted on disk.
///
/// # Flow
///
/// 1. Lock the document against other sessions
/// 2. Existing file: ask for its password and decrypt into the buffer
/// 3. New file: ask for a new password (twice) on the first save
/// 4. Edit in `$EDITOR` through a secure temp file
/// 5. Encrypt and write back on save
///
/// # Errors
///
/// Returns an error if:
/// - The path does not carry the managed suffix
/// - Another session has the document open
/// - The editor fails to launch or exits with an error
pub fn open_document(config: &Config, path: &Path) -> AppResult<()> {
    open_document_with(
        config,
        path,
        cipher_from_config(config),
        SystemEditor::new(config.editor.clone()),
        SecretSource::from_env(),
    )
}

/// [`open_document`] with explicit collaborators.
///
/// # Errors
///
/// Same as [`open_document`].
pub fn open_document_with<C, E>(
    config: &Config,
    path: &Path,
    cipher: C,
    editor: E,
    secrets: SecretSource,
) -> AppResult<()>
where
    C: Cipher,
    E: Editor,
{
    info!("Opening {:?} with the {} backend", path, cipher.name());
    let mut session = DocumentSession::new(cipher, SessionOptions::from_config(config));
    if !session.is_managed(Some(path)) {
        return Err(AppError::Config(format!(
            "{:?} is not an encrypted document: the name must end with '{}'",
            path, config.suffix
        )));
    }

    let mut host = TerminalHost::new(path, &config.suffix, editor, secrets)?;
    host.run(&mut session)
}
