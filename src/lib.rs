/*!
# sealdoc

sealdoc keeps text documents encrypted at rest while they are edited as plain
text. A per-document session decrypts the buffer once the right password is
entered, encrypts it again around every save, and seals it after a period of
inactivity.

## Architecture

- `crypto`: cipher backends (gpg process, age), the text armor codec and
  secure temporary files
- `session`: the per-document state machine, its password prompts and the
  idle re-lock timer
- `host`: the contract between a session and the editor hosting it, plus a
  terminal implementation
- `editor`: launching an external editor
- `ops`: the `open`, `seal` and `unseal` operations
- `cli`, `config`, `constants`, `errors`: the ambient plumbing

## Usage Example

```rust,no_run
use sealdoc::{ops, Config};
use std::path::Path;

fn main() -> sealdoc::AppResult<()> {
    let config = Config::load()?;
    ops::open_document(&config, Path::new("notes.md.enc"))
}
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Cipher backends, armor codec and secure temp files
pub mod crypto;
/// External editor launching
pub mod editor;
/// Error types and utilities for error handling
pub mod errors;
/// Host contract and the terminal host
pub mod host;
/// High-level operations
pub mod ops;
/// Document session state machine
pub mod session;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use session::{DocumentSession, SaveDecision, SessionOptions, SessionState};
