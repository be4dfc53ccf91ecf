//! High-level operations behind the command-line interface.
//!
//! Each operation wires configuration to the cipher backend, the terminal
//! host and the document session.

pub mod open;
pub mod seal;
pub mod unseal;

// Re-export commonly used functions
pub use open::{open_document, open_document_with};
pub use seal::{seal_file, seal_file_with};
pub use unseal::{unseal_file, unseal_file_with};
