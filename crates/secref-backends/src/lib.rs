//! Secret store and ledger backends for the secref engine
//!
//! - **OS Keychain** ([`KeychainStore`]): macOS Keychain, Windows Credential Manager, Linux Secret Service
//! - **Files** ([`FileStore`]): one `0600` file per record under a directory
//! - **Ledger** ([`FileLedger`]): one JSON file per scope under a directory
//!
//! # Features
//!
//! - `keychain` (default): Enable OS keychain support via `keyring` crate
//! - `file` (default): Enable the file store and file ledger

mod backends;
#[cfg(feature = "file")]
mod ledger;

#[cfg(feature = "file")]
pub use backends::file::FileStore;
#[cfg(feature = "keychain")]
pub use backends::keychain::{KeychainStore, DEFAULT_SERVICE};
#[cfg(feature = "file")]
pub use ledger::FileLedger;
