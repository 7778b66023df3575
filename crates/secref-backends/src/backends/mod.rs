//! Secret store implementations

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "keychain")]
pub mod keychain;
