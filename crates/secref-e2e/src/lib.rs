//! End-to-end test utilities for the secref engine
//!
//! This crate provides a failure-injecting store and ledger, and a harness
//! that wires them to a [`secref_engine::SecretEngine`], so tests can exercise
//! partial failures without a real secret backend.

pub mod flaky_ledger;
pub mod flaky_store;
pub mod harness;

pub use flaky_ledger::FlakyLedger;
pub use flaky_store::{FlakySecretStore, StoreOp};
pub use harness::{scope, string_leaves, TestEngine};

/// Initialize tracing for tests (ignored if already initialized)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("secref_engine=debug,secref_e2e=debug")
        .with_test_writer()
        .try_init();
}
