//! Secret reference resolution for plugin and agent configuration
//!
//! Hosts hand the engine a configuration tree before they persist it. Every
//! secret-bearing leaf is written to a [`SecretStore`] under a deterministic
//! record name and replaced with a reference (`<ref:name>`), so the persisted
//! tree never carries plaintext. On the read path references are redacted for
//! display or revealed for runtime use.
//!
//! A leaf is secret-bearing if its key ends with the configured suffix
//! (`__Secret` by default) or its path is registered as a well-known field.
//!
//! # Example
//!
//! ```rust,ignore
//! use secref_engine::{EngineConfig, MemoryLedger, MemorySecretStore, OwnerScope, SecretEngine};
//!
//! let engine = SecretEngine::new(EngineConfig::default(), MemorySecretStore::new(), MemoryLedger::new())?;
//! let scope: OwnerScope = "plugin:loganal".parse()?;
//!
//! let saved = engine.materialize(&scope, &tree).await?;
//! persist(&saved.tree);
//! ```
//!
//! # Operations
//!
//! - **materialize**: store plaintext, leave references, delete orphans
//! - **dematerialize**: redact or reveal references
//! - **purge**: delete every record a scope owns
//! - **reconcile**: report what a materialize would do, without store calls

mod classify;
mod config;
mod dematerialize;
mod engine;
mod error;
mod ledger;
mod materialize;
mod memory;
mod naming;
mod outcome;
mod path;
mod plan;
mod purge;
mod reconcile;
mod scope;
mod store;
pub mod tree;
mod value;

pub use classify::{check_tree, Classification, FieldClassifier, SecretField};
pub use config::{
    EngineConfig, WellKnownField, DEFAULT_ADDITIONAL_FIELDS_KEY, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_NAME_LENGTH, DEFAULT_REDACTION_PLACEHOLDER, DEFAULT_SECRET_SUFFIX,
};
pub use engine::SecretEngine;
pub use error::{ConfigError, EngineError, LedgerError, StoreError};
pub use ledger::{LedgerStore, ScopeLedgerEntry};
pub use memory::{MemoryLedger, MemorySecretStore};
pub use naming::{normalize, NameDeriver, SecretRecordName, MIN_NAME_LENGTH};
pub use outcome::{
    DematerializeReport, FailureKind, FieldFailure, FieldOutcome, FieldStatus, MaterializeReport,
    PurgeReport, RevealMode,
};
pub use path::{FieldPath, PathSegment};
pub use plan::PlannedAction;
pub use reconcile::{PlannedFieldReport, ReconcileReport};
pub use scope::{OwnerScope, ScopeKind, DEFAULT_SUB_SCOPE};
pub use store::SecretStore;
pub use value::SecretValue;

// Re-exported so hosts can cancel without a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
