//! Scope ledger: the record of which secret names are live per scope
//!
//! This is the only state the engine owns. Storage is supplied by the host
//! through [`LedgerStore`]; the engine serialises writers per scope itself.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::naming::SecretRecordName;
use crate::scope::OwnerScope;

/// Names currently materialized for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLedgerEntry {
    pub scope: OwnerScope,
    pub names: BTreeSet<SecretRecordName>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write
    pub revision: u64,
}

impl ScopeLedgerEntry {
    pub fn new(scope: OwnerScope) -> Self {
        Self {
            scope,
            names: BTreeSet::new(),
            updated_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn contains(&self, name: &SecretRecordName) -> bool {
        self.names.contains(name)
    }

    /// Successor entry holding `names`
    pub fn next(&self, names: BTreeSet<SecretRecordName>) -> Self {
        Self {
            scope: self.scope.clone(),
            names,
            updated_at: Utc::now(),
            revision: self.revision + 1,
        }
    }
}

/// Keyed storage for ledger entries
///
/// Reads and writes must be linearizable per scope.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, scope: &OwnerScope) -> Result<Option<ScopeLedgerEntry>, LedgerError>;

    async fn put(&self, entry: &ScopeLedgerEntry) -> Result<(), LedgerError>;

    /// Remove the entry; removing a missing entry is not an error
    async fn delete(&self, scope: &OwnerScope) -> Result<(), LedgerError>;
}
