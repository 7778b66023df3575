//! In-memory store and ledger for testing and development
//!
//! Nothing is persisted across restarts.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{LedgerError, StoreError};
use crate::ledger::{LedgerStore, ScopeLedgerEntry};
use crate::naming::SecretRecordName;
use crate::scope::OwnerScope;
use crate::store::SecretStore;
use crate::value::SecretValue;

/// In-memory secret store
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    records: DashMap<SecretRecordName, SecretValue>,
}

impl MemorySecretStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names of all stored records (for test assertions)
    pub fn names(&self) -> Vec<SecretRecordName> {
        let mut names: Vec<_> = self.records.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Get the number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any record currently holds `plaintext`
    pub fn holds_value(&self, plaintext: &str) -> bool {
        self.records.iter().any(|r| r.value().expose() == plaintext)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put(&self, name: &SecretRecordName, value: &SecretValue) -> Result<(), StoreError> {
        self.records.insert(name.clone(), value.clone());
        tracing::debug!(name = %name, "MemorySecretStore: stored record");
        Ok(())
    }

    async fn get(&self, name: &SecretRecordName) -> Result<SecretValue, StoreError> {
        self.records
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &SecretRecordName) -> Result<(), StoreError> {
        match self.records.remove(name) {
            Some(_) => {
                tracing::debug!(name = %name, "MemorySecretStore: deleted record");
                Ok(())
            }
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn exists(&self, name: &SecretRecordName) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// In-memory scope ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: DashMap<String, ScopeLedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scope_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get(&self, scope: &OwnerScope) -> Result<Option<ScopeLedgerEntry>, LedgerError> {
        Ok(self.entries.get(&scope.key()).map(|e| e.value().clone()))
    }

    async fn put(&self, entry: &ScopeLedgerEntry) -> Result<(), LedgerError> {
        self.entries.insert(entry.scope.key(), entry.clone());
        Ok(())
    }

    async fn delete(&self, scope: &OwnerScope) -> Result<(), LedgerError> {
        self.entries.remove(&scope.key());
        Ok(())
    }
}
