//! Engine harness for E2E tests
//!
//! Wires a [`SecretEngine`] to the failure-injecting store and ledger so tests
//! can drive it and then inspect both sides.

use std::sync::Arc;

use serde_json::Value;

use secref_engine::{
    EngineConfig, FieldPath, LedgerStore, OwnerScope, RevealMode, ScopeLedgerEntry, SecretEngine,
    SecretRecordName, WellKnownField,
};

use crate::flaky_ledger::FlakyLedger;
use crate::flaky_store::FlakySecretStore;

/// An engine plus handles on its backends
pub struct TestEngine {
    pub engine: Arc<SecretEngine>,
    pub store: Arc<FlakySecretStore>,
    pub ledger: Arc<FlakyLedger>,
}

impl TestEngine {
    /// Engine with default settings and `auth.key` registered as well-known
    pub fn new() -> Self {
        Self::with_config(
            EngineConfig::default().with_well_known(WellKnownField::new("auth.key")),
        )
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = FlakySecretStore::new();
        let ledger = FlakyLedger::new();
        let engine = SecretEngine::new(config, store.clone(), ledger.clone())
            .expect("Invalid test engine configuration");
        Self {
            engine: Arc::new(engine),
            store,
            ledger,
        }
    }

    /// Current ledger entry for `scope`
    pub async fn ledger_entry(&self, scope: &OwnerScope) -> Option<ScopeLedgerEntry> {
        self.ledger
            .get(scope)
            .await
            .expect("Ledger read failed in test")
    }

    pub async fn ledger_names(&self, scope: &OwnerScope) -> Vec<SecretRecordName> {
        self.ledger_entry(scope)
            .await
            .map(|e| e.names.into_iter().collect())
            .unwrap_or_default()
    }

    /// Materialize and reveal, returning the revealed tree
    pub async fn round_trip(&self, scope: &OwnerScope, tree: &Value) -> Value {
        let saved = self
            .engine
            .materialize(scope, tree)
            .await
            .expect("Materialize failed");
        self.engine
            .dematerialize(scope, &saved.tree, RevealMode::Reveal)
            .await
            .expect("Dematerialize failed")
            .tree
    }

    pub fn name_for(&self, scope: &OwnerScope, path: &str) -> SecretRecordName {
        let path: FieldPath = path.parse().expect("Invalid field path");
        self.engine
            .derive_name(scope, &path)
            .expect("Path is not secret-bearing")
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a scope, panicking on invalid input
pub fn scope(s: &str) -> OwnerScope {
    s.parse().expect("Invalid scope")
}

/// Every string leaf in a tree, depth first
pub fn string_leaves(tree: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    collect(tree, &mut out);
    out
}

fn collect<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}
