//! The engine facade: materialize, dematerialize, purge, reconcile

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::classify::FieldClassifier;
use crate::config::EngineConfig;
use crate::dematerialize::Dematerializer;
use crate::error::{ConfigError, EngineError};
use crate::ledger::{LedgerStore, ScopeLedgerEntry};
use crate::materialize;
use crate::naming::{NameDeriver, SecretRecordName};
use crate::outcome::{DematerializeReport, FieldStatus, MaterializeReport, PurgeReport, RevealMode};
use crate::path::FieldPath;
use crate::plan::{Plan, Planner};
use crate::purge;
use crate::reconcile::ReconcileReport;
use crate::scope::OwnerScope;
use crate::store::SecretStore;

/// Per-scope exclusive locks
///
/// Entries are created on demand and pruned once nobody holds or waits on them.
#[derive(Debug, Default)]
struct ScopeLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScopeLocks {
    async fn acquire(&self, scope: &OwnerScope) -> ScopeGuard<'_> {
        let key = scope.key();
        let lock = self.locks.entry(key.clone()).or_default().clone();
        // A waiter dropped mid-wait must still prune the entry
        let mut scope_guard = ScopeGuard {
            locks: self,
            key,
            guard: None,
        };
        scope_guard.guard = Some(lock.lock_owned().await);
        scope_guard
    }
}

struct ScopeGuard<'a> {
    locks: &'a ScopeLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Secret reference resolution engine
///
/// Materialize and purge for one scope are serialised; different scopes never
/// contend. Dematerialize and reconcile take no lock.
pub struct SecretEngine {
    config: EngineConfig,
    classifier: FieldClassifier,
    deriver: NameDeriver,
    store: Arc<dyn SecretStore>,
    ledger: Arc<dyn LedgerStore>,
    locks: ScopeLocks,
}

impl SecretEngine {
    /// Create an engine; fails if the configuration is invalid
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SecretStore>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Result<Self, ConfigError> {
        let classifier = FieldClassifier::new(&config)?;
        let deriver = NameDeriver::new(&config);

        tracing::debug!(
            backend = store.backend_name(),
            suffix = %config.secret_suffix,
            well_known = config.well_known.len(),
            "Secret engine ready"
        );

        Ok(Self {
            config,
            classifier,
            deriver,
            store,
            ledger,
            locks: ScopeLocks::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record name for the field at `path`, `None` if the path is not secret-bearing
    pub fn derive_name(&self, scope: &OwnerScope, path: &FieldPath) -> Option<SecretRecordName> {
        self.classifier
            .classify_path(path)
            .map(|classification| self.deriver.derive(scope, path, &classification))
    }

    /// Number of scopes currently holding or waiting on a lock
    pub fn active_scope_locks(&self) -> usize {
        self.locks.locks.len()
    }

    fn planner(&self) -> Planner<'_> {
        Planner {
            classifier: &self.classifier,
            deriver: &self.deriver,
            placeholder: &self.config.redaction_placeholder,
        }
    }

    /// Move plaintext secrets into the store and return the reference-only tree
    pub async fn materialize(
        &self,
        scope: &OwnerScope,
        tree: &Value,
    ) -> Result<MaterializeReport, EngineError> {
        self.materialize_with_cancel(scope, tree, &CancellationToken::new())
            .await
    }

    /// Materialize, starting no new store calls once `cancel` fires
    pub async fn materialize_with_cancel(
        &self,
        scope: &OwnerScope,
        tree: &Value,
        cancel: &CancellationToken,
    ) -> Result<MaterializeReport, EngineError> {
        let _guard = self.locks.acquire(scope).await;

        let prior = self.ledger.get(scope).await?;
        let plan: Plan = self.planner().plan(scope, tree, prior.clone())?;

        let execution =
            materialize::execute(self.store.as_ref(), scope, tree.clone(), plan, cancel).await;

        let (ledger, ledger_error) = match self.commit(scope, prior.as_ref(), execution.names).await
        {
            Ok(entry) => (entry, None),
            Err(e) => {
                tracing::error!(
                    scope = %scope,
                    error = %e,
                    "Secrets were written but the ledger could not be updated"
                );
                (prior, Some(e.to_string()))
            }
        };

        let report = MaterializeReport {
            scope: scope.clone(),
            tree: execution.tree,
            outcomes: execution.outcomes,
            ledger,
            ledger_error,
        };

        tracing::info!(
            scope = %scope,
            fields = report.outcomes.len(),
            failed = report.failures().count(),
            "Materialized configuration"
        );

        Ok(report)
    }

    /// Write the new name set; an empty set removes the entry
    async fn commit(
        &self,
        scope: &OwnerScope,
        prior: Option<&ScopeLedgerEntry>,
        names: std::collections::BTreeSet<SecretRecordName>,
    ) -> Result<Option<ScopeLedgerEntry>, EngineError> {
        if names.is_empty() {
            if prior.is_some() {
                self.ledger.delete(scope).await?;
            }
            return Ok(None);
        }

        let entry = match prior {
            Some(prior) => prior.next(names),
            None => ScopeLedgerEntry::new(scope.clone()).next(names),
        };
        self.ledger.put(&entry).await?;
        Ok(Some(entry))
    }

    /// Replace references with the redaction placeholder or the real values
    pub async fn dematerialize(
        &self,
        scope: &OwnerScope,
        tree: &Value,
        mode: RevealMode,
    ) -> Result<DematerializeReport, EngineError> {
        Dematerializer {
            classifier: &self.classifier,
            deriver: &self.deriver,
            store: self.store.as_ref(),
            placeholder: &self.config.redaction_placeholder,
        }
        .run(scope, tree, mode)
        .await
    }

    /// Delete every record of a scope and, if all deletes succeed, its ledger entry
    pub async fn purge(&self, scope: &OwnerScope) -> Result<PurgeReport, EngineError> {
        self.purge_with_cancel(scope, &CancellationToken::new()).await
    }

    pub async fn purge_with_cancel(
        &self,
        scope: &OwnerScope,
        cancel: &CancellationToken,
    ) -> Result<PurgeReport, EngineError> {
        let _guard = self.locks.acquire(scope).await;

        let Some(entry) = self.ledger.get(scope).await? else {
            tracing::debug!(scope = %scope, "Nothing to purge");
            return Ok(PurgeReport {
                scope: scope.clone(),
                outcomes: Vec::new(),
                ledger_removed: true,
            });
        };

        let execution = purge::execute(self.store.as_ref(), &entry, cancel).await;

        let ledger_result = if execution.remaining.is_empty() {
            self.ledger.delete(scope).await
        } else {
            // Keep the names that still exist so a retry can find them
            self.ledger.put(&entry.next(execution.remaining.clone())).await
        };

        let ledger_removed = match ledger_result {
            Ok(()) => execution.remaining.is_empty(),
            Err(e) => {
                tracing::error!(scope = %scope, error = %e, "Ledger could not be updated after purge");
                false
            }
        };

        tracing::info!(
            scope = %scope,
            deleted = execution
                .outcomes
                .iter()
                .filter(|o| o.status == FieldStatus::Purged)
                .count(),
            remaining = execution.remaining.len(),
            "Purged scope"
        );

        Ok(PurgeReport {
            scope: scope.clone(),
            outcomes: execution.outcomes,
            ledger_removed,
        })
    }

    /// Compute what a materialize would do, without store calls or ledger writes
    pub async fn reconcile(
        &self,
        scope: &OwnerScope,
        tree: &Value,
    ) -> Result<ReconcileReport, EngineError> {
        let prior = self.ledger.get(scope).await?;
        let plan = self.planner().plan(scope, tree, prior)?;
        Ok(ReconcileReport::from_plan(scope, &plan))
    }
}

impl std::fmt::Debug for SecretEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEngine")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
