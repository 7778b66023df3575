//! Delete every record owned by a scope

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::ledger::ScopeLedgerEntry;
use crate::materialize::delete;
use crate::naming::SecretRecordName;
use crate::outcome::{FieldOutcome, FieldStatus};
use crate::store::SecretStore;

/// Records deleted, and the names that could not be
pub(crate) struct PurgeExecution {
    pub outcomes: Vec<FieldOutcome>,
    pub remaining: BTreeSet<SecretRecordName>,
}

pub(crate) async fn execute(
    store: &dyn SecretStore,
    entry: &ScopeLedgerEntry,
    cancel: &CancellationToken,
) -> PurgeExecution {
    let mut outcomes = Vec::with_capacity(entry.names.len());
    let mut remaining = BTreeSet::new();

    for name in &entry.names {
        match delete(store, name, cancel).await {
            Ok(()) => {
                tracing::debug!(scope = %entry.scope, name = %name, "Purged secret");
                outcomes.push(FieldOutcome::record(name, FieldStatus::Purged));
            }
            Err(failure) => {
                tracing::warn!(
                    scope = %entry.scope,
                    name = %name,
                    error = %failure.message,
                    "Secret could not be purged"
                );
                remaining.insert(name.clone());
                outcomes.push(FieldOutcome::failed(None, name, failure));
            }
        }
    }

    PurgeExecution {
        outcomes,
        remaining,
    }
}
