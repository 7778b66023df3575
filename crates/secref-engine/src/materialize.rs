//! Save path: move plaintext into the store, leave references behind

use std::collections::BTreeSet;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::naming::SecretRecordName;
use crate::outcome::{FieldFailure, FieldOutcome, FieldStatus};
use crate::plan::{FieldAction, Plan};
use crate::scope::OwnerScope;
use crate::store::SecretStore;
use crate::tree;

/// Store calls made, before the ledger is written
pub(crate) struct Execution {
    pub tree: Value,
    pub outcomes: Vec<FieldOutcome>,
    /// Names that are live in the backend after this call
    pub names: BTreeSet<SecretRecordName>,
}

/// Execute a plan field by field
///
/// Best effort: a failing field never stops the others. Once `cancel` fires no
/// new store call is started; work already issued completes.
pub(crate) async fn execute(
    store: &dyn SecretStore,
    scope: &OwnerScope,
    mut output: Value,
    plan: Plan,
    cancel: &CancellationToken,
) -> Execution {
    let mut outcomes = Vec::with_capacity(plan.fields.len() + plan.orphans.len());
    let mut names = BTreeSet::new();

    for field in &plan.fields {
        let name = &field.name;
        let path = &field.path;
        let reference = Value::String(name.to_reference());
        let known = plan.prior_contains(name);

        match &field.action {
            FieldAction::Keep => {
                tree::replace(&mut output, path, reference);
                names.insert(name.clone());
                outcomes.push(FieldOutcome::field(path, name, FieldStatus::Unchanged));
            }

            FieldAction::Store(value) => {
                let result = if cancel.is_cancelled() {
                    Err(FieldFailure::cancelled())
                } else {
                    tracing::debug!(scope = %scope, name = %name, path = %path, "Storing secret");
                    store
                        .put(name, value)
                        .await
                        .map_err(|e| FieldFailure::from_store(&e))
                };

                match result {
                    Ok(()) => {
                        tree::replace(&mut output, path, reference);
                        names.insert(name.clone());
                        outcomes.push(FieldOutcome::field(path, name, FieldStatus::Stored));
                    }
                    Err(failure) => {
                        tracing::warn!(
                            scope = %scope,
                            name = %name,
                            path = %path,
                            error = %failure.message,
                            "Secret could not be stored"
                        );
                        // The plaintext never stays in the output. A record stored by an
                        // earlier save keeps its old value and its reference.
                        if known {
                            tree::replace(&mut output, path, reference);
                            names.insert(name.clone());
                        } else {
                            tree::replace(&mut output, path, Value::Null);
                        }
                        outcomes.push(FieldOutcome::failed(Some(path), name, failure));
                    }
                }
            }

            FieldAction::Verify => {
                let result = if cancel.is_cancelled() {
                    Err(FieldFailure::cancelled())
                } else {
                    match store.exists(name).await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(FieldFailure::missing_record(name)),
                        Err(e) => Err(FieldFailure::from_store(&e)),
                    }
                };

                match result {
                    Ok(()) => {
                        tree::replace(&mut output, path, reference);
                        names.insert(name.clone());
                        outcomes.push(FieldOutcome::field(path, name, FieldStatus::Unchanged));
                    }
                    Err(failure) => {
                        tracing::warn!(
                            scope = %scope,
                            name = %name,
                            path = %path,
                            error = %failure.message,
                            "Referenced secret could not be verified"
                        );
                        tree::replace(&mut output, path, Value::Null);
                        outcomes.push(FieldOutcome::failed(Some(path), name, failure));
                    }
                }
            }

            FieldAction::Clear => {
                match delete(store, name, cancel).await {
                    Ok(()) => {
                        outcomes.push(FieldOutcome::field(path, name, FieldStatus::Cleared));
                    }
                    Err(failure) => {
                        tracing::warn!(
                            scope = %scope,
                            name = %name,
                            path = %path,
                            error = %failure.message,
                            "Cleared secret could not be deleted"
                        );
                        if known {
                            names.insert(name.clone());
                        }
                        outcomes.push(FieldOutcome::failed(Some(path), name, failure));
                    }
                }
            }
        }
    }

    for name in &plan.orphans {
        match delete(store, name, cancel).await {
            Ok(()) => {
                tracing::debug!(scope = %scope, name = %name, "Deleted orphaned secret");
                outcomes.push(FieldOutcome::record(name, FieldStatus::OrphanDeleted));
            }
            Err(failure) => {
                tracing::warn!(
                    scope = %scope,
                    name = %name,
                    error = %failure.message,
                    "Orphaned secret could not be deleted"
                );
                names.insert(name.clone());
                outcomes.push(FieldOutcome::failed(None, name, failure));
            }
        }
    }

    Execution {
        tree: output,
        outcomes,
        names,
    }
}

/// Idempotent delete: a missing record counts as deleted
pub(crate) async fn delete(
    store: &dyn SecretStore,
    name: &SecretRecordName,
    cancel: &CancellationToken,
) -> Result<(), FieldFailure> {
    if cancel.is_cancelled() {
        return Err(FieldFailure::cancelled());
    }
    match store.delete(name).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(FieldFailure::from_store(&e)),
    }
}
