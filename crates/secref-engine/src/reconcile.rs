//! Dry-run materialize: what a save would do, without touching the store

use std::collections::BTreeSet;

use serde::Serialize;

use crate::naming::SecretRecordName;
use crate::path::FieldPath;
use crate::plan::{FieldAction, Plan, PlannedAction};
use crate::scope::OwnerScope;

/// Planned action for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFieldReport {
    pub path: FieldPath,
    pub name: SecretRecordName,
    pub action: PlannedAction,
}

/// Diagnostic report produced by reconcile
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub scope: OwnerScope,
    pub fields: Vec<PlannedFieldReport>,
    /// Ledger names no field maps to any more; a save would delete them
    pub orphaned: Vec<SecretRecordName>,
    /// Fields holding a reference (or placeholder) the ledger does not know
    pub dangling_references: Vec<FieldPath>,
    /// Fields still holding plaintext that a save would move into the store
    pub plaintext_fields: usize,
    /// Names currently in the ledger
    pub ledger_names: BTreeSet<SecretRecordName>,
    /// Names the ledger would hold if every store call succeeded
    pub projected_names: BTreeSet<SecretRecordName>,
}

impl ReconcileReport {
    pub(crate) fn from_plan(scope: &OwnerScope, plan: &Plan) -> Self {
        let mut fields = Vec::with_capacity(plan.fields.len());
        let mut dangling_references = Vec::new();
        let mut plaintext_fields = 0;
        let mut projected_names = BTreeSet::new();

        for field in &plan.fields {
            match field.action {
                FieldAction::Store(_) => {
                    plaintext_fields += 1;
                    projected_names.insert(field.name.clone());
                }
                FieldAction::Keep => {
                    projected_names.insert(field.name.clone());
                }
                FieldAction::Verify => {
                    dangling_references.push(field.path.clone());
                    projected_names.insert(field.name.clone());
                }
                FieldAction::Clear => {}
            }
            fields.push(PlannedFieldReport {
                path: field.path.clone(),
                name: field.name.clone(),
                action: field.action.kind(),
            });
        }

        Self {
            scope: scope.clone(),
            fields,
            orphaned: plan.orphans.clone(),
            dangling_references,
            plaintext_fields,
            ledger_names: plan
                .prior
                .as_ref()
                .map(|e| e.names.clone())
                .unwrap_or_default(),
            projected_names,
        }
    }

    /// Whether a save would change the ledger
    pub fn ledger_changes(&self) -> bool {
        self.ledger_names != self.projected_names
    }

    /// Whether the tree and ledger already agree and hold no plaintext
    pub fn is_in_sync(&self) -> bool {
        !self.ledger_changes() && self.plaintext_fields == 0 && self.dangling_references.is_empty()
    }
}
