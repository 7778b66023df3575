//! Diff between a classified tree and the scope's ledger
//!
//! Shared by materialize (which executes the plan) and reconcile (which only
//! reports it).

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::classify::{Classification, FieldClassifier};
use crate::error::EngineError;
use crate::ledger::ScopeLedgerEntry;
use crate::naming::{NameDeriver, SecretRecordName};
use crate::path::FieldPath;
use crate::scope::OwnerScope;
use crate::value::SecretValue;

/// Planned handling of one secret field
#[derive(Debug, Clone)]
pub(crate) enum FieldAction {
    /// Plaintext to upsert
    Store(SecretValue),
    /// Reference (or placeholder echo) for a record the ledger already tracks
    Keep,
    /// Reference (or placeholder echo) for a record the ledger does not know
    Verify,
    /// Empty value: delete the record
    Clear,
}

impl FieldAction {
    pub(crate) fn kind(&self) -> PlannedAction {
        match self {
            Self::Store(_) => PlannedAction::Store,
            Self::Keep => PlannedAction::Keep,
            Self::Verify => PlannedAction::VerifyExisting,
            Self::Clear => PlannedAction::Clear,
        }
    }
}

/// Serializable view of a planned field action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Store,
    Keep,
    VerifyExisting,
    Clear,
}

#[derive(Debug, Clone)]
pub(crate) struct PlannedField {
    pub path: FieldPath,
    pub classification: Classification,
    pub name: SecretRecordName,
    pub action: FieldAction,
}

#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub fields: Vec<PlannedField>,
    /// Prior names no longer backed by any field
    pub orphans: Vec<SecretRecordName>,
    pub prior: Option<ScopeLedgerEntry>,
}

impl Plan {
    pub(crate) fn prior_contains(&self, name: &SecretRecordName) -> bool {
        self.prior.as_ref().is_some_and(|e| e.contains(name))
    }
}

pub(crate) struct Planner<'a> {
    pub classifier: &'a FieldClassifier,
    pub deriver: &'a NameDeriver,
    pub placeholder: &'a str,
}

impl Planner<'_> {
    pub(crate) fn plan(
        &self,
        scope: &OwnerScope,
        tree: &Value,
        prior: Option<ScopeLedgerEntry>,
    ) -> Result<Plan, EngineError> {
        let classified = self.classifier.classify(tree)?;

        let mut seen: HashMap<SecretRecordName, FieldPath> = HashMap::new();
        let mut fields = Vec::with_capacity(classified.len());
        for field in classified {
            let name = self.deriver.derive_for(scope, &field);
            if let Some(first) = seen.insert(name.clone(), field.path.clone()) {
                tracing::error!(
                    scope = %scope,
                    name = %name,
                    first = %first,
                    second = %field.path,
                    "Two fields derived the same secret record name"
                );
                return Err(EngineError::NameCollision {
                    name: name.to_string(),
                    first: first.to_string(),
                    second: field.path.to_string(),
                });
            }

            let known = prior.as_ref().is_some_and(|e| e.contains(&name));
            let action = match field.value {
                None => FieldAction::Clear,
                Some(value) => {
                    let echo = value.expose() == self.placeholder
                        || value.expose() == name.to_reference();
                    match (echo, known) {
                        (true, true) => FieldAction::Keep,
                        (true, false) => FieldAction::Verify,
                        (false, _) => FieldAction::Store(value),
                    }
                }
            };

            fields.push(PlannedField {
                path: field.path,
                classification: field.classification,
                name,
                action,
            });
        }

        let orphans = match &prior {
            Some(entry) => {
                let current: BTreeSet<&SecretRecordName> = seen.keys().collect();
                entry
                    .names
                    .iter()
                    .filter(|n| !current.contains(n))
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(Plan {
            fields,
            orphans,
            prior,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, WellKnownField};
    use serde_json::json;

    fn plan(tree: &Value, prior: Option<ScopeLedgerEntry>) -> Plan {
        let config = EngineConfig::default().with_well_known(WellKnownField::new("auth.key"));
        let classifier = FieldClassifier::new(&config).unwrap();
        let deriver = NameDeriver::new(&config);
        let planner = Planner {
            classifier: &classifier,
            deriver: &deriver,
            placeholder: &config.redaction_placeholder,
        };
        planner
            .plan(&OwnerScope::plugin("loganal").unwrap(), tree, prior)
            .unwrap()
    }

    fn prior(names: &[&str]) -> ScopeLedgerEntry {
        let mut entry = ScopeLedgerEntry::new(OwnerScope::plugin("loganal").unwrap());
        for name in names {
            entry.names.insert(SecretRecordName::from_stored(*name));
        }
        entry
    }

    #[test]
    fn test_first_save_stores_everything() {
        let plan = plan(&json!({"auth": {"key": "k"}, "b__Secret": ""}), None);
        let kinds: Vec<_> = plan.fields.iter().map(|f| (f.path.to_string(), f.action.kind())).collect();
        assert!(kinds.contains(&("auth.key".to_string(), PlannedAction::Store)));
        assert!(kinds.contains(&("b__Secret".to_string(), PlannedAction::Clear)));
        assert!(plan.orphans.is_empty());
    }

    #[test]
    fn test_references_and_placeholders_are_kept() {
        let tree = json!({
            "auth": {"key": "<ref:loganal--action--global--loganal>"},
            "additionalFields": {"alpha__Secret": "**********"}
        });
        let plan = plan(
            &tree,
            Some(prior(&[
                "loganal--action--global--loganal",
                "loganal--action-addset--global--loganal-alpha",
            ])),
        );
        assert!(plan
            .fields
            .iter()
            .all(|f| f.action.kind() == PlannedAction::Keep));
    }

    #[test]
    fn test_unknown_reference_needs_verification() {
        let tree = json!({"auth": {"key": "<ref:loganal--action--global--loganal>"}});
        let plan = plan(&tree, None);
        assert_eq!(plan.fields[0].action.kind(), PlannedAction::VerifyExisting);
    }

    #[test]
    fn test_foreign_reference_is_plaintext() {
        let tree = json!({"auth": {"key": "<ref:other--action--global--other>"}});
        let plan = plan(&tree, Some(prior(&["loganal--action--global--loganal"])));
        assert_eq!(plan.fields[0].action.kind(), PlannedAction::Store);
    }

    #[test]
    fn test_removed_fields_become_orphans() {
        let tree = json!({"additionalFields": {"a__Secret": "x"}});
        let plan = plan(
            &tree,
            Some(prior(&[
                "loganal--action-addset--global--loganal-a",
                "loganal--action-addset--global--loganal-b",
            ])),
        );
        assert_eq!(
            plan.orphans,
            vec![SecretRecordName::from_stored(
                "loganal--action-addset--global--loganal-b"
            )]
        );
    }
}
