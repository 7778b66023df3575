//! Read path: substitute references with a placeholder or the real value

use futures_util::future::join_all;
use serde_json::Value;

use crate::classify::FieldClassifier;
use crate::error::EngineError;
use crate::naming::{NameDeriver, SecretRecordName};
use crate::outcome::{DematerializeReport, FieldFailure, FieldOutcome, FieldStatus, RevealMode};
use crate::path::FieldPath;
use crate::scope::OwnerScope;
use crate::store::SecretStore;
use crate::tree;

pub(crate) struct Dematerializer<'a> {
    pub classifier: &'a FieldClassifier,
    pub deriver: &'a NameDeriver,
    pub store: &'a dyn SecretStore,
    pub placeholder: &'a str,
}

impl Dematerializer<'_> {
    /// Only a value equal to the reference this scope derives for the field is
    /// treated as a reference; any other string passes through untouched.
    pub(crate) async fn run(
        &self,
        scope: &OwnerScope,
        input: &Value,
        mode: RevealMode,
    ) -> Result<DematerializeReport, EngineError> {
        let fields = self.classifier.classify(input)?;
        let mut output = input.clone();
        let mut outcomes = Vec::with_capacity(fields.len());
        let mut to_fetch: Vec<(FieldPath, SecretRecordName)> = Vec::new();

        for field in fields {
            let name = self.deriver.derive_for(scope, &field);
            let is_reference = field
                .value
                .as_ref()
                .is_some_and(|v| v.expose() == name.to_reference());

            if !is_reference {
                outcomes.push(FieldOutcome {
                    path: Some(field.path),
                    name: None,
                    status: FieldStatus::PassedThrough,
                });
                continue;
            }

            match mode {
                RevealMode::Redact => {
                    tree::replace(
                        &mut output,
                        &field.path,
                        Value::String(self.placeholder.to_string()),
                    );
                    outcomes.push(FieldOutcome::field(&field.path, &name, FieldStatus::Redacted));
                }
                RevealMode::Reveal => to_fetch.push((field.path, name)),
            }
        }

        let fetched = join_all(to_fetch.iter().map(|(_, name)| self.store.get(name))).await;

        for ((path, name), result) in to_fetch.iter().zip(fetched) {
            match result {
                Ok(value) => {
                    tree::replace(&mut output, path, value.to_leaf());
                    outcomes.push(FieldOutcome::field(path, name, FieldStatus::Revealed));
                }
                Err(e) => {
                    tracing::warn!(
                        scope = %scope,
                        name = %name,
                        path = %path,
                        error = %e,
                        "Secret could not be revealed"
                    );
                    tree::replace(&mut output, path, Value::Null);
                    outcomes.push(FieldOutcome::failed(
                        Some(path),
                        name,
                        FieldFailure::from_store(&e),
                    ));
                }
            }
        }

        tracing::debug!(
            scope = %scope,
            mode = ?mode,
            fields = outcomes.len(),
            "Dematerialized configuration"
        );

        Ok(DematerializeReport {
            scope: scope.clone(),
            mode,
            tree: output,
            outcomes,
        })
    }
}
