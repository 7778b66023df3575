//! Subcommand execution
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use secref_engine::{FieldPath, OwnerScope, RevealMode, SecretEngine};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move plaintext secrets into the store and print the reference-only tree
    Materialize {
        /// Owner scope, e.g. plugin:loganal or agent:deploy/prod
        #[arg(short, long)]
        scope: OwnerScope,

        /// Configuration JSON file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print only the resulting tree instead of the full report
        #[arg(long)]
        tree_only: bool,
    },

    /// Replace references with the placeholder, or with real values
    Dematerialize {
        #[arg(short, long)]
        scope: OwnerScope,

        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Substitute real secret values instead of the placeholder
        #[arg(long)]
        reveal: bool,

        #[arg(long)]
        tree_only: bool,
    },

    /// Delete every secret record owned by a scope
    Purge {
        #[arg(short, long)]
        scope: OwnerScope,
    },

    /// Report what a materialize would do, without touching the store
    Reconcile {
        #[arg(short, long)]
        scope: OwnerScope,

        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the record name a field maps to
    DeriveName {
        #[arg(short, long)]
        scope: OwnerScope,

        /// Field path, e.g. auth.key or additionalFields.alpha__Secret
        #[arg(short, long)]
        path: FieldPath,
    },
}

/// Result of a command: the JSON to print and whether every field succeeded
#[derive(Debug)]
pub struct CommandOutput {
    pub json: Value,
    pub complete: bool,
}

impl CommandOutput {
    fn new(value: &impl Serialize, complete: bool) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_value(value).context("Failed to serialize report")?,
            complete,
        })
    }
}

/// Read a configuration tree from a file, or stdin when no file is given
pub async fn read_tree(input: Option<&Path>) -> Result<Value> {
    let raw = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("Input is not valid JSON")
}

pub async fn run(engine: &SecretEngine, command: Command) -> Result<CommandOutput> {
    match command {
        Command::Materialize {
            scope,
            input,
            tree_only,
        } => {
            let tree = read_tree(input.as_deref()).await?;
            let report = engine.materialize(&scope, &tree).await?;
            let complete = report.is_complete();
            if tree_only {
                CommandOutput::new(&report.tree, complete)
            } else {
                CommandOutput::new(&report, complete)
            }
        }

        Command::Dematerialize {
            scope,
            input,
            reveal,
            tree_only,
        } => {
            let tree = read_tree(input.as_deref()).await?;
            let mode = if reveal {
                RevealMode::Reveal
            } else {
                RevealMode::Redact
            };
            let report = engine.dematerialize(&scope, &tree, mode).await?;
            if tree_only {
                CommandOutput::new(&report.tree, report.is_complete())
            } else {
                CommandOutput::new(&report, report.is_complete())
            }
        }

        Command::Purge { scope } => {
            let report = engine.purge(&scope).await?;
            CommandOutput::new(&report, report.is_complete())
        }

        Command::Reconcile { scope, input } => {
            let tree = read_tree(input.as_deref()).await?;
            let report = engine.reconcile(&scope, &tree).await?;
            CommandOutput::new(&report, true)
        }

        Command::DeriveName { scope, path } => {
            let name = engine.derive_name(&scope, &path).with_context(|| {
                format!("'{}' is not a secret-bearing field in this configuration", path)
            })?;
            CommandOutput::new(
                &serde_json::json!({
                    "name": name,
                    "reference": name.to_reference(),
                }),
                true,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use secref_engine::{EngineConfig, MemoryLedger, MemorySecretStore, WellKnownField};
    use serde_json::json;

    use super::*;

    fn engine() -> SecretEngine {
        let config = EngineConfig::default().with_well_known(WellKnownField::new("auth.key"));
        SecretEngine::new(config, MemorySecretStore::new(), MemoryLedger::new()).unwrap()
    }

    fn write_input(dir: &tempfile::TempDir, tree: &Value) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_vec(tree).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_materialize_then_reveal() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let scope: OwnerScope = "plugin:loganal".parse().unwrap();

        let input = write_input(&dir, &json!({"auth": {"key": "s3cr3t"}}));
        let saved = run(
            &engine,
            Command::Materialize {
                scope: scope.clone(),
                input: Some(input),
                tree_only: true,
            },
        )
        .await
        .unwrap();
        assert!(saved.complete);
        assert_eq!(
            saved.json,
            json!({"auth": {"key": "<ref:loganal--action--global--loganal>"}})
        );

        let input = write_input(&dir, &saved.json);
        let revealed = run(
            &engine,
            Command::Dematerialize {
                scope,
                input: Some(input),
                reveal: true,
                tree_only: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(revealed.json, json!({"auth": {"key": "s3cr3t"}}));
    }

    #[tokio::test]
    async fn test_derive_name() {
        let output = run(
            &engine(),
            Command::DeriveName {
                scope: "plugin:loganal".parse().unwrap(),
                path: "additionalFields.alpha__Secret".parse().unwrap(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            output.json["name"],
            json!("loganal--action-addset--global--loganal-alpha")
        );
    }

    #[tokio::test]
    async fn test_derive_name_rejects_plain_field() {
        let result = run(
            &engine(),
            Command::DeriveName {
                scope: "plugin:loganal".parse().unwrap(),
                path: "auth.type".parse().unwrap(),
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_json_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(read_tree(Some(&path)).await.is_err());
    }
}
