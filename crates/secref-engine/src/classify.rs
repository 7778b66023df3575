//! Field classification
//!
//! Walks a configuration tree depth-first and picks out the leaves that carry
//! secret material, either because their key ends with the reserved suffix or
//! because their path is one of the configured well-known secret paths.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError};
use crate::path::FieldPath;
use crate::value::SecretValue;

/// Why a leaf was classified as secret-bearing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Classification {
    /// Terminal key ends with the reserved suffix
    Suffix,
    /// Path matches a configured well-known path
    WellKnown { alias: Option<String> },
}

/// A secret-bearing leaf and its current value
#[derive(Debug, Clone)]
pub struct SecretField {
    pub path: FieldPath,
    pub classification: Classification,
    /// `None` when the leaf is null or an empty string
    pub value: Option<SecretValue>,
}

impl SecretField {
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

/// Decides, per leaf, whether it is secret-bearing
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    suffix: String,
    well_known: HashMap<FieldPath, Option<String>>,
    max_depth: usize,
}

impl FieldClassifier {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            suffix: config.secret_suffix.clone(),
            well_known: config.well_known_index()?,
            max_depth: config.max_depth,
        })
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Classify a single path as if it pointed at a leaf
    ///
    /// Well-known paths win over the suffix convention.
    pub fn classify_path(&self, path: &FieldPath) -> Option<Classification> {
        if let Some(alias) = self.well_known.get(path) {
            return Some(Classification::WellKnown {
                alias: alias.clone(),
            });
        }
        match path.terminal_key() {
            Some(key) if key.ends_with(&self.suffix) => Some(Classification::Suffix),
            _ => None,
        }
    }

    /// Collect every secret-bearing leaf, in depth-first order
    pub fn classify(&self, tree: &Value) -> Result<Vec<SecretField>, EngineError> {
        check_tree(tree, self.max_depth)?;

        let mut fields = Vec::new();
        self.walk(tree, &FieldPath::root(), &mut fields);
        Ok(fields)
    }

    fn walk(&self, node: &Value, path: &FieldPath, out: &mut Vec<SecretField>) {
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    self.walk(child, &path.key(key.as_str()), out);
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    self.walk(child, &path.index(idx), out);
                }
            }
            leaf => {
                if let Some(classification) = self.classify_path(path) {
                    out.push(SecretField {
                        path: path.clone(),
                        classification,
                        value: SecretValue::from_leaf(leaf),
                    });
                }
            }
        }
    }
}

/// Reject trees the engine cannot process: non-object roots and runaway nesting
pub fn check_tree(tree: &Value, max_depth: usize) -> Result<(), EngineError> {
    if !tree.is_object() {
        return Err(EngineError::classification(
            "configuration root must be an object",
        ));
    }
    check_depth(tree, 0, max_depth)
}

fn check_depth(node: &Value, depth: usize, max_depth: usize) -> Result<(), EngineError> {
    let children: Box<dyn Iterator<Item = &Value>> = match node {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => return Ok(()),
    };
    if depth >= max_depth {
        return Err(EngineError::classification(format!(
            "tree nested deeper than {} levels",
            max_depth
        )));
    }
    for child in children {
        check_depth(child, depth + 1, max_depth)?;
    }
    Ok(())
}
