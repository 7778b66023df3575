//! Engine configuration
//!
//! The naming convention is data, not code: the suffix token, the well-known
//! secret paths, and the backend's name limits are all supplied here and
//! validated once when the engine is built.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::naming::MIN_NAME_LENGTH;
use crate::path::FieldPath;

/// Default reserved suffix marking a secret-bearing key
pub const DEFAULT_SECRET_SUFFIX: &str = "__Secret";

/// Default key of the container holding free-form additional fields
pub const DEFAULT_ADDITIONAL_FIELDS_KEY: &str = "additionalFields";

/// Default maximum record name length (Azure Key Vault's limit, the tightest common one)
pub const DEFAULT_MAX_NAME_LENGTH: usize = 127;

/// Default placeholder substituted for secrets in redacted reads
pub const DEFAULT_REDACTION_PLACEHOLDER: &str = "**********";

/// Default maximum tree depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A field that is secret regardless of its key name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WellKnownField {
    /// Path of the field, e.g. `auth.key`
    pub path: String,

    /// Distinguishes the record when a scope has more than one well-known field.
    /// Without an alias the field maps to the scope's primary credential record.
    #[serde(default)]
    pub alias: Option<String>,
}

impl WellKnownField {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }

    pub fn with_alias(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: Some(alias.into()),
        }
    }
}

/// Engine configuration (parsed from TOML by hosts, or built in code)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Case-sensitive suffix marking secret-bearing keys
    pub secret_suffix: String,

    /// Fields that are secret regardless of naming
    pub well_known: Vec<WellKnownField>,

    /// Top-level key holding free-form additional fields
    pub additional_fields_key: String,

    /// Backend's maximum record name length
    pub max_name_length: usize,

    /// Value substituted for secrets in redacted reads
    pub redaction_placeholder: String,

    /// Trees nested deeper than this are rejected
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            secret_suffix: DEFAULT_SECRET_SUFFIX.to_string(),
            well_known: Vec::new(),
            additional_fields_key: DEFAULT_ADDITIONAL_FIELDS_KEY.to_string(),
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            redaction_placeholder: DEFAULT_REDACTION_PLACEHOLDER.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Register a well-known secret field
    pub fn with_well_known(mut self, field: WellKnownField) -> Self {
        self.well_known.push(field);
        self
    }

    pub fn with_max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Parse well-known paths and index them by path
    ///
    /// Validates the whole configuration on the way.
    pub(crate) fn well_known_index(&self) -> Result<HashMap<FieldPath, Option<String>>, ConfigError> {
        if self.secret_suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        if self.max_name_length < MIN_NAME_LENGTH {
            return Err(ConfigError::NameLengthTooSmall(self.max_name_length));
        }
        if self.redaction_placeholder.is_empty() {
            return Err(ConfigError::EmptyPlaceholder);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }

        let mut index = HashMap::new();
        let mut aliases: HashMap<Option<String>, String> = HashMap::new();
        for field in &self.well_known {
            let path: FieldPath = field.path.parse()?;
            if path.first_key().is_none() {
                return Err(ConfigError::InvalidPath {
                    path: field.path.clone(),
                    reason: "path must start with a key".to_string(),
                });
            }

            if let Some(alias) = &field.alias {
                let valid = !alias.is_empty()
                    && alias
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
                if !valid {
                    return Err(ConfigError::InvalidAlias {
                        path: field.path.clone(),
                        alias: alias.clone(),
                    });
                }
            }

            if let Some(first) = aliases.insert(field.alias.clone(), field.path.clone()) {
                return Err(ConfigError::DuplicateAlias {
                    first,
                    second: field.path.clone(),
                });
            }
            if index.insert(path, field.alias.clone()).is_some() {
                return Err(ConfigError::DuplicatePath(field.path.clone()));
            }
        }

        Ok(index)
    }

    /// Check the configuration without building an engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.well_known_index().map(|_| ())
    }
}
