use thiserror::Error;

/// Errors returned by a secret store adapter.
///
/// Adapters map their backend-specific failures onto these four cases; the
/// engine never looks past them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Record does not exist in the backend
    #[error("Secret record not found: {0}")]
    NotFound(String),

    /// Backend unreachable or timed out (transient)
    #[error("{backend} unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// Caller is not allowed to touch the record
    #[error("Access denied to secret record: {0}")]
    PermissionDenied(String),

    /// Any other backend failure
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors from the scope ledger storage
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger entry for '{scope}' is corrupt: {message}")]
    Serialization { scope: String, message: String },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Invalid engine configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Secret suffix must not be empty")]
    EmptySuffix,

    #[error("Maximum name length {0} is too small (minimum {min})", min = crate::naming::MIN_NAME_LENGTH)]
    NameLengthTooSmall(usize),

    #[error("Invalid well-known path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Well-known path '{0}' is listed more than once")]
    DuplicatePath(String),

    #[error("Invalid alias '{alias}' for '{path}': aliases must be lowercase alphanumerics")]
    InvalidAlias { path: String, alias: String },

    #[error("Well-known paths '{first}' and '{second}' would share one secret record")]
    DuplicateAlias { first: String, second: String },

    #[error("Redaction placeholder must not be empty")]
    EmptyPlaceholder,

    #[error("Maximum depth must be at least 1")]
    ZeroDepth,
}

/// Call-level engine errors
///
/// Store failures never surface here. Each one is mapped onto a
/// [`FailureKind`](crate::FailureKind) in the per-field outcome list of the
/// report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or cyclic input tree, rejected before any processing
    #[error("Invalid configuration tree: {0}")]
    Classification(String),

    /// Scope identity is unusable
    #[error("Invalid owner scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },

    /// Two distinct fields derived the same record name
    #[error("Fields '{first}' and '{second}' both derive secret record '{name}'")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Create a classification error
    pub fn classification(reason: impl Into<String>) -> Self {
        Self::Classification(reason.into())
    }

    /// Create an invalid scope error
    pub fn invalid_scope(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScope {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_pass_through() {
        let err: EngineError = LedgerError::Unavailable("connection reset".into()).into();
        assert_eq!(err.to_string(), "Ledger unavailable: connection reset");
    }

    #[test]
    fn test_collision_message_names_both_fields() {
        let err = EngineError::NameCollision {
            name: "p--action-field--global--p-a".into(),
            first: "a__Secret".into(),
            second: "A__Secret".into(),
        };
        assert_eq!(
            err.to_string(),
            "Fields 'a__Secret' and 'A__Secret' both derive secret record 'p--action-field--global--p-a'"
        );
    }
}
