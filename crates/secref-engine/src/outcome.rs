//! Per-field outcomes and operation reports

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::ledger::ScopeLedgerEntry;
use crate::naming::SecretRecordName;
use crate::path::FieldPath;
use crate::scope::OwnerScope;

/// Category of a per-field failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Backend unreachable or timed out
    StoreUnavailable,
    /// Backend refused the operation
    PermissionDenied,
    /// Record vanished between ledger read and store call
    NotFound,
    /// The tree points at a record the backend does not have
    MissingRecord,
    /// The caller's context ended before the store call was issued
    Cancelled,
    Backend,
}

/// Why a single field could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

impl FieldFailure {
    pub fn from_store(err: &StoreError) -> Self {
        let (kind, retryable) = match err {
            StoreError::NotFound(_) => (FailureKind::NotFound, false),
            StoreError::Unavailable { .. } => (FailureKind::StoreUnavailable, true),
            StoreError::PermissionDenied(_) => (FailureKind::PermissionDenied, false),
            StoreError::Backend { .. } => (FailureKind::Backend, false),
        };
        Self {
            kind,
            message: err.to_string(),
            retryable,
        }
    }

    pub fn missing_record(name: &SecretRecordName) -> Self {
        Self {
            kind: FailureKind::MissingRecord,
            message: format!("Secret record '{}' does not exist", name),
            retryable: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "Request ended before the store call was issued".to_string(),
            retryable: true,
        }
    }
}

/// What happened to one field or record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldStatus {
    /// Plaintext moved into the store, reference written
    Stored,
    /// Reference kept as-is
    Unchanged,
    /// Empty field, record deleted
    Cleared,
    /// Record of a field that no longer exists was deleted
    OrphanDeleted,
    /// Record of a purged scope was deleted
    Purged,
    /// Reference replaced by the redaction placeholder
    Redacted,
    /// Reference replaced by the real value
    Revealed,
    /// Value is not a reference for this field and was left alone
    PassedThrough,
    Failed { failure: FieldFailure },
}

/// Outcome for one secret field (or, for orphans and purges, one record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<FieldPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<SecretRecordName>,
    #[serde(flatten)]
    pub status: FieldStatus,
}

impl FieldOutcome {
    pub fn field(path: &FieldPath, name: &SecretRecordName, status: FieldStatus) -> Self {
        Self {
            path: Some(path.clone()),
            name: Some(name.clone()),
            status,
        }
    }

    pub fn record(name: &SecretRecordName, status: FieldStatus) -> Self {
        Self {
            path: None,
            name: Some(name.clone()),
            status,
        }
    }

    pub fn failed(path: Option<&FieldPath>, name: &SecretRecordName, failure: FieldFailure) -> Self {
        Self {
            path: path.cloned(),
            name: Some(name.clone()),
            status: FieldStatus::Failed { failure },
        }
    }

    pub fn failure(&self) -> Option<&FieldFailure> {
        match &self.status {
            FieldStatus::Failed { failure } => Some(failure),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }
}

/// Result of a materialize call
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeReport {
    pub scope: OwnerScope,
    /// Rewritten tree, safe to persist: references only, never plaintext
    pub tree: Value,
    pub outcomes: Vec<FieldOutcome>,
    /// Ledger entry after the call, `None` once the scope holds no records
    pub ledger: Option<ScopeLedgerEntry>,
    /// Set when store calls ran but the ledger could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
}

impl MaterializeReport {
    /// Every field synchronised and the ledger committed
    pub fn is_complete(&self) -> bool {
        self.ledger_error.is_none() && !self.outcomes.iter().any(FieldOutcome::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Outcome for the field at `path`
    pub fn outcome_for(&self, path: &FieldPath) -> Option<&FieldOutcome> {
        self.outcomes.iter().find(|o| o.path.as_ref() == Some(path))
    }
}

/// How references are substituted on read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealMode {
    /// Placeholder instead of the value; safe for any UI-facing path
    #[default]
    Redact,
    /// Real values; trusted internal callers only
    Reveal,
}

/// Result of a dematerialize call
#[derive(Debug, Clone, Serialize)]
pub struct DematerializeReport {
    pub scope: OwnerScope,
    pub mode: RevealMode,
    pub tree: Value,
    pub outcomes: Vec<FieldOutcome>,
}

impl DematerializeReport {
    pub fn is_complete(&self) -> bool {
        !self.outcomes.iter().any(FieldOutcome::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }
}

/// Result of a purge call
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub scope: OwnerScope,
    pub outcomes: Vec<FieldOutcome>,
    /// Whether the ledger entry is gone; false means a retry is needed
    pub ledger_removed: bool,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        self.ledger_removed && !self.outcomes.iter().any(FieldOutcome::is_failed)
    }
}
