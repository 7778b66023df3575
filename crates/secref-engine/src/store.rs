//! Secret store adapter contract
//!
//! A thin shim over whatever secret backend the host deploys. Adapters carry
//! no retries, caching or business rules; timeouts belong to the backend
//! client and surface as [`StoreError::Unavailable`].

use async_trait::async_trait;

use crate::error::StoreError;
use crate::naming::SecretRecordName;
use crate::value::SecretValue;

/// Trait for secret backends
///
/// Implementations MUST NOT log secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create or overwrite a record
    async fn put(&self, name: &SecretRecordName, value: &SecretValue) -> Result<(), StoreError>;

    /// Read a record, [`StoreError::NotFound`] if it does not exist
    async fn get(&self, name: &SecretRecordName) -> Result<SecretValue, StoreError>;

    /// Delete a record, [`StoreError::NotFound`] if it does not exist
    async fn delete(&self, name: &SecretRecordName) -> Result<(), StoreError>;

    /// Check whether a record exists
    async fn exists(&self, name: &SecretRecordName) -> Result<bool, StoreError>;

    /// Backend name for logging/errors
    fn backend_name(&self) -> &'static str;
}
