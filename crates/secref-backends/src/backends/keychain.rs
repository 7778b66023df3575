//! OS Keychain backend
//!
//! Supports:
//! - macOS Keychain
//! - Windows Credential Manager
//! - Linux Secret Service (via libsecret)
//!
//! Every record is one keychain entry under a single service name, with the
//! record name as the account. Keychain calls block, so they run on the
//! blocking pool.

use async_trait::async_trait;
use secref_engine::{SecretRecordName, SecretStore, SecretValue, StoreError};

const BACKEND: &str = "keychain";

/// Default keychain service name
pub const DEFAULT_SERVICE: &str = "secref";

/// Secret store backed by the OS keychain
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn run<T, F>(&self, name: &SecretRecordName, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&keyring::Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service.clone();
        let account = name.as_str().to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account)
                .map_err(|e| map_error(&service, &account, e))?;
            op(&entry).map_err(|e| map_error(&service, &account, e))
        })
        .await
        .map_err(|e| StoreError::backend(BACKEND, format!("Keychain task failed: {}", e)))?
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[async_trait]
impl SecretStore for KeychainStore {
    async fn put(&self, name: &SecretRecordName, value: &SecretValue) -> Result<(), StoreError> {
        let value = value.clone();
        self.run(name, move |entry| entry.set_password(value.expose()))
            .await
    }

    async fn get(&self, name: &SecretRecordName) -> Result<SecretValue, StoreError> {
        self.run(name, |entry| entry.get_password())
            .await
            .map(SecretValue::new)
    }

    async fn delete(&self, name: &SecretRecordName) -> Result<(), StoreError> {
        self.run(name, |entry| entry.delete_credential()).await
    }

    async fn exists(&self, name: &SecretRecordName) -> Result<bool, StoreError> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

fn map_error(service: &str, account: &str, err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoEntry => {
            StoreError::NotFound(format!("No keychain entry for {}/{}", service, account))
        }
        keyring::Error::Ambiguous(creds) => StoreError::backend(
            BACKEND,
            format!("Ambiguous entry: {} credentials found", creds.len()),
        ),
        keyring::Error::NoStorageAccess(inner) => StoreError::PermissionDenied(format!(
            "Cannot access keychain storage: {}",
            inner
        )),
        keyring::Error::PlatformFailure(inner) => StoreError::unavailable(BACKEND, inner.to_string()),
        _ => StoreError::backend(BACKEND, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entry_maps_to_not_found() {
        let err = map_error("secref", "loganal--action--global--loganal", keyring::Error::NoEntry);
        assert_eq!(
            err,
            StoreError::NotFound(
                "No keychain entry for secref/loganal--action--global--loganal".to_string()
            )
        );
    }

    #[test]
    fn test_other_errors_map_to_backend() {
        let err = map_error(
            "secref",
            "x",
            keyring::Error::TooLong("service".to_string(), 10),
        );
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn test_default_service() {
        assert_eq!(KeychainStore::default().service(), DEFAULT_SERVICE);
    }
}
