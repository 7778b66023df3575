//! Failure-injecting secret store for E2E tests
//!
//! Wraps the in-memory store, counts every call and can be told to fail
//! individual operations or names.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use secref_engine::{MemorySecretStore, SecretRecordName, SecretStore, SecretValue, StoreError};

const BACKEND: &str = "flaky";

/// Which store operation a counter or toggle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Put,
    Get,
    Delete,
    Exists,
}

/// Store that fails on demand
pub struct FlakySecretStore {
    inner: Arc<MemorySecretStore>,
    fail_put: AtomicBool,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
    fail_exists: AtomicBool,
    /// Any operation on these names fails
    failing_names: DashSet<SecretRecordName>,
    /// Fail with PermissionDenied instead of Unavailable
    deny: AtomicBool,
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    exists: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    /// Cancel the token once this many puts have completed
    cancel_after_puts: Mutex<Option<(u64, CancellationToken)>>,
}

impl FlakySecretStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Underlying store, for assertions on what is actually persisted
    pub fn inner(&self) -> &MemorySecretStore {
        &self.inner
    }

    pub fn set_fail(&self, op: StoreOp, fail: bool) {
        let flag = match op {
            StoreOp::Put => &self.fail_put,
            StoreOp::Get => &self.fail_get,
            StoreOp::Delete => &self.fail_delete,
            StoreOp::Exists => &self.fail_exists,
        };
        flag.store(fail, Ordering::SeqCst);
    }

    /// Fail every operation touching `name`
    pub fn fail_name(&self, name: &SecretRecordName) {
        self.failing_names.insert(name.clone());
    }

    pub fn heal_name(&self, name: &SecretRecordName) {
        self.failing_names.remove(name);
    }

    /// Report injected failures as permission errors rather than outages
    pub fn set_deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// Delay every call, to widen race windows
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn cancel_after_puts(&self, puts: u64, token: CancellationToken) {
        *self.cancel_after_puts.lock() = Some((puts, token));
    }

    pub fn calls(&self, op: StoreOp) -> u64 {
        match op {
            StoreOp::Put => self.puts.load(Ordering::SeqCst),
            StoreOp::Get => self.gets.load(Ordering::SeqCst),
            StoreOp::Delete => self.deletes.load(Ordering::SeqCst),
            StoreOp::Exists => self.exists.load(Ordering::SeqCst),
        }
    }

    pub fn total_calls(&self) -> u64 {
        [StoreOp::Put, StoreOp::Get, StoreOp::Delete, StoreOp::Exists]
            .into_iter()
            .map(|op| self.calls(op))
            .sum()
    }

    /// Highest number of calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(
        &self,
        op: StoreOp,
        flag: &AtomicBool,
        name: &SecretRecordName,
    ) -> Result<InFlight<'_>, StoreError> {
        let counter = match op {
            StoreOp::Put => &self.puts,
            StoreOp::Get => &self.gets,
            StoreOp::Delete => &self.deletes,
            StoreOp::Exists => &self.exists,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if flag.load(Ordering::SeqCst) || self.failing_names.contains(name) {
            tracing::debug!("FlakySecretStore: simulated {:?} failure for {}", op, name);
            return Err(if self.deny.load(Ordering::SeqCst) {
                StoreError::PermissionDenied(format!("Simulated denial for {}", name))
            } else {
                StoreError::unavailable(BACKEND, format!("Simulated outage for {}", name))
            });
        }

        Ok(guard)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for FlakySecretStore {
    fn default() -> Self {
        Self {
            inner: MemorySecretStore::new(),
            fail_put: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_exists: AtomicBool::new(false),
            failing_names: DashSet::new(),
            deny: AtomicBool::new(false),
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            exists: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Mutex::new(None),
            cancel_after_puts: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SecretStore for FlakySecretStore {
    async fn put(&self, name: &SecretRecordName, value: &SecretValue) -> Result<(), StoreError> {
        let _guard = self.enter(StoreOp::Put, &self.fail_put, name).await?;
        self.inner.put(name, value).await?;

        let puts = self.puts.load(Ordering::SeqCst);
        if let Some((after, token)) = self.cancel_after_puts.lock().as_ref() {
            if puts >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn get(&self, name: &SecretRecordName) -> Result<SecretValue, StoreError> {
        let _guard = self.enter(StoreOp::Get, &self.fail_get, name).await?;
        self.inner.get(name).await
    }

    async fn delete(&self, name: &SecretRecordName) -> Result<(), StoreError> {
        let _guard = self.enter(StoreOp::Delete, &self.fail_delete, name).await?;
        self.inner.delete(name).await
    }

    async fn exists(&self, name: &SecretRecordName) -> Result<bool, StoreError> {
        let _guard = self.enter(StoreOp::Exists, &self.fail_exists, name).await?;
        self.inner.exists(name).await
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_simulation() {
        let store = FlakySecretStore::new();
        let name = SecretRecordName::from_stored("a");

        store.set_fail(StoreOp::Put, true);
        let result = store.put(&name, &SecretValue::new("x")).await;
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
        assert!(store.inner().is_empty());

        store.set_fail(StoreOp::Put, false);
        store.put(&name, &SecretValue::new("x")).await.unwrap();
        assert_eq!(store.calls(StoreOp::Put), 2);

        store.fail_name(&name);
        store.set_deny(true);
        let result = store.get(&name).await;
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));

        store.heal_name(&name);
        assert_eq!(store.get(&name).await.unwrap().expose(), "x");
        assert_eq!(store.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_cancel_after_puts() {
        let store = FlakySecretStore::new();
        let token = CancellationToken::new();
        store.cancel_after_puts(1, token.clone());

        store
            .put(&SecretRecordName::from_stored("a"), &SecretValue::new("1"))
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }
}
