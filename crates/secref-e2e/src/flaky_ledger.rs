//! Failure-injecting ledger for E2E tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use secref_engine::{LedgerError, LedgerStore, MemoryLedger, OwnerScope, ScopeLedgerEntry};

/// Ledger that fails reads or writes on demand
pub struct FlakyLedger {
    inner: Arc<MemoryLedger>,
    fail_get: AtomicBool,
    fail_write: AtomicBool,
    writes: AtomicU64,
}

impl FlakyLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Fail both put and delete
    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Number of put and delete calls
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn scope_count(&self) -> usize {
        self.inner.scope_count()
    }

    fn check_write(&self) -> Result<(), LedgerError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.load(Ordering::SeqCst) {
            tracing::debug!("FlakyLedger: simulated write failure");
            return Err(LedgerError::Unavailable("Simulated ledger write failure".into()));
        }
        Ok(())
    }
}

impl Default for FlakyLedger {
    fn default() -> Self {
        Self {
            inner: MemoryLedger::new(),
            fail_get: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyLedger {
    async fn get(&self, scope: &OwnerScope) -> Result<Option<ScopeLedgerEntry>, LedgerError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("Simulated ledger read failure".into()));
        }
        self.inner.get(scope).await
    }

    async fn put(&self, entry: &ScopeLedgerEntry) -> Result<(), LedgerError> {
        self.check_write()?;
        self.inner.put(entry).await
    }

    async fn delete(&self, scope: &OwnerScope) -> Result<(), LedgerError> {
        self.check_write()?;
        self.inner.delete(scope).await
    }
}
