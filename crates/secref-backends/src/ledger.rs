//! Directory-backed scope ledger
//!
//! Each scope is one JSON file. File names are the hex encoding of the scope
//! key, so any scope name maps to a distinct, portable file name. Keys too
//! long to fit a file name are stored under the SHA-256 of the key instead,
//! with a non-hex prefix so the two forms never meet.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secref_engine::{LedgerError, LedgerStore, OwnerScope, ScopeLedgerEntry};
use sha2::{Digest, Sha256};

use crate::backends::file::write_atomic;

/// Longest hex stem used verbatim; common filesystems cap names at 255 bytes
const MAX_HEX_STEM: usize = 200;

#[derive(Debug, Clone)]
pub struct FileLedger {
    dir: PathBuf,
}

impl FileLedger {
    /// Open a ledger rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, scope: &OwnerScope) -> PathBuf {
        let key = scope.key();
        let stem = hex::encode(key.as_bytes());
        if stem.len() <= MAX_HEX_STEM {
            return self.dir.join(format!("{}.json", stem));
        }
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("sha256-{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl LedgerStore for FileLedger {
    async fn get(&self, scope: &OwnerScope) -> Result<Option<ScopeLedgerEntry>, LedgerError> {
        let raw = match tokio::fs::read(self.entry_path(scope)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: ScopeLedgerEntry =
            serde_json::from_slice(&raw).map_err(|e| LedgerError::Serialization {
                scope: scope.to_string(),
                message: e.to_string(),
            })?;

        if entry.scope != *scope {
            return Err(LedgerError::Serialization {
                scope: scope.to_string(),
                message: format!("entry belongs to '{}'", entry.scope),
            });
        }

        Ok(Some(entry))
    }

    async fn put(&self, entry: &ScopeLedgerEntry) -> Result<(), LedgerError> {
        let raw =
            serde_json::to_vec_pretty(entry).map_err(|e| LedgerError::Serialization {
                scope: entry.scope.to_string(),
                message: e.to_string(),
            })?;
        write_atomic(&self.entry_path(&entry.scope), &raw).await?;
        tracing::debug!(scope = %entry.scope, revision = entry.revision, "Ledger entry written");
        Ok(())
    }

    async fn delete(&self, scope: &OwnerScope) -> Result<(), LedgerError> {
        match tokio::fs::remove_file(self.entry_path(scope)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
