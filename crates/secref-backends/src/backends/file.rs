//! File backend
//!
//! One file per record, named after the record, inside a single directory.
//! Record names only contain `[a-z0-9-]`, so they are safe file names.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secref_engine::{SecretRecordName, SecretStore, SecretValue, StoreError};

const BACKEND: &str = "file";

/// Secret store keeping each record in its own file
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &SecretRecordName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    fn map_error(&self, name: &SecretRecordName, err: io::Error) -> StoreError {
        map_io_error(&self.record_path(name), name, err)
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn put(&self, name: &SecretRecordName, value: &SecretValue) -> Result<(), StoreError> {
        let path = self.record_path(name);
        write_atomic(&path, value.expose().as_bytes())
            .await
            .map_err(|e| self.map_error(name, e))
    }

    async fn get(&self, name: &SecretRecordName) -> Result<SecretValue, StoreError> {
        tokio::fs::read_to_string(self.record_path(name))
            .await
            .map(SecretValue::new)
            .map_err(|e| self.map_error(name, e))
    }

    async fn delete(&self, name: &SecretRecordName) -> Result<(), StoreError> {
        tokio::fs::remove_file(self.record_path(name))
            .await
            .map_err(|e| self.map_error(name, e))
    }

    async fn exists(&self, name: &SecretRecordName) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.record_path(name))
            .await
            .map_err(|e| self.map_error(name, e))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

fn map_io_error(path: &Path, name: &SecretRecordName, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
        io::ErrorKind::PermissionDenied => {
            StoreError::PermissionDenied(format!("{}: {}", path.display(), err))
        }
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
            StoreError::unavailable(BACKEND, format!("{}: {}", path.display(), err))
        }
        _ => StoreError::backend(BACKEND, format!("{}: {}", path.display(), err)),
    }
}

/// Write to a sibling temp file, then rename over the target
///
/// Readers see either the old or the new content. On unix the file is
/// created with mode 0600.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let result = async {
        use tokio::io::AsyncWriteExt;

        let mut file = options.open(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}
