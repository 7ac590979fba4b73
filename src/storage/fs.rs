//! Filesystem storage primitives.
//!
//! Every write lands in a temporary sibling file first and is then renamed
//! over the target, so readers never see a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::{BlobArea, SlotStorage};
use crate::error::{CacheError, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let suffix = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), suffix));

    fs::write(&temp_path, bytes).await?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).await.map_err(|e| {
        CacheError::StorageUnavailable(format!("cannot create {}: {}", dir.display(), e))
    })?;

    // Probe writability once so a read-only location fails here, not per call.
    let probe = dir.join(".probe");
    fs::write(&probe, b"").await.map_err(|e| {
        CacheError::StorageUnavailable(format!("cannot write to {}: {}", dir.display(), e))
    })?;
    let _ = fs::remove_file(&probe).await;
    Ok(())
}

// == File Slot ==
/// A slot persisted as a single JSON file.
#[derive(Debug)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Opens the slot at `path`, creating its parent directory.
    ///
    /// Fails with `StorageUnavailable` if the location cannot be written.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl SlotStorage for FileSlot {
    async fn load(&self) -> Result<Option<Value>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn store(&self, document: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        write_atomic(&self.path, &bytes).await
    }
}

// == Filesystem Blob Area ==
/// A blob area where each blob is one file in a directory.
#[derive(Debug)]
pub struct FsBlobArea {
    dir: PathBuf,
}

impl FsBlobArea {
    /// Opens (and creates if needed) the blob directory.
    ///
    /// Fails with `StorageUnavailable` if the directory cannot be written.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn is_temp_file(name: &str) -> bool {
        name.contains(".tmp.") || name == ".probe"
    }
}

#[async_trait]
impl BlobArea for FsBlobArea {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.dir.join(name), bytes).await
    }

    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !Self::is_temp_file(&name) => names.push(name),
                Ok(_) => {}
                Err(raw) => debug!("Skipping non UTF-8 blob name {:?}", raw),
            }
        }
        Ok(names)
    }
}
