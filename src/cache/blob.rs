//! Blob Store Module
//!
//! One file-like blob per entry, for entries too large for the compact
//! store. Keys are independent: there is no shared envelope.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::entry::StoredEntry;
use crate::error::Result;
use crate::storage::BlobArea;

/// Extension of every blob written by this store.
const BLOB_EXTENSION: &str = ".json";

/// Longest sanitized key used verbatim as a blob name. Every name must stay
/// under the 255-byte file name limit.
const MAX_NAME_STEM: usize = 160;

/// Length of the readable prefix kept for long keys.
const HASHED_PREFIX_LEN: usize = 64;

/// Persisted form of a blob. The key is kept so that two keys sanitizing
/// to the same name never read each other's entry.
#[derive(Debug, Serialize, Deserialize)]
struct BlobRecord {
    key: String,
    entry: StoredEntry,
}

// == Blob Name ==
/// Maps a cache key to a file name that is legal on every platform.
///
/// Everything outside `[A-Za-z0-9_-]` becomes `_`. Names longer than
/// `MAX_NAME_STEM` become `<prefix>-<sha256 of key>`.
pub fn blob_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.len() > MAX_NAME_STEM {
        // Sanitized names are pure ASCII, so any byte index is a char boundary.
        name.truncate(HASHED_PREFIX_LEN);
        name.push('-');
        name.push_str(&format!("{:x}", Sha256::digest(key.as_bytes())));
    }

    name.push_str(BLOB_EXTENSION);
    name
}

// == Blob Store ==
pub struct BlobStore {
    area: Arc<dyn BlobArea>,
}

impl BlobStore {
    pub fn new(area: Arc<dyn BlobArea>) -> Self {
        Self { area }
    }

    // == Read ==
    /// Reads one entry.
    ///
    /// Missing blobs, unparsable content and blobs recorded for a different
    /// key are all absent. Only failures of the area itself are errors.
    pub async fn read(&self, key: &str) -> Result<Option<StoredEntry>> {
        let Some(bytes) = self.area.read(&blob_name(key)).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<BlobRecord>(&bytes) {
            Ok(record) if record.key == key => Ok(Some(record.entry)),
            Ok(record) => {
                debug!(
                    "Blob for '{}' belongs to '{}', treating as absent",
                    key, record.key
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Malformed blob for '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    // == Write ==
    pub async fn write(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        let record = BlobRecord {
            key: key.to_string(),
            entry: entry.clone(),
        };
        let bytes = serde_json::to_vec(&record)?;
        self.area.write(&blob_name(key), &bytes).await
    }

    // == Remove ==
    /// Deletes the blob for `key`; missing blobs are not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.area.delete(&blob_name(key)).await
    }

    // == Clear ==
    /// Deletes every blob. Keeps going past individual failures and
    /// returns the first one.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut first_error = None;

        for name in self.blob_names().await? {
            match self.area.delete(&name).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!("Failed to delete blob '{}': {}", name, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    // == Entry Count ==
    pub async fn entry_count(&self) -> Result<usize> {
        Ok(self.blob_names().await?.len())
    }

    async fn blob_names(&self) -> Result<Vec<String>> {
        Ok(self
            .area
            .list()
            .await?
            .into_iter()
            .filter(|name| name.ends_with(BLOB_EXTENSION))
            .collect())
    }
}
