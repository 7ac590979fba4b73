//! Compact Store Module
//!
//! Keeps every small entry inside one versioned container document,
//! `{"version": n, "data": {key: entry}}`, held in a single storage slot.
//! Each mutation is one read-modify-write of the whole container.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::entry::StoredEntry;
use crate::error::{CacheError, Result};
use crate::storage::SlotStorage;

#[derive(Debug, Serialize, Deserialize)]
struct Container {
    version: u32,
    #[serde(default)]
    data: Map<String, Value>,
}

impl Container {
    fn empty(version: u32) -> Self {
        Self {
            version,
            data: Map::new(),
        }
    }
}

/// How a raw slot document relates to the expected schema.
enum Loaded {
    Current(Container),
    /// Slot never written
    Missing,
    /// Written under another schema version
    Outdated,
    Corrupt,
}

// == Compact Store ==
/// Size-bounded, versioned key to entry table in a single slot.
///
/// The per-entry threshold is the engine's call; the aggregate ceiling is
/// enforced here, against the container as actually stored.
pub struct CompactStore {
    slot: Arc<dyn SlotStorage>,
    /// Schema version the container must carry
    version: u32,
    /// Largest serialized container the store will save
    total_limit: usize,
    /// Serializes read-modify-write cycles on the slot
    lock: Mutex<()>,
}

impl CompactStore {
    pub fn new(slot: Arc<dyn SlotStorage>, version: u32, total_limit: usize) -> Self {
        Self {
            slot,
            version,
            total_limit,
            lock: Mutex::new(()),
        }
    }

    // == Read ==
    /// Reads one entry.
    ///
    /// A container with a different schema version (or one that no longer
    /// parses) is wiped back to an empty container of the expected version
    /// before reporting absent. An entry that fails to parse is absent.
    pub async fn read(&self, key: &str) -> Result<Option<StoredEntry>> {
        let _guard = self.lock.lock().await;
        let container = self.load_or_reset().await?;
        Ok(container.data.get(key).and_then(|raw| decode(key, raw)))
    }

    // == Peek ==
    /// Reads one entry without any side effect, not even a schema reset.
    pub async fn peek(&self, key: &str) -> Result<Option<StoredEntry>> {
        match self.load().await? {
            Loaded::Current(container) => {
                Ok(container.data.get(key).and_then(|raw| decode(key, raw)))
            }
            Loaded::Missing | Loaded::Outdated | Loaded::Corrupt => Ok(None),
        }
    }

    // == Write ==
    /// Inserts or replaces one entry.
    ///
    /// Fails with `QuotaExceeded`, leaving the stored container untouched,
    /// if the container would grow past the total limit. A replaced entry
    /// only counts once.
    pub async fn write(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        let raw = serde_json::to_value(entry)?;
        let _guard = self.lock.lock().await;
        let mut container = self.load_or_reset().await?;
        container.data.insert(key.to_string(), raw);

        let (document, size) = encode(&container)?;
        if size > self.total_limit {
            return Err(CacheError::QuotaExceeded(format!(
                "compact store would grow to {} bytes, limit is {}",
                size, self.total_limit
            )));
        }
        self.slot.store(&document).await
    }

    // == Remove ==
    /// Removes one entry. Absent keys are a no-op and cause no write.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut container = self.load_or_reset().await?;
        if container.data.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&container).await?;
        Ok(true)
    }

    // == Clear ==
    /// Resets the container to empty at the expected version.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(&Container::empty(self.version)).await
    }

    // == Length ==
    /// Number of entries in a current container. Side-effect free.
    pub async fn entry_count(&self) -> Result<usize> {
        match self.load().await? {
            Loaded::Current(container) => Ok(container.data.len()),
            Loaded::Missing | Loaded::Outdated | Loaded::Corrupt => Ok(0),
        }
    }

    async fn load(&self) -> Result<Loaded> {
        let document = match self.slot.load().await {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(Loaded::Missing),
            Err(CacheError::Serialization(e)) => {
                warn!("Compact store slot holds unreadable JSON: {}", e);
                return Ok(Loaded::Corrupt);
            }
            Err(e) => return Err(e),
        };

        let stored_version = document.get("version").and_then(Value::as_u64);
        if stored_version != Some(u64::from(self.version)) {
            debug!(
                "Compact store version {:?} does not match expected {}",
                stored_version, self.version
            );
            return Ok(Loaded::Outdated);
        }

        match serde_json::from_value::<Container>(document) {
            Ok(container) => Ok(Loaded::Current(container)),
            Err(e) => {
                warn!("Compact store container is corrupt: {}", e);
                Ok(Loaded::Corrupt)
            }
        }
    }

    /// Must be called with `lock` held.
    async fn load_or_reset(&self) -> Result<Container> {
        match self.load().await? {
            Loaded::Current(container) => Ok(container),
            Loaded::Missing => Ok(Container::empty(self.version)),
            Loaded::Outdated | Loaded::Corrupt => {
                warn!("Resetting compact store to schema version {}", self.version);
                let container = Container::empty(self.version);
                self.save(&container).await?;
                Ok(container)
            }
        }
    }

    /// Must be called with `lock` held.
    async fn save(&self, container: &Container) -> Result<()> {
        let (document, _) = encode(container)?;
        self.slot.store(&document).await
    }
}

/// Container as a slot document, with its serialized size.
fn encode(container: &Container) -> Result<(Value, usize)> {
    let document = serde_json::to_value(container)?;
    let size = serde_json::to_vec(&document)?.len();
    Ok((document, size))
}

fn decode(key: &str, raw: &Value) -> Option<StoredEntry> {
    match serde_json::from_value(raw.clone()) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Malformed compact entry for '{}': {}", key, e);
            None
        }
    }
}
