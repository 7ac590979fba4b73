//! Cache Engine Module
//!
//! Orchestrates the compact and blob tiers, applies validity strategies and
//! moves keys between tiers as their size changes.
//!
//! The engine is advisory: no operation ever returns a storage error. Any
//! backend failure is logged and turns into a miss (reads) or a skipped
//! write (writes), so callers can always proceed as if the cache were empty.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::blob::BlobStore;
use crate::cache::compact::CompactStore;
use crate::cache::diagnostics::DiagnosticsReport;
use crate::cache::entry::{current_timestamp_ms, EntryMetadata, StoredEntry, Strategy};
use crate::cache::key::{extract_params, is_valid_key};
use crate::cache::oracle::StateVersionOracle;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::strategy::{evaluate, Validity};
use crate::cache::{
    BLOB_DIR, CACHE_SCHEMA_VERSION, COMPACT_ENTRY_THRESHOLD, COMPACT_SLOT_FILE,
    COMPACT_TOTAL_LIMIT,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::storage::{BlobArea, FileSlot, FsBlobArea, SlotStorage};

// == Tier ==
/// Physical storage backend an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Compact,
    Blob,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Compact => "compact",
            Tier::Blob => "blob",
        }
    }
}

// == Engine Options ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Schema version the compact store must carry
    pub schema_version: u32,
    /// Largest serialized entry kept in the compact store
    pub compact_entry_threshold: usize,
    /// Aggregate ceiling of the compact store
    pub compact_total_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            compact_entry_threshold: COMPACT_ENTRY_THRESHOLD,
            compact_total_limit: COMPACT_TOTAL_LIMIT,
        }
    }
}

/// Result of looking a key up in both tiers.
enum Lookup {
    Hit(Tier, StoredEntry),
    Stale(Tier, Validity),
    Absent,
}

struct EngineInner {
    compact: CompactStore,
    blobs: BlobStore,
    oracle: Arc<dyn StateVersionOracle>,
    options: EngineOptions,
    stats: StatsRecorder,
    /// Serializes mutations so that a tier migration, a removal or a lazy
    /// eviction never interleaves with another one.
    write_gate: Mutex<()>,
}

// == Cache Engine ==
/// Two-tier cache. Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

impl CacheEngine {
    // == Constructor ==
    /// Creates an engine over host-provided storage primitives.
    pub fn new(
        slot: Arc<dyn SlotStorage>,
        area: Arc<dyn BlobArea>,
        oracle: Arc<dyn StateVersionOracle>,
        options: EngineOptions,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                compact: CompactStore::new(
                    slot,
                    options.schema_version,
                    options.compact_total_limit,
                ),
                blobs: BlobStore::new(area),
                oracle,
                options,
                stats: StatsRecorder::new(),
                write_gate: Mutex::new(()),
            }),
        }
    }

    // == Open ==
    /// Opens filesystem-backed storage under `config.cache_dir`.
    ///
    /// This is the only place a storage failure surfaces: if the host denies
    /// access to the location, `StorageUnavailable` is returned once here.
    pub async fn open(config: &Config, oracle: Arc<dyn StateVersionOracle>) -> Result<Self> {
        let slot = FileSlot::open(config.cache_dir.join(COMPACT_SLOT_FILE)).await?;
        let area = FsBlobArea::open(config.cache_dir.join(BLOB_DIR)).await?;
        info!("Cache storage opened at {}", config.cache_dir.display());

        Ok(Self::new(
            Arc::new(slot),
            Arc::new(area),
            oracle,
            config.engine_options(),
        ))
    }

    // == Get ==
    /// Returns the cached value for `key` if it is present and valid.
    ///
    /// An entry that is present but invalid (expired, stale state, changed
    /// params, or no longer decodable as `T`) is removed from both tiers.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !is_valid_key(key) {
            debug!("Cache get for malformed key '{}'", key);
            self.inner.stats.record_miss();
            return None;
        }

        if let Lookup::Hit(tier, entry) = self.lookup(key).await {
            if let Some(value) = self.decode_hit(key, tier, entry) {
                return Some(value);
            }
        }

        // Look again under the gate so a write that raced this read is
        // returned instead of being evicted.
        let _gate = self.inner.write_gate.lock().await;
        let stale = match self.lookup(key).await {
            Lookup::Hit(tier, entry) => match self.decode_hit(key, tier, entry) {
                Some(value) => return Some(value),
                None => true,
            },
            Lookup::Stale(tier, validity) => {
                debug!(
                    "Cache entry '{}' in {} store is {}",
                    key,
                    tier.as_str(),
                    validity.describe()
                );
                true
            }
            Lookup::Absent => false,
        };

        self.evict(key).await;
        if stale {
            self.inner.stats.record_eviction();
        }
        self.inner.stats.record_miss();
        debug!("Cache miss for '{}'", key);
        None
    }

    // == Set ==
    /// Stores `data` under `key`.
    ///
    /// The entry goes to the compact store when its serialized size is within
    /// `compact_entry_threshold`, otherwise to the blob store. A small entry
    /// that would push the compact store past its total limit goes to the
    /// blob store too. Any copy in the other tier is removed.
    ///
    /// # Arguments
    /// * `strategy` - validity rule for the entry
    /// * `ttl_ms` - time to live; must be non-zero unless `Permanent`
    /// * `params` - param snapshot; for `ParamBased` defaults to the key's params
    ///
    /// # Returns
    /// The tier written to, or `None` if the write was skipped.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        strategy: Strategy,
        ttl_ms: u64,
        params: Option<String>,
    ) -> Option<Tier> {
        if !is_valid_key(key) {
            warn!("Refusing to cache malformed key '{}'", key);
            return None;
        }
        if ttl_ms == 0 && strategy != Strategy::Permanent {
            warn!("Refusing to cache '{}' with zero TTL", key);
            return None;
        }

        let state_version = match self.inner.oracle.current_version().await {
            Ok(version) => version,
            Err(e) if strategy == Strategy::StateBased => {
                warn!("Skipping write of '{}', state version unavailable: {}", key, e);
                return None;
            }
            Err(e) => {
                warn!("State version unavailable while writing '{}': {}", key, e);
                0
            }
        };

        let params = match strategy {
            Strategy::ParamBased => params.or_else(|| extract_params(key)),
            _ => params,
        };

        let entry = match serde_json::to_value(data) {
            Ok(data) => StoredEntry::new(
                data,
                EntryMetadata {
                    timestamp: current_timestamp_ms(),
                    ttl: ttl_ms,
                    state_version,
                    strategy,
                    params,
                },
            ),
            Err(e) => {
                self.backend_error("serialize", key, &e.into());
                return None;
            }
        };

        let size = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                self.backend_error("measure", key, &e.into());
                return None;
            }
        };

        let _gate = self.inner.write_gate.lock().await;
        let tier = self.select_tier(size);
        debug!("Caching '{}' ({} bytes) in {} store", key, size, tier.as_str());

        match tier {
            Tier::Compact => match self.inner.compact.write(key, &entry).await {
                Ok(()) => {
                    self.inner.stats.record_compact_write();
                    if let Err(e) = self.inner.blobs.remove(key).await {
                        self.backend_error("remove stale blob copy of", key, &e);
                    }
                    Some(Tier::Compact)
                }
                Err(e @ CacheError::QuotaExceeded(_)) => {
                    warn!("Compact store full, moving '{}' to blob store: {}", key, e);
                    self.write_blob(key, &entry).await
                }
                Err(e) => {
                    self.backend_error("write compact entry", key, &e);
                    None
                }
            },
            Tier::Blob => self.write_blob(key, &entry).await,
        }
    }

    // == Remove ==
    /// Removes `key` from both tiers. Absent keys are fine.
    pub async fn remove(&self, key: &str) {
        let _gate = self.inner.write_gate.lock().await;
        self.evict(key).await;
    }

    // == Clear ==
    /// Empties both tiers, permanent entries included.
    pub async fn clear(&self) {
        let _gate = self.inner.write_gate.lock().await;

        if let Err(e) = self.inner.compact.clear().await {
            self.backend_error("clear", "compact store", &e);
        }
        match self.inner.blobs.clear().await {
            Ok(removed) => info!("Cache cleared ({} blobs removed)", removed),
            Err(e) => self.backend_error("clear", "blob store", &e),
        }
    }

    // == Debug ==
    /// Describes the entry for `key` without touching it.
    ///
    /// Never evicts, never resets a schema-mismatched compact store and never
    /// updates statistics.
    pub async fn debug(&self, key: &str) -> DiagnosticsReport {
        let compact = match self.inner.compact.peek(key).await {
            Ok(found) => found.map(|entry| (Tier::Compact, entry)),
            Err(e) => {
                warn!("Diagnostics could not read compact store for '{}': {}", key, e);
                None
            }
        };
        let found = match compact {
            Some(found) => Some(found),
            None => match self.inner.blobs.read(key).await {
                Ok(found) => found.map(|entry| (Tier::Blob, entry)),
                Err(e) => {
                    warn!("Diagnostics could not read blob store for '{}': {}", key, e);
                    None
                }
            },
        };

        let Some((tier, entry)) = found else {
            return DiagnosticsReport::not_found(key);
        };

        let now = current_timestamp_ms();
        let metadata = &entry.metadata;
        let validity = evaluate(key, metadata, now, self.inner.oracle.as_ref()).await;

        let mut report = DiagnosticsReport::for_entry(key, tier, metadata, now, validity);
        report.size_bytes = serde_json::to_vec(&entry).map(|b| b.len()).ok();
        match metadata.strategy {
            Strategy::StateBased => {
                report.current_state_version = self.inner.oracle.current_version().await.ok();
            }
            Strategy::ParamBased => report.current_params = extract_params(key),
            Strategy::TimeBased | Strategy::Permanent => {}
        }
        report
    }

    // == Stats ==
    /// Returns activity counters and current entry counts.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.snapshot();
        stats.compact_entries = self.inner.compact.entry_count().await.unwrap_or_else(|e| {
            warn!("Could not count compact entries: {}", e);
            0
        });
        stats.blob_entries = self.inner.blobs.entry_count().await.unwrap_or_else(|e| {
            warn!("Could not count blob entries: {}", e);
            0
        });
        stats
    }

    /// The total limit is checked by the compact store itself, against the
    /// container it loads.
    fn select_tier(&self, size: usize) -> Tier {
        if size > self.inner.options.compact_entry_threshold {
            Tier::Blob
        } else {
            Tier::Compact
        }
    }

    /// Must be called with the write gate held.
    async fn write_blob(&self, key: &str, entry: &StoredEntry) -> Option<Tier> {
        // The compact copy has to go first, it would shadow the new blob.
        if let Err(e) = self.inner.compact.remove(key).await {
            self.backend_error("remove compact copy of", key, &e);
            return None;
        }
        if let Err(e) = self.inner.blobs.write(key, entry).await {
            self.backend_error("write blob for", key, &e);
            return None;
        }
        self.inner.stats.record_blob_write();
        Some(Tier::Blob)
    }

    async fn lookup(&self, key: &str) -> Lookup {
        let Some((tier, entry)) = self.locate(key).await else {
            return Lookup::Absent;
        };

        let now = current_timestamp_ms();
        let validity = evaluate(key, &entry.metadata, now, self.inner.oracle.as_ref()).await;
        if validity.is_valid() {
            Lookup::Hit(tier, entry)
        } else {
            Lookup::Stale(tier, validity)
        }
    }

    /// Compact store first, then blob store. Backend failures count as absent.
    async fn locate(&self, key: &str) -> Option<(Tier, StoredEntry)> {
        match self.inner.compact.read(key).await {
            Ok(Some(entry)) => return Some((Tier::Compact, entry)),
            Ok(None) => {}
            Err(e) => self.backend_error("read compact entry", key, &e),
        }
        match self.inner.blobs.read(key).await {
            Ok(found) => found.map(|entry| (Tier::Blob, entry)),
            Err(e) => {
                self.backend_error("read blob for", key, &e);
                None
            }
        }
    }

    fn decode_hit<T: DeserializeOwned>(
        &self,
        key: &str,
        tier: Tier,
        entry: StoredEntry,
    ) -> Option<T> {
        match serde_json::from_value(entry.data) {
            Ok(value) => {
                self.inner.stats.record_hit();
                debug!("Cache hit for '{}' in {} store", key, tier.as_str());
                Some(value)
            }
            Err(e) => {
                warn!(
                    "Cached payload for '{}' does not match the requested type: {}",
                    key, e
                );
                None
            }
        }
    }

    /// Best-effort removal from both tiers; failures are independent.
    async fn evict(&self, key: &str) {
        if let Err(e) = self.inner.compact.remove(key).await {
            self.backend_error("remove compact entry", key, &e);
        }
        if let Err(e) = self.inner.blobs.remove(key).await {
            self.backend_error("remove blob for", key, &e);
        }
    }

    fn backend_error(&self, action: &str, target: &str, error: &CacheError) {
        self.inner.stats.record_backend_error();
        warn!("Cache backend failed to {} '{}': {}", action, target, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::diagnostics::NO_ENTRY_FOUND;
    use crate::cache::oracle::VersionCounter;
    use crate::storage::{MemoryBlobArea, MemorySlot};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn simulated() -> CacheError {
        CacheError::Io(io::Error::new(io::ErrorKind::Other, "simulated failure"))
    }

    /// Blob area whose operations can be made to fail.
    #[derive(Default)]
    struct FlakyBlobArea {
        inner: MemoryBlobArea,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl BlobArea for FlakyBlobArea {
        async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(simulated());
            }
            self.inner.write(name, bytes).await
        }

        async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(simulated());
            }
            self.inner.read(name).await
        }

        async fn delete(&self, name: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(simulated());
            }
            self.inner.delete(name).await
        }

        async fn list(&self) -> Result<Vec<String>> {
            self.inner.list().await
        }
    }

    /// Slot whose operations can be made to fail.
    #[derive(Default)]
    struct FlakySlot {
        inner: MemorySlot,
        fail: AtomicBool,
    }

    #[async_trait]
    impl SlotStorage for FlakySlot {
        async fn load(&self) -> Result<Option<Value>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(simulated());
            }
            self.inner.load().await
        }

        async fn store(&self, document: &Value) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(simulated());
            }
            self.inner.store(document).await
        }
    }

    struct BrokenOracle;

    #[async_trait]
    impl StateVersionOracle for BrokenOracle {
        async fn current_version(&self) -> Result<u64> {
            Err(CacheError::Oracle("offline".to_string()))
        }
    }

    struct Harness {
        engine: CacheEngine,
        slot: Arc<FlakySlot>,
        area: Arc<FlakyBlobArea>,
        oracle: Arc<VersionCounter>,
    }

    fn harness_with(options: EngineOptions) -> Harness {
        let slot = Arc::new(FlakySlot::default());
        let area = Arc::new(FlakyBlobArea::default());
        let oracle = Arc::new(VersionCounter::new(5));
        let engine = CacheEngine::new(slot.clone(), area.clone(), oracle.clone(), options);
        Harness {
            engine,
            slot,
            area,
            oracle,
        }
    }

    fn harness() -> Harness {
        harness_with(EngineOptions::default())
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Usage {
        used: u64,
        limit: u64,
        label: String,
    }

    fn usage() -> Usage {
        Usage {
            used: 42,
            limit: 100,
            label: "daily".to_string(),
        }
    }

    fn filler(bytes: usize) -> String {
        "x".repeat(bytes)
    }

    #[tokio::test]
    async fn test_roundtrip_small_value_uses_compact() {
        let h = harness();

        let tier = h
            .engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 60_000, None)
            .await;
        assert_eq!(tier, Some(Tier::Compact));
        assert_eq!(h.engine.get::<Usage>("usage:daily").await, Some(usage()));
    }

    #[tokio::test]
    async fn test_roundtrip_large_value_uses_blob() {
        let h = harness();
        let big = filler(150 * 1024);

        let tier = h
            .engine
            .set("usage:history", &big, Strategy::TimeBased, 60_000, None)
            .await;
        assert_eq!(tier, Some(Tier::Blob));
        assert_eq!(h.engine.get::<String>("usage:history").await, Some(big));
    }

    #[tokio::test]
    async fn test_small_value_survives_blob_read_failure() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 60_000, None)
            .await;

        h.area.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(h.engine.get::<Usage>("usage:daily").await, Some(usage()));
    }

    #[tokio::test]
    async fn test_large_value_survives_compact_corruption() {
        let h = harness();
        let big = filler(150 * 1024);
        h.engine
            .set("usage:history", &big, Strategy::TimeBased, 60_000, None)
            .await;

        h.slot.inner.store(&json!("garbage")).await.unwrap();
        assert_eq!(h.engine.get::<String>("usage:history").await, Some(big));
    }

    #[tokio::test]
    async fn test_large_value_survives_compact_failure() {
        let h = harness();
        let big = filler(150 * 1024);
        h.engine
            .set("usage:history", &big, Strategy::TimeBased, 60_000, None)
            .await;

        h.slot.fail.store(true, Ordering::SeqCst);
        assert_eq!(h.engine.get::<String>("usage:history").await, Some(big));
        assert!(h.engine.stats().await.backend_errors >= 1);
    }

    #[tokio::test]
    async fn test_growing_value_migrates_to_blob() {
        let h = harness();
        h.engine
            .set("usage:history", "small", Strategy::TimeBased, 60_000, None)
            .await;
        let big = filler(150 * 1024);
        let tier = h
            .engine
            .set("usage:history", &big, Strategy::TimeBased, 60_000, None)
            .await;

        assert_eq!(tier, Some(Tier::Blob));
        assert!(h.engine.inner.compact.peek("usage:history").await.unwrap().is_none());
        assert_eq!(h.engine.get::<String>("usage:history").await, Some(big));
    }

    #[tokio::test]
    async fn test_shrinking_value_migrates_to_compact() {
        let h = harness();
        let big = filler(150 * 1024);
        h.engine
            .set("usage:history", &big, Strategy::TimeBased, 60_000, None)
            .await;
        let tier = h
            .engine
            .set("usage:history", "small", Strategy::TimeBased, 60_000, None)
            .await;

        assert_eq!(tier, Some(Tier::Compact));
        assert!(h.engine.inner.blobs.read("usage:history").await.unwrap().is_none());
        assert_eq!(
            h.engine.get::<String>("usage:history").await,
            Some("small".to_string())
        );
    }

    #[tokio::test]
    async fn test_time_based_expiry() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 1, None)
            .await;

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.engine.get::<Usage>("usage:daily").await, None);
        let stats = h.engine.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.compact_entries, 0);
    }

    #[tokio::test]
    async fn test_permanent_never_expires() {
        let h = harness();
        h.engine
            .set("profile:org", "acme", Strategy::Permanent, 0, None)
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.oracle.bump();

        assert_eq!(
            h.engine.get::<String>("profile:org").await,
            Some("acme".to_string())
        );
    }

    #[tokio::test]
    async fn test_state_based_invalidated_by_version_change() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::StateBased, 60_000, None)
            .await;
        assert_eq!(h.engine.get::<Usage>("usage:daily").await, Some(usage()));

        h.oracle.bump();
        assert_eq!(h.engine.get::<Usage>("usage:daily").await, None);
        assert!(!h.engine.debug("usage:daily").await.found);
    }

    #[tokio::test]
    async fn test_param_based_keys_are_independent() {
        let h = harness();
        h.engine
            .set(
                "analytics:7d",
                &json!({"total": 7}),
                Strategy::ParamBased,
                60_000,
                Some("7d".to_string()),
            )
            .await;

        assert_eq!(
            h.engine.get::<Value>("analytics:7d").await,
            Some(json!({"total": 7}))
        );
        assert_eq!(h.engine.get::<Value>("analytics:30d").await, None);

        h.engine
            .set(
                "analytics:30d",
                &json!({"total": 30}),
                Strategy::ParamBased,
                60_000,
                None,
            )
            .await;
        assert_eq!(
            h.engine.get::<Value>("analytics:7d").await,
            Some(json!({"total": 7}))
        );
    }

    #[tokio::test]
    async fn test_param_based_defaults_params_from_key() {
        let h = harness();
        h.engine
            .set("analytics:range:30d", &1, Strategy::ParamBased, 60_000, None)
            .await;

        let report = h.engine.debug("analytics:range:30d").await;
        assert_eq!(report.stored_params.as_deref(), Some("30d"));
        assert_eq!(report.current_params.as_deref(), Some("30d"));
        assert!(report.valid);
    }

    #[tokio::test]
    async fn test_param_based_mismatch_is_invalid() {
        let h = harness();
        h.engine
            .set(
                "analytics:7d",
                &1,
                Strategy::ParamBased,
                60_000,
                Some("30d".to_string()),
            )
            .await;

        assert_eq!(h.engine.get::<u32>("analytics:7d").await, None);
    }

    #[tokio::test]
    async fn test_schema_version_bump_wipes_compact_store() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::Permanent, 0, None)
            .await;

        let upgraded = CacheEngine::new(
            h.slot.clone(),
            h.area.clone(),
            h.oracle.clone(),
            EngineOptions {
                schema_version: CACHE_SCHEMA_VERSION + 1,
                ..EngineOptions::default()
            },
        );

        let report = upgraded.debug("usage:daily").await;
        assert!(!report.found);
        assert_eq!(report.message, NO_ENTRY_FOUND);

        assert_eq!(upgraded.get::<Usage>("usage:daily").await, None);
        assert_eq!(
            h.slot.inner.load().await.unwrap(),
            Some(json!({"version": CACHE_SCHEMA_VERSION + 1, "data": {}}))
        );
    }

    #[tokio::test]
    async fn test_injected_mismatched_container() {
        let h = harness();
        h.slot
            .inner
            .store(&json!({
                "version": 999,
                "data": {"usage:daily": {
                    "data": "old",
                    "metadata": {"timestamp": 1, "ttl": 0, "stateVersion": 0, "strategy": "PERMANENT"}
                }}
            }))
            .await
            .unwrap();

        assert!(!h.engine.debug("usage:daily").await.found);
        assert_eq!(h.engine.get::<String>("usage:daily").await, None);
        assert!(!h.engine.debug("usage:daily").await.found);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let h = harness();
        h.engine.remove("usage:missing").await;
        h.engine.remove("usage:missing").await;

        h.engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 60_000, None)
            .await;
        h.engine.remove("usage:daily").await;
        h.engine.remove("usage:daily").await;
        assert_eq!(h.engine.get::<Usage>("usage:daily").await, None);
        assert_eq!(h.engine.stats().await.backend_errors, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_permanent_entries_in_both_tiers() {
        let h = harness();
        h.engine
            .set("profile:org", "acme", Strategy::Permanent, 0, None)
            .await;
        h.engine
            .set("usage:history", &filler(150 * 1024), Strategy::Permanent, 0, None)
            .await;

        h.engine.clear().await;

        assert_eq!(h.engine.get::<String>("profile:org").await, None);
        assert_eq!(h.engine.get::<String>("usage:history").await, None);
        let stats = h.engine.stats().await;
        assert_eq!(stats.compact_entries, 0);
        assert_eq!(stats.blob_entries, 0);
    }

    #[tokio::test]
    async fn test_rejects_malformed_keys_and_zero_ttl() {
        let h = harness();

        assert_eq!(
            h.engine.set("usage", &1, Strategy::TimeBased, 1_000, None).await,
            None
        );
        assert_eq!(
            h.engine.set("a::b", &1, Strategy::TimeBased, 1_000, None).await,
            None
        );
        assert_eq!(
            h.engine.set("usage:daily", &1, Strategy::TimeBased, 0, None).await,
            None
        );
        assert_eq!(h.engine.get::<u32>("usage").await, None);
        assert_eq!(h.engine.stats().await.compact_entries, 0);
    }

    #[tokio::test]
    async fn test_oracle_failure() {
        let engine = CacheEngine::new(
            Arc::new(MemorySlot::new()),
            Arc::new(MemoryBlobArea::new()),
            Arc::new(BrokenOracle),
            EngineOptions::default(),
        );

        assert_eq!(
            engine.set("usage:daily", &1, Strategy::StateBased, 60_000, None).await,
            None
        );
        assert_eq!(
            engine.set("usage:weekly", &2, Strategy::TimeBased, 60_000, None).await,
            Some(Tier::Compact)
        );
        assert_eq!(engine.get::<u32>("usage:weekly").await, Some(2));
    }

    #[tokio::test]
    async fn test_state_based_read_with_failing_oracle_is_miss() {
        let slot = Arc::new(MemorySlot::new());
        let area = Arc::new(MemoryBlobArea::new());
        let writer = CacheEngine::new(
            slot.clone(),
            area.clone(),
            Arc::new(VersionCounter::new(1)),
            EngineOptions::default(),
        );
        writer
            .set("usage:daily", &1, Strategy::StateBased, 60_000, None)
            .await;

        let reader = CacheEngine::new(
            slot,
            area,
            Arc::new(BrokenOracle),
            EngineOptions::default(),
        );
        assert_eq!(reader.get::<u32>("usage:daily").await, None);
    }

    #[tokio::test]
    async fn test_debug_does_not_evict() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 1, None)
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let report = h.engine.debug("usage:daily").await;
        assert!(report.found);
        assert!(!report.valid);
        assert_eq!(report.validity, Some(Validity::Expired));
        assert_eq!(report.tier, Some(Tier::Compact));
        assert_eq!(report.remaining_ttl_ms, Some(0));
        assert_eq!(h.engine.stats().await.compact_entries, 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_evicted() {
        let h = harness();
        h.engine
            .set("usage:daily", "not a number", Strategy::TimeBased, 60_000, None)
            .await;

        assert_eq!(h.engine.get::<u64>("usage:daily").await, None);
        assert!(!h.engine.debug("usage:daily").await.found);
    }

    #[tokio::test]
    async fn test_failed_blob_write_is_skipped() {
        let h = harness();
        h.area.fail_writes.store(true, Ordering::SeqCst);

        let tier = h
            .engine
            .set("usage:history", &filler(150 * 1024), Strategy::TimeBased, 60_000, None)
            .await;
        assert_eq!(tier, None);
        assert_eq!(h.engine.get::<String>("usage:history").await, None);
    }

    #[tokio::test]
    async fn test_total_limit_routes_to_blob() {
        let h = harness_with(EngineOptions {
            compact_total_limit: 2_048,
            ..EngineOptions::default()
        });

        assert_eq!(
            h.engine
                .set("usage:a", &filler(1_000), Strategy::TimeBased, 60_000, None)
                .await,
            Some(Tier::Compact)
        );
        assert_eq!(
            h.engine
                .set("usage:b", &filler(1_500), Strategy::TimeBased, 60_000, None)
                .await,
            Some(Tier::Blob)
        );
        assert_eq!(h.engine.get::<String>("usage:b").await, Some(filler(1_500)));
    }

    #[tokio::test]
    async fn test_total_limit_holds_for_new_engine_over_full_store() {
        let options = EngineOptions {
            compact_total_limit: 2_048,
            ..EngineOptions::default()
        };
        let h = harness_with(options);
        for key in ["usage:a", "usage:b", "usage:c", "usage:d"] {
            h.engine
                .set(key, &filler(350), Strategy::Permanent, 0, None)
                .await;
        }

        let engine = CacheEngine::new(h.slot.clone(), h.area.clone(), h.oracle.clone(), options);
        let tier = engine
            .set("usage:after", &filler(350), Strategy::Permanent, 0, None)
            .await;
        assert_eq!(tier, Some(Tier::Blob));

        let document = h.slot.inner.load().await.unwrap().unwrap();
        assert!(serde_json::to_vec(&document).unwrap().len() <= 2_048);
        assert_eq!(engine.get::<String>("usage:after").await, Some(filler(350)));
    }

    #[tokio::test]
    async fn test_replacing_entry_near_limit_stays_compact() {
        let h = harness_with(EngineOptions {
            compact_total_limit: 1_024,
            ..EngineOptions::default()
        });

        for value in [filler(600), filler(620)] {
            assert_eq!(
                h.engine
                    .set("usage:daily", &value, Strategy::Permanent, 0, None)
                    .await,
                Some(Tier::Compact)
            );
        }
        assert_eq!(h.engine.get::<String>("usage:daily").await, Some(filler(620)));
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let h = harness();
        h.engine
            .set("usage:daily", &usage(), Strategy::TimeBased, 60_000, None)
            .await;
        h.engine.get::<Usage>("usage:daily").await;
        h.engine.get::<Usage>("usage:weekly").await;

        let stats = h.engine.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.compact_writes, 1);
        assert_eq!(stats.compact_entries, 1);
    }

    #[tokio::test]
    async fn test_concurrent_operations() {
        let h = harness();
        let mut handles = Vec::new();

        for i in 0..16u64 {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("usage:{}", i);
                engine.set(&key, &i, Strategy::TimeBased, 60_000, None).await;
                engine.get::<u64>(&key).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(i as u64));
        }
        assert_eq!(h.engine.stats().await.compact_entries, 16);

        let engine = h.engine.clone();
        let clearing = tokio::spawn(async move { engine.clear().await });
        let refreshing = {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .set("usage:fresh", &1u64, Strategy::TimeBased, 60_000, None)
                    .await
            })
        };
        clearing.await.unwrap();
        refreshing.await.unwrap();

        let stats = h.engine.stats().await;
        assert!(stats.compact_entries <= 1);
    }
}
