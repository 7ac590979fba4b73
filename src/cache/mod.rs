//! Cache Module
//!
//! Two-tier, strategy-driven cache: small entries share one versioned
//! compact container, large ones get a blob each.

mod blob;
mod compact;
mod diagnostics;
mod engine;
mod entry;
mod key;
mod oracle;
mod stats;
mod strategy;


// Re-export public types
pub use blob::{blob_name, BlobStore};
pub use compact::CompactStore;
pub use diagnostics::{DiagnosticsReport, NO_ENTRY_FOUND};
pub use engine::{CacheEngine, EngineOptions, Tier};
pub use entry::{current_timestamp_ms, CacheEntry, EntryMetadata, StoredEntry, Strategy};
pub use key::{extract_params, is_valid_key, KEY_SEPARATOR};
pub use oracle::{StateVersionOracle, VersionCounter};
pub use stats::{CacheStats, StatsRecorder};
pub use strategy::{evaluate, Validity};

// == Public Constants ==
/// Schema version of the compact store container
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Largest serialized entry kept in the compact store, in bytes
pub const COMPACT_ENTRY_THRESHOLD: usize = 100 * 1024; // 100 KB

/// Aggregate ceiling of the compact store, in bytes
pub const COMPACT_TOTAL_LIMIT: usize = 100 * 1024 * 1024; // 100 MB

/// File name of the compact store slot under the cache directory
pub const COMPACT_SLOT_FILE: &str = "compact.json";

/// Directory of the blob store under the cache directory
pub const BLOB_DIR: &str = "blobs";
