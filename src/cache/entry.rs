//! Cache Entry Module
//!
//! Defines the unit of storage: a payload plus the metadata its validity
//! strategy is evaluated against.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Strategy ==
/// Rule used to decide whether a stored entry is still usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Valid while younger than its TTL
    #[default]
    TimeBased,
    /// Valid while younger than its TTL and the external state is unchanged
    StateBased,
    /// Valid until explicitly removed
    Permanent,
    /// Valid while younger than its TTL and the key's params are unchanged
    ParamBased,
}

// == Entry Metadata ==
/// Metadata recorded once, when the entry is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Write time (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds; 0 only for permanent entries
    pub ttl: u64,
    /// State version observed at write time
    pub state_version: u64,
    pub strategy: Strategy,
    /// Key params observed at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl EntryMetadata {
    // == Age ==
    /// Milliseconds elapsed since the entry was written.
    ///
    /// A timestamp in the future (clock moved backwards) counts as age 0.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    // == Is Fresh ==
    /// Returns true while `now - timestamp < ttl`.
    ///
    /// Permanent entries are always fresh.
    pub fn is_fresh(&self, now: u64) -> bool {
        self.strategy == Strategy::Permanent || self.age_ms(now) < self.ttl
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None for permanent entries.
    ///
    /// # Returns
    /// - `Some(0)` if the TTL has elapsed
    /// - `Some(remaining_ms)` if it hasn't
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        if self.strategy == Strategy::Permanent {
            return None;
        }
        Some(self.ttl.saturating_sub(self.age_ms(now)))
    }
}

// == Cache Entry ==
/// A payload together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub metadata: EntryMetadata,
}

/// Entry as persisted by the storage tiers, with the payload kept as JSON.
pub type StoredEntry = CacheEntry<Value>;

impl<T> CacheEntry<T> {
    pub fn new(data: T, metadata: EntryMetadata) -> Self {
        Self { data, metadata }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
