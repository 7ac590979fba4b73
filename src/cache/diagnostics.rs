//! Diagnostics Report
//!
//! Read-only description of a single entry, for observability.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::engine::Tier;
use crate::cache::entry::{EntryMetadata, Strategy};
use crate::cache::strategy::Validity;

/// Message reported for keys present in neither tier.
pub const NO_ENTRY_FOUND: &str = "no entry found";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub key: String,
    pub found: bool,
    pub tier: Option<Tier>,
    pub strategy: Option<Strategy>,
    /// Write time, RFC 3339
    pub written_at: Option<String>,
    pub age_ms: Option<u64>,
    pub ttl_ms: Option<u64>,
    /// `None` for permanent entries
    pub remaining_ttl_ms: Option<u64>,
    pub stored_state_version: Option<u64>,
    /// Only queried for state-based entries
    pub current_state_version: Option<u64>,
    pub stored_params: Option<String>,
    /// Only derived for param-based entries
    pub current_params: Option<String>,
    /// Serialized entry size
    pub size_bytes: Option<usize>,
    pub validity: Option<Validity>,
    pub valid: bool,
    pub message: String,
}

impl DiagnosticsReport {
    pub fn not_found(key: &str) -> Self {
        Self {
            key: key.to_string(),
            found: false,
            tier: None,
            strategy: None,
            written_at: None,
            age_ms: None,
            ttl_ms: None,
            remaining_ttl_ms: None,
            stored_state_version: None,
            current_state_version: None,
            stored_params: None,
            current_params: None,
            size_bytes: None,
            validity: None,
            valid: false,
            message: NO_ENTRY_FOUND.to_string(),
        }
    }

    pub(crate) fn for_entry(
        key: &str,
        tier: Tier,
        metadata: &EntryMetadata,
        now: u64,
        validity: Validity,
    ) -> Self {
        Self {
            key: key.to_string(),
            found: true,
            tier: Some(tier),
            strategy: Some(metadata.strategy),
            written_at: DateTime::<Utc>::from_timestamp_millis(metadata.timestamp as i64)
                .map(|t| t.to_rfc3339()),
            age_ms: Some(metadata.age_ms(now)),
            ttl_ms: Some(metadata.ttl),
            remaining_ttl_ms: metadata.ttl_remaining_ms(now),
            stored_state_version: Some(metadata.state_version),
            current_state_version: None,
            stored_params: metadata.params.clone(),
            current_params: None,
            size_bytes: None,
            validity: Some(validity),
            valid: validity.is_valid(),
            message: format!("{} entry in {} store", validity.describe(), tier.as_str()),
        }
    }
}
