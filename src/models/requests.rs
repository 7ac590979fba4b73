//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{is_valid_key, Strategy};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: Namespaced cache key (`namespace:category[:params]`)
/// - `value`: Any JSON value
/// - `strategy`: Validity strategy (default `TIME_BASED`)
/// - `ttl`: Optional TTL in milliseconds (uses default if not specified)
/// - `params`: Optional params snapshot for `PARAM_BASED` entries
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub params: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if !is_valid_key(&self.key) {
            return Some(format!(
                "Key '{}' must look like namespace:category[:params] with no empty segment",
                self.key
            ));
        }
        if self.ttl == Some(0) && self.strategy != Strategy::Permanent {
            return Some("TTL must be positive unless the strategy is PERMANENT".to_string());
        }
        None
    }
}
