//! Configuration Module
//!
//! Handles loading cache and host configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{
    EngineOptions, CACHE_SCHEMA_VERSION, COMPACT_ENTRY_THRESHOLD, COMPACT_TOTAL_LIMIT,
};

/// Host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the on-disk storage
    pub cache_dir: PathBuf,
    /// Expected schema version of the compact store
    pub schema_version: u32,
    /// Largest serialized entry, in bytes, kept in the compact store
    pub compact_entry_threshold: usize,
    /// Aggregate ceiling, in bytes, of the compact store
    pub compact_total_limit: usize,
    /// TTL in milliseconds used by the admin API when a request omits one
    pub default_ttl_ms: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Storage root (default: `.tiered-cache`)
    /// - `CACHE_SCHEMA_VERSION` - Compact store schema version (default: 1)
    /// - `COMPACT_ENTRY_THRESHOLD` - Per-entry compact budget in bytes (default: 100 KB)
    /// - `COMPACT_TOTAL_LIMIT` - Compact store ceiling in bytes (default: 100 MB)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            schema_version: env_or("CACHE_SCHEMA_VERSION", defaults.schema_version),
            compact_entry_threshold: env_or(
                "COMPACT_ENTRY_THRESHOLD",
                defaults.compact_entry_threshold,
            ),
            compact_total_limit: env_or("COMPACT_TOTAL_LIMIT", defaults.compact_total_limit),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            schema_version: self.schema_version,
            compact_entry_threshold: self.compact_entry_threshold,
            compact_total_limit: self.compact_total_limit,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".tiered-cache"),
            schema_version: CACHE_SCHEMA_VERSION,
            compact_entry_threshold: COMPACT_ENTRY_THRESHOLD,
            compact_total_limit: COMPACT_TOTAL_LIMIT,
            default_ttl_ms: 300_000,
            server_port: 3000,
        }
    }
}
