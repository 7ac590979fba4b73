//! State Version Oracle
//!
//! The external state version is injected through a single accessor so the
//! engine never depends on how it is computed.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::Result;

/// Source of a monotonically non-decreasing version number for some
/// external system of record.
///
/// Calls must be free of side effects. They may be slow and they may fail.
#[async_trait]
pub trait StateVersionOracle: Send + Sync {
    async fn current_version(&self) -> Result<u64>;
}

// == Version Counter ==
/// An in-process counter oracle.
#[derive(Debug, Default)]
pub struct VersionCounter {
    version: AtomicU64,
}

impl VersionCounter {
    pub fn new(initial: u64) -> Self {
        Self {
            version: AtomicU64::new(initial),
        }
    }

    /// Increments the version and returns the new value.
    pub fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Raises the version to `version`. Lower values are ignored.
    pub fn set(&self, version: u64) -> u64 {
        self.version.fetch_max(version, Ordering::SeqCst).max(version)
    }

    pub fn get(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateVersionOracle for VersionCounter {
    async fn current_version(&self) -> Result<u64> {
        Ok(self.get())
    }
}
