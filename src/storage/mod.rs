//! Storage Primitives
//!
//! The two host-provided persistence primitives the cache is built on:
//! a single named slot holding one JSON document, and a directory-like
//! area of independent blobs.

mod fs;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use fs::{FileSlot, FsBlobArea};
pub use memory::{MemoryBlobArea, MemorySlot};

// == Slot Storage ==
/// A single named slot holding one JSON document.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    /// Returns the stored document, or `None` if the slot was never written.
    async fn load(&self) -> Result<Option<Value>>;

    /// Replaces the stored document. A host with a size quota may refuse
    /// it with `QuotaExceeded`.
    async fn store(&self, document: &Value) -> Result<()>;
}

// == Blob Area ==
/// A flat area of named blobs, each read and written independently.
#[async_trait]
pub trait BlobArea: Send + Sync {
    /// Writes (or replaces) the blob called `name`.
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Reads a blob. A missing blob is `Ok(None)`, not an error.
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Deletes a blob. Deleting a missing blob succeeds.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Lists the names of all blobs currently present.
    async fn list(&self) -> Result<Vec<String>>;
}
