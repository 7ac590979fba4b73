//! In-process storage primitives.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{BlobArea, SlotStorage};
use crate::error::Result;

// == Memory Slot ==
/// A slot kept in process memory.
#[derive(Debug, Default)]
pub struct MemorySlot {
    document: RwLock<Option<Value>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStorage for MemorySlot {
    async fn load(&self) -> Result<Option<Value>> {
        Ok(self.document.read().await.clone())
    }

    async fn store(&self, document: &Value) -> Result<()> {
        *self.document.write().await = Some(document.clone());
        Ok(())
    }
}

// == Memory Blob Area ==
/// A blob area kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBlobArea {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobArea {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobArea for MemoryBlobArea {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.blobs.write().await.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }
}
