use crate::backup::types::ChunkIdentifier;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Where this peer keeps chunks it holds on behalf of others.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Stores a chunk. Returns false if it was already held.
    async fn put(&self, id: ChunkIdentifier, data: Bytes) -> Result<bool, StorageError>;

    async fn get(&self, id: &ChunkIdentifier) -> Option<Bytes>;

    async fn remove(&self, id: &ChunkIdentifier) -> bool;

    /// Drops every chunk of `file_id`, returning the removed chunk numbers.
    async fn remove_file(&self, file_id: &str) -> Vec<u32>;

    async fn chunks(&self) -> Vec<ChunkIdentifier>;
}

#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<ChunkIdentifier, Bytes>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put(&self, id: ChunkIdentifier, data: Bytes) -> Result<bool, StorageError> {
        Ok(self.chunks.write().await.insert(id, data).is_none())
    }

    async fn get(&self, id: &ChunkIdentifier) -> Option<Bytes> {
        self.chunks.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &ChunkIdentifier) -> bool {
        self.chunks.write().await.remove(id).is_some()
    }

    async fn remove_file(&self, file_id: &str) -> Vec<u32> {
        let mut chunks = self.chunks.write().await;
        let mut removed: Vec<u32> = chunks
            .keys()
            .filter(|id| id.file_id == file_id)
            .map(|id| id.chunk_number)
            .collect();
        chunks.retain(|id, _| id.file_id != file_id);
        removed.sort_unstable();
        removed
    }

    async fn chunks(&self) -> Vec<ChunkIdentifier> {
        let mut ids: Vec<ChunkIdentifier> = self.chunks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
