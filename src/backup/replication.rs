use crate::backup::store::ChunkStore;
use crate::backup::types::{
    file_id, split_chunks, ChunkIdentifier, FileInformation, FILE_MAX_SIZE, MAX_REPLICATION_DEGREE,
};
use crate::chord::routing::ChordRouter;
use crate::chord::tasks::ChordTask;
use crate::chord::types::NodeInfo;
use crate::error::StorageError;
use crate::network::messages::MessageBody;
use crate::network::transport::Outbox;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Continuation that sends a prepared message to whichever peer owns the key.
pub struct SendToOwner {
    outbox: Outbox,
    body: MessageBody,
}

#[async_trait]
impl ChordTask for SendToOwner {
    async fn execute(self: Box<Self>, owner: NodeInfo) {
        debug!("Sending {} to owner {}", self.body.kind(), owner);
        self.outbox.send(owner.address, self.body);
    }
}

/// Places, restores and deletes chunks through ring lookups, and tracks which peers
/// acknowledged holding each chunk this peer backed up.
pub struct ReplicationCoordinator {
    pub(crate) router: Arc<ChordRouter>,
    pub(crate) store: Arc<dyn ChunkStore>,
    /// Chunks we initiated, mapped to the peers that acknowledged a copy.
    pub(crate) holders: Mutex<HashMap<ChunkIdentifier, HashSet<SocketAddr>>>,
    /// Chunk data waiting for START_PUT_CHUNK.
    pub(crate) staged: Mutex<HashMap<ChunkIdentifier, Bytes>>,
    /// Initiator of every chunk we hold for someone else.
    pub(crate) held_for: Mutex<HashMap<ChunkIdentifier, SocketAddr>>,
    pub(crate) restored: Mutex<HashMap<ChunkIdentifier, Bytes>>,
    files: Mutex<HashMap<String, FileInformation>>,
}

impl ReplicationCoordinator {
    pub fn new(router: Arc<ChordRouter>, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            router,
            store,
            holders: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
            held_for: Mutex::new(HashMap::new()),
            restored: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn outbox(&self) -> &Outbox {
        self.router.outbox()
    }

    pub(crate) fn address(&self) -> SocketAddr {
        self.router.node().self_info.address
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    // ============================================================
    // BACKUP
    // ============================================================

    /// Splits a file into chunks and starts placing each of them.
    pub async fn backup_file(
        &self,
        name: &str,
        contents: &[u8],
        replication_degree: u32,
    ) -> Result<FileInformation, StorageError> {
        if !(1..=MAX_REPLICATION_DEGREE).contains(&replication_degree) {
            return Err(StorageError::InvalidReplicationDegree(replication_degree));
        }
        if contents.len() as u64 > FILE_MAX_SIZE {
            return Err(StorageError::FileTooLarge(contents.len() as u64));
        }

        let file_id = file_id(name, contents);
        let chunks = split_chunks(contents);
        let information = FileInformation {
            file_id: file_id.clone(),
            replication_degree,
            num_chunks: chunks.len() as u32,
        };

        let chunk_file_id = file_id.clone();
        join_all(chunks.into_iter().enumerate().map(move |(number, data)| {
            let id = ChunkIdentifier::new(chunk_file_id.clone(), number as u32);
            self.backup_chunk(id, data, replication_degree)
        }))
        .await;

        info!(
            "Backing up {} as {} ({} chunk(s), degree {})",
            name, file_id, information.num_chunks, replication_degree
        );
        self.files
            .lock()
            .await
            .insert(name.to_string(), information.clone());
        Ok(information)
    }

    /// Stages one chunk and asks ourselves to place it.
    pub async fn backup_chunk(&self, id: ChunkIdentifier, data: Bytes, replication_degree: u32) {
        self.holders.lock().await.entry(id.clone()).or_default();
        self.staged.lock().await.insert(id.clone(), data);

        self.outbox().send(
            self.address(),
            MessageBody::StartPutChunk {
                file_id: id.file_id,
                chunk_number: id.chunk_number,
                replication_degree,
                initiator: self.address(),
            },
        );
    }

    /// Handles START_PUT_CHUNK: resolves the chunk's owner and queues the PUT_CHUNK for it.
    pub async fn start_put_chunk(
        &self,
        id: ChunkIdentifier,
        replication_degree: u32,
        initiator: SocketAddr,
    ) {
        let staged = self.staged.lock().await.get(&id).cloned();
        let data = match staged {
            Some(data) => data,
            None => match self.store.get(&id).await {
                Some(data) => data,
                None => {
                    warn!("No data for chunk {}, cannot start placement", id);
                    return;
                }
            },
        };

        self.holders.lock().await.entry(id.clone()).or_default();

        let key = id.key();
        let task = Box::new(SendToOwner {
            outbox: self.outbox().clone(),
            body: MessageBody::PutChunk {
                file_id: id.file_id.clone(),
                chunk_number: id.chunk_number,
                replication_degree,
                initiator,
                data,
            },
        });
        debug!("Placing chunk {} under key {}", id, key);
        self.router.lookup(key, task).await;
    }

    // ============================================================
    // RESTORE & DELETE
    // ============================================================

    /// Asks the owner of the chunk's key for it; the CHUNK reply lands in `restored_chunk`.
    pub async fn restore_chunk(&self, id: ChunkIdentifier) {
        let key = id.key();
        let task = Box::new(SendToOwner {
            outbox: self.outbox().clone(),
            body: MessageBody::GetChunk {
                file_id: id.file_id,
                chunk_number: id.chunk_number,
                initiator: self.address(),
            },
        });
        self.router.lookup(key, task).await;
    }

    pub async fn restored_chunk(&self, id: &ChunkIdentifier) -> Option<Bytes> {
        self.restored.lock().await.get(id).cloned()
    }

    /// Sends DELETE to every peer that acknowledged a chunk of the file and forgets it.
    /// Returns how many peers were contacted.
    pub async fn delete_file(&self, name: &str) -> Result<usize, StorageError> {
        let information = self
            .files
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| StorageError::ChunkNotFound(format!("{} was not backed up here", name)))?;

        let mut peers = HashSet::new();
        {
            let mut holders = self.holders.lock().await;
            let mut staged = self.staged.lock().await;
            for id in information.chunks() {
                if let Some(set) = holders.remove(&id) {
                    peers.extend(set);
                }
                staged.remove(&id);
            }
        }

        for peer in &peers {
            self.outbox().send(
                *peer,
                MessageBody::Delete {
                    file_id: information.file_id.clone(),
                },
            );
        }
        info!("Deleted {} from {} peer(s)", name, peers.len());
        Ok(peers.len())
    }

    /// Drops a chunk held for someone else and tells its initiator.
    pub async fn reclaim_chunk(&self, id: &ChunkIdentifier) -> bool {
        if !self.store.remove(id).await {
            return false;
        }
        if let Some(initiator) = self.held_for.lock().await.remove(id) {
            self.outbox().send(
                initiator,
                MessageBody::Removed {
                    file_id: id.file_id.clone(),
                    chunk_number: id.chunk_number,
                    sender: self.address(),
                },
            );
        }
        true
    }

    // ============================================================
    // ACKNOWLEDGMENTS
    // ============================================================

    pub async fn replication_count(&self, id: &ChunkIdentifier) -> usize {
        self.holders.lock().await.get(id).map_or(0, HashSet::len)
    }

    pub async fn holders(&self, id: &ChunkIdentifier) -> Vec<SocketAddr> {
        let mut peers: Vec<SocketAddr> = self
            .holders
            .lock()
            .await
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        peers.sort();
        peers
    }

    pub async fn replication_counts(&self) -> Vec<(ChunkIdentifier, usize)> {
        let mut counts: Vec<(ChunkIdentifier, usize)> = self
            .holders
            .lock()
            .await
            .iter()
            .map(|(id, set)| (id.clone(), set.len()))
            .collect();
        counts.sort();
        counts
    }

    pub async fn file(&self, name: &str) -> Option<FileInformation> {
        self.files.lock().await.get(name).cloned()
    }
}
