use crate::backup::replication::ReplicationCoordinator;
use crate::backup::types::ChunkIdentifier;
use crate::network::messages::MessageBody;
use bytes::Bytes;
use log::{debug, info, warn};
use std::net::SocketAddr;

impl ReplicationCoordinator {
    /// PUT_CHUNK: store, acknowledge to the initiator and pass the remaining degree on to
    /// our successor. The initiator never keeps its own chunk; it only passes it on.
    pub async fn handle_put_chunk(
        &self,
        id: ChunkIdentifier,
        replication_degree: u32,
        initiator: SocketAddr,
        data: Bytes,
    ) {
        if initiator == self.address() {
            debug!("PUT_CHUNK {} reached its initiator, passing it on", id);
            self.forward_put_chunk(id, replication_degree, initiator, data)
                .await;
            return;
        }

        match self.store.put(id.clone(), data.clone()).await {
            Ok(new) => {
                if new {
                    info!("Stored chunk {} for {}", id, initiator);
                }
                self.held_for.lock().await.insert(id.clone(), initiator);
                self.outbox().send(
                    initiator,
                    MessageBody::Stored {
                        file_id: id.file_id.clone(),
                        chunk_number: id.chunk_number,
                        sender: self.address(),
                    },
                );
            }
            Err(e) => {
                warn!("Failed to store chunk {}: {}", id, e);
                return;
            }
        }

        if replication_degree > 1 {
            self.forward_put_chunk(id, replication_degree - 1, initiator, data)
                .await;
        }
    }

    async fn forward_put_chunk(
        &self,
        id: ChunkIdentifier,
        replication_degree: u32,
        initiator: SocketAddr,
        data: Bytes,
    ) {
        let Some(successor) = self.router.node().successor().await else {
            return;
        };
        if successor.address == self.address() {
            debug!("No other peer to pass chunk {} to", id);
            return;
        }

        self.outbox().send(
            successor.address,
            MessageBody::PutChunk {
                file_id: id.file_id,
                chunk_number: id.chunk_number,
                replication_degree,
                initiator,
                data,
            },
        );
    }

    /// STORED: acknowledgments form a set, so repeats are harmless.
    pub async fn handle_stored(&self, id: ChunkIdentifier, sender: SocketAddr) {
        match self.holders.lock().await.get_mut(&id) {
            Some(holders) => {
                if holders.insert(sender) {
                    debug!("Chunk {} now held by {} peer(s)", id, holders.len());
                }
            }
            None => debug!("STORED for untracked chunk {} from {}", id, sender),
        }
    }

    pub async fn handle_removed(&self, id: ChunkIdentifier, sender: SocketAddr) {
        if let Some(holders) = self.holders.lock().await.get_mut(&id) {
            holders.remove(&sender);
        }
    }

    pub async fn handle_delete(&self, file_id: &str) {
        let removed = self.store.remove_file(file_id).await;
        {
            let mut held_for = self.held_for.lock().await;
            held_for.retain(|id, _| id.file_id != file_id);
        }
        if !removed.is_empty() {
            info!("Deleted {} chunk(s) of {}", removed.len(), file_id);
        }
    }

    /// GET_CHUNK: answer if we hold the chunk, otherwise ask our successor, stopping
    /// before the request would come back to the initiator.
    pub async fn handle_get_chunk(&self, id: ChunkIdentifier, initiator: SocketAddr) {
        if let Some(data) = self.store.get(&id).await {
            self.outbox().send(
                initiator,
                MessageBody::Chunk {
                    file_id: id.file_id,
                    chunk_number: id.chunk_number,
                    data,
                },
            );
            return;
        }

        let Some(successor) = self.router.node().successor().await else {
            return;
        };
        if successor.address == initiator || successor.address == self.address() {
            warn!("Chunk {} not found anywhere on the ring", id);
            return;
        }
        self.outbox().send(
            successor.address,
            MessageBody::GetChunk {
                file_id: id.file_id,
                chunk_number: id.chunk_number,
                initiator,
            },
        );
    }

    pub async fn handle_chunk(&self, id: ChunkIdentifier, data: Bytes) {
        debug!("Restored chunk {} ({} bytes)", id, data.len());
        self.restored.lock().await.insert(id, data);
    }
}
