use crate::backup::replication::ReplicationCoordinator;
use crate::backup::store::{ChunkStore, MemoryChunkStore};
use crate::backup::types::{ChunkIdentifier, FileInformation};
use crate::chord::key::Key;
use crate::chord::node::ChordNode;
use crate::chord::routing::ChordRouter;
use crate::chord::types::{NodeInfo, RingState};
use crate::chord::workers::{run_finger_maintainer, run_stabilize_worker, run_successor_maintainer};
use crate::config::PeerConfig;
use crate::error::{ChordError, PeerError};
use crate::network::messages::{Message, MessageBody};
use crate::network::pool::WorkerPool;
use crate::network::server;
use crate::network::transport::{Outbox, TcpTransport, Transport};
use chrono::Utc;
use log::{debug, error, info};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Point-in-time view of a peer, for logs and diagnostics.
#[derive(Debug, Serialize)]
pub struct PeerSnapshot {
    pub taken_at: String,
    pub peer_id: u32,
    pub node: NodeInfo,
    pub state: RingState,
    pub predecessor: Option<NodeInfo>,
    pub successor: Option<NodeInfo>,
    pub fingers: Vec<Option<NodeInfo>>,
    pub successor_list: Vec<NodeInfo>,
    pub pending_lookups: Vec<Key>,
    pub stored_chunks: Vec<ChunkIdentifier>,
    pub replication: Vec<(ChunkIdentifier, usize)>,
}

/// Everything one process needs: identity, ring routing, chunk replication and the
/// worker pool, constructed once and shared by reference.
pub struct ChordPeer {
    config: PeerConfig,
    router: Arc<ChordRouter>,
    replication: Arc<ReplicationCoordinator>,
}

impl ChordPeer {
    pub fn new(
        config: PeerConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ChunkStore>,
    ) -> Arc<Self> {
        let info = NodeInfo::from_address(config.address);
        let pool = WorkerPool::new(config.max_workers, config.max_queued);
        let outbox = Outbox::new(&config, transport, pool);

        let node = Arc::new(ChordNode::new(info, config.successor_list_size));
        let router = Arc::new(ChordRouter::new(node, outbox));
        let replication = Arc::new(ReplicationCoordinator::new(router.clone(), store));

        info!("Peer {} has ring id {}", config.peer_id, info.id);
        Arc::new(Self {
            config,
            router,
            replication,
        })
    }

    /// A peer talking plain TCP and keeping chunks in memory.
    pub fn with_tcp(config: PeerConfig) -> Arc<Self> {
        let transport = Arc::new(TcpTransport::new(config.connect_timeout));
        Self::new(config, transport, Arc::new(MemoryChunkStore::new()))
    }

    pub fn info(&self) -> NodeInfo {
        self.router.node().self_info
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<ChordRouter> {
        &self.router
    }

    pub fn node(&self) -> &Arc<ChordNode> {
        self.router.node()
    }

    pub fn replication(&self) -> &Arc<ReplicationCoordinator> {
        &self.replication
    }

    pub fn pool(&self) -> &WorkerPool {
        self.router.outbox().pool()
    }

    // ============================================================
    // DISPATCH
    // ============================================================

    /// Entry point for raw inbound bytes. Malformed messages are dropped silently.
    pub async fn dispatch(&self, raw: &[u8]) {
        match Message::parse(raw) {
            Ok(message) => self.handle(message).await,
            Err(e) => debug!("Dropping malformed message: {}", e),
        }
    }

    pub async fn handle(&self, message: Message) {
        debug!("Peer {} received {}", self.config.peer_id, message);
        let router = &self.router;
        let replication = &self.replication;

        match message.body {
            MessageBody::FindSuccessor {
                key,
                initiator,
                hops,
            } => router.find_successor(key, initiator, hops).await,
            MessageBody::Successor { key, node } => router.handle_successor(key, node).await,
            MessageBody::GetPredecessor { reply_to } => router.handle_get_predecessor(reply_to).await,
            MessageBody::Predecessor { predecessor } => router.handle_predecessor(predecessor).await,
            MessageBody::Notify { node } => router.handle_notify(node).await,
            MessageBody::GetSuccessor { initiator } => router.handle_get_successor(initiator).await,
            MessageBody::NodeSuccessor { successor } => {
                router.handle_node_successor(successor).await
            }
            MessageBody::PutChunk {
                file_id,
                chunk_number,
                replication_degree,
                initiator,
                data,
            } => {
                let id = ChunkIdentifier::new(file_id, chunk_number);
                replication
                    .handle_put_chunk(id, replication_degree, initiator, data)
                    .await
            }
            MessageBody::Stored {
                file_id,
                chunk_number,
                sender,
            } => {
                replication
                    .handle_stored(ChunkIdentifier::new(file_id, chunk_number), sender)
                    .await
            }
            MessageBody::Delete { file_id } => replication.handle_delete(&file_id).await,
            MessageBody::GetChunk {
                file_id,
                chunk_number,
                initiator,
            } => {
                replication
                    .handle_get_chunk(ChunkIdentifier::new(file_id, chunk_number), initiator)
                    .await
            }
            MessageBody::Chunk {
                file_id,
                chunk_number,
                data,
            } => {
                replication
                    .handle_chunk(ChunkIdentifier::new(file_id, chunk_number), data)
                    .await
            }
            MessageBody::Removed {
                file_id,
                chunk_number,
                sender,
            } => {
                replication
                    .handle_removed(ChunkIdentifier::new(file_id, chunk_number), sender)
                    .await
            }
            MessageBody::StartPutChunk {
                file_id,
                chunk_number,
                replication_degree,
                initiator,
            } => {
                let id = ChunkIdentifier::new(file_id, chunk_number);
                replication
                    .start_put_chunk(id, replication_degree, initiator)
                    .await
            }
        }
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    pub async fn create_network(&self) {
        info!("Creating new Chord network...");
        self.router.create_ring().await;
    }

    pub async fn join(&self, contact: SocketAddr) -> Result<(), PeerError> {
        self.router.join(contact).await?;
        Ok(())
    }

    /// Splits `contents` into chunks and places each at `replication_degree` peers.
    pub async fn backup_file(
        &self,
        name: &str,
        contents: &[u8],
        replication_degree: u32,
    ) -> Result<FileInformation, PeerError> {
        if self.node().state().await != RingState::Stable {
            return Err(ChordError::NotJoined.into());
        }
        let information = self
            .replication
            .backup_file(name, contents, replication_degree)
            .await?;
        Ok(information)
    }

    /// Spawns the periodic stabilize, fix-fingers and successor-list procedures.
    pub fn start_maintenance(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_stabilize_worker(
                self.router.clone(),
                self.config.stabilize_interval,
            )),
            tokio::spawn(run_finger_maintainer(
                self.router.clone(),
                self.config.fix_fingers_interval,
            )),
            tokio::spawn(run_successor_maintainer(
                self.router.clone(),
                self.config.successor_list_interval,
            )),
        ]
    }

    /// Binds the configured address and starts serving inbound messages.
    ///
    /// Must happen before `join`, or the contact's SUCCESSOR reply has nowhere to land.
    pub async fn listen(self: &Arc<Self>) -> Result<JoinHandle<()>, PeerError> {
        let listener = server::bind(self.config.address).await?;
        Ok(self.serve(listener))
    }

    /// Serves inbound messages from an already bound listener.
    pub fn serve(self: &Arc<Self>, listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(server::serve(listener, self.clone()))
    }

    /// Runs maintenance and state reports until Ctrl+C, then stops `server`.
    pub async fn run(self: Arc<Self>, server: JoinHandle<()>) {
        let workers = self.start_maintenance();

        info!("Starting main event loop...");
        let mut report = tokio::time::interval(self.config.report_interval);

        loop {
            tokio::select! {
                _ = report.tick() => {
                    let snapshot = self.snapshot().await;
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => info!("State: {}", json),
                        Err(e) => error!("Failed to render state: {}", e),
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        server.abort();
        for worker in workers {
            worker.abort();
        }
        info!("Node shutdown complete");
    }

    pub async fn snapshot(&self) -> PeerSnapshot {
        let node = self.node();
        PeerSnapshot {
            taken_at: Utc::now().to_rfc3339(),
            peer_id: self.config.peer_id,
            node: node.self_info,
            state: node.state().await,
            predecessor: node.predecessor().await,
            successor: node.successor().await,
            fingers: node.fingers().await,
            successor_list: node.successor_list().await,
            pending_lookups: node.pending().pending_keys().await,
            stored_chunks: self.replication.store().chunks().await,
            replication: self.replication.replication_counts().await,
        }
    }
}
