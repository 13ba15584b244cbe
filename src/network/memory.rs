use crate::error::NetworkError;
use crate::network::messages::Message;
use crate::network::node::ChordPeer;
use crate::network::transport::Transport;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};

/// In-process transport connecting peers of one test ring.
///
/// Sends only queue the bytes; nothing is delivered until `deliver_until_idle` runs,
/// which keeps ring scenarios deterministic and lets a test inspect every message.
pub struct MemoryNetwork {
    peers: RwLock<HashMap<SocketAddr, Weak<ChordPeer>>>,
    tx: UnboundedSender<(SocketAddr, Vec<u8>)>,
    rx: Mutex<UnboundedReceiver<(SocketAddr, Vec<u8>)>>,
    delivered: Mutex<Vec<(SocketAddr, Message)>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = unbounded_channel();
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            tx,
            rx: Mutex::new(rx),
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub async fn register(&self, peer: &Arc<ChordPeer>) {
        self.peers
            .write()
            .await
            .insert(peer.info().address, Arc::downgrade(peer));
    }

    /// Makes `address` unreachable; later sends to it fail.
    pub async fn disconnect(&self, address: SocketAddr) {
        self.peers.write().await.remove(&address);
    }

    /// Delivers queued messages until nothing new arrives for `quiet`.
    /// Returns how many messages were delivered.
    pub async fn deliver_until_idle(&self, quiet: Duration) -> usize {
        let mut rx = self.rx.lock().await;
        let mut count = 0;

        while let Ok(Some((to, bytes))) = tokio::time::timeout(quiet, rx.recv()).await {
            let peer = self.peers.read().await.get(&to).and_then(Weak::upgrade);
            let Some(peer) = peer else {
                debug!("Dropping message for departed peer {}", to);
                continue;
            };

            match Message::parse(&bytes) {
                Ok(message) => self.delivered.lock().await.push((to, message)),
                Err(e) => warn!("Undecodable message to {}: {}", to, e),
            }
            peer.dispatch(&bytes).await;
            count += 1;
        }
        count
    }

    /// Every message delivered so far, with its destination, in delivery order.
    pub async fn delivered(&self) -> Vec<(SocketAddr, Message)> {
        self.delivered.lock().await.clone()
    }

    pub async fn delivered_of(&self, kind: &str) -> Vec<(SocketAddr, Message)> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|(_, message)| message.body.kind() == kind)
            .cloned()
            .collect()
    }

    pub async fn clear_log(&self) {
        self.delivered.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn send(&self, to: SocketAddr, bytes: Vec<u8>) -> Result<(), NetworkError> {
        if !self.peers.read().await.contains_key(&to) {
            return Err(NetworkError::PeerUnreachable(to.to_string()));
        }
        self.tx
            .send((to, bytes))
            .map_err(|_| NetworkError::ConnectionFailed(format!("{}: network closed", to)))
    }
}
