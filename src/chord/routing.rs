use crate::chord::key::Key;
use crate::chord::node::{ChordNode, Hop, WalkStep};
use crate::chord::tasks::{BoxedTask, ChordTask};
use crate::chord::types::{NodeInfo, RingState};
use crate::chord::MAX_LOOKUP_HOPS;
use crate::error::ChordError;
use crate::network::messages::MessageBody;
use crate::network::transport::Outbox;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Drives the ring protocol: answers and forwards lookups, runs the join, stabilize,
/// fix-fingers and successor-list procedures, and resumes continuations on replies.
pub struct ChordRouter {
    node: Arc<ChordNode>,
    outbox: Outbox,
    contact: Mutex<Option<SocketAddr>>,
}

/// Continuation installing the successor found for our own id while joining.
struct JoinTask {
    node: Arc<ChordNode>,
}

#[async_trait]
impl ChordTask for JoinTask {
    async fn execute(self: Box<Self>, owner: NodeInfo) {
        if owner == self.node.self_info {
            warn!("Contact resolved {} as its own successor", owner);
        }
        self.node.complete_join(owner).await;
    }
}

/// Continuation installing the owner of a finger interval start at its slot.
struct FingerTask {
    node: Arc<ChordNode>,
    index: usize,
}

#[async_trait]
impl ChordTask for FingerTask {
    async fn execute(self: Box<Self>, owner: NodeInfo) {
        self.node.set_finger(self.index, owner).await;
    }
}

impl ChordRouter {
    pub fn new(node: Arc<ChordNode>, outbox: Outbox) -> Self {
        Self {
            node,
            outbox,
            contact: Mutex::new(None),
        }
    }

    pub fn node(&self) -> &Arc<ChordNode> {
        &self.node
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    fn address(&self) -> SocketAddr {
        self.node.self_info.address
    }

    // ============================================================
    // LOOKUPS
    // ============================================================

    /// Resolves the owner of `key` and runs `task` with it once known.
    ///
    /// Only the first waiter on a key issues the FIND_SUCCESSOR; later ones ride along.
    pub async fn lookup(&self, key: Key, task: BoxedTask) {
        if self.node.pending().enqueue(key, task).await {
            self.find_successor(key, self.address(), 0).await;
        } else {
            debug!("Lookup for key {} already in flight", key);
        }
    }

    /// Handles FIND_SUCCESSOR: replies straight to the initiator if our successor owns
    /// `key`, otherwise forwards to the closest preceding finger.
    pub async fn find_successor(&self, key: Key, initiator: SocketAddr, hops: u32) {
        if hops > MAX_LOOKUP_HOPS {
            warn!("Dropping lookup for key {} from {} after {} hops", key, initiator, hops);
            return;
        }

        match self.node.next_hop(key).await {
            Some(Hop::Owner(owner)) => {
                self.outbox
                    .send(initiator, MessageBody::Successor { key, node: owner });
            }
            Some(Hop::Forward(next)) => {
                debug!("Forwarding lookup for key {} to {}", key, next);
                self.outbox.send(
                    next.address,
                    MessageBody::FindSuccessor {
                        key,
                        initiator,
                        hops: hops + 1,
                    },
                );
            }
            None => debug!("Not in a ring yet, dropping lookup for key {}", key),
        }
    }

    /// Handles SUCCESSOR: refreshes fingers, then resumes everything waiting on `key`.
    pub async fn handle_successor(&self, key: Key, owner: NodeInfo) {
        self.node.learn_successor(owner).await;
        self.node.pending().resolve(key, owner).await;
    }

    // ============================================================
    // MEMBERSHIP
    // ============================================================

    pub async fn create_ring(&self) {
        self.node.create_ring().await;
    }

    /// Asks `contact` for the successor of our own id. The node becomes stable once the
    /// SUCCESSOR reply comes back.
    pub async fn join(&self, contact: SocketAddr) -> Result<(), ChordError> {
        if contact == self.address() {
            return Err(ChordError::JoinFailed(format!(
                "cannot join through our own address {}",
                contact
            )));
        }

        self.node.begin_join().await;
        *self.contact.lock().await = Some(contact);

        let task = Box::new(JoinTask {
            node: self.node.clone(),
        });
        self.node.pending().enqueue(self.node.id(), task).await;
        self.send_join_lookup(contact);

        info!("Node {} joining through {}", self.node.self_info, contact);
        Ok(())
    }

    fn send_join_lookup(&self, contact: SocketAddr) {
        self.outbox.send(
            contact,
            MessageBody::FindSuccessor {
                key: self.node.id(),
                initiator: self.address(),
                hops: 0,
            },
        );
    }

    // ============================================================
    // STABILIZATION
    // ============================================================

    /// Periodic stabilize: asks the successor for its predecessor. While still joining,
    /// re-sends the join lookup instead, in case the first one was lost.
    pub async fn stabilize(&self) {
        match self.node.state().await {
            RingState::Stable => {}
            RingState::Joining => {
                if let Some(contact) = *self.contact.lock().await {
                    debug!("Still joining, asking {} again", contact);
                    self.send_join_lookup(contact);
                }
                return;
            }
            RingState::Detached | RingState::Forming => return,
        }

        if let Some(successor) = self.node.successor().await {
            self.outbox.send(
                successor.address,
                MessageBody::GetPredecessor {
                    reply_to: self.address(),
                },
            );
        }
    }

    pub async fn handle_get_predecessor(&self, reply_to: SocketAddr) {
        let predecessor = self.node.predecessor().await;
        self.outbox
            .send(reply_to, MessageBody::Predecessor { predecessor });
    }

    /// Second half of stabilize: maybe adopt the reported node, then notify the successor.
    pub async fn handle_predecessor(&self, reported: Option<NodeInfo>) {
        if let Some(successor) = self.node.stabilize(reported).await {
            self.outbox.send(
                successor.address,
                MessageBody::Notify {
                    node: self.node.self_info,
                },
            );
        }
    }

    pub async fn handle_notify(&self, candidate: NodeInfo) {
        if !self.node.notify(candidate).await {
            debug!("Ignoring notify from {}", candidate);
        }
    }

    // ============================================================
    // FINGERS & SUCCESSOR LIST
    // ============================================================

    /// Refreshes one finger per call, round-robin: looks up the owner of the slot's
    /// interval start and installs it there.
    pub async fn fix_fingers(&self) {
        if self.node.state().await != RingState::Stable {
            return;
        }
        let (index, start) = self.node.advance_finger();
        debug!("Fixing finger {} (start {})", index, start);

        let task = Box::new(FingerTask {
            node: self.node.clone(),
            index,
        });
        self.lookup(start, task).await;
    }

    pub async fn update_successor_list(&self) {
        if self.node.state().await != RingState::Stable {
            return;
        }
        if let Some(first) = self.node.begin_successor_walk().await {
            self.outbox.send(
                first.address,
                MessageBody::GetSuccessor {
                    initiator: self.address(),
                },
            );
        }
    }

    pub async fn handle_get_successor(&self, initiator: SocketAddr) {
        if let Some(successor) = self.node.successor().await {
            self.outbox
                .send(initiator, MessageBody::NodeSuccessor { successor });
        }
    }

    pub async fn handle_node_successor(&self, successor: NodeInfo) {
        if let WalkStep::Continue(next) = self.node.record_walk_step(successor).await {
            self.outbox.send(
                next.address,
                MessageBody::GetSuccessor {
                    initiator: self.address(),
                },
            );
        }
    }
}
