use crate::chord::finger::FingerTable;
use crate::chord::key::{finger_index_for, finger_start, is_key_between, is_strictly_between, Key};
use crate::chord::tasks::PendingLookups;
use crate::chord::types::{NodeInfo, RingState};
use crate::chord::FINGER_TABLE_SIZE;
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Where a FIND_SUCCESSOR request goes next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hop {
    /// The key lies between us and our successor; the successor owns it.
    Owner(NodeInfo),
    /// Pass the request on to this closer node.
    Forward(NodeInfo),
}

/// Outcome of one step of the successor-list walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkStep {
    Continue(NodeInfo),
    Finished,
}

#[derive(Default)]
struct SuccessorWalk {
    active: bool,
    last: Option<NodeInfo>,
    found: Vec<NodeInfo>,
}

/// Ring state of the local process, shared by every handler and periodic procedure.
pub struct ChordNode {
    pub self_info: NodeInfo,
    state: RwLock<RingState>,
    predecessor: Mutex<Option<NodeInfo>>,
    finger_table: RwLock<FingerTable>,
    successor_list: RwLock<Vec<NodeInfo>>,
    successor_walk: Mutex<SuccessorWalk>,
    successor_list_size: usize,
    next_finger: AtomicUsize,
    pending: PendingLookups,
}

impl ChordNode {
    pub fn new(self_info: NodeInfo, successor_list_size: usize) -> Self {
        Self {
            self_info,
            state: RwLock::new(RingState::Detached),
            predecessor: Mutex::new(None),
            finger_table: RwLock::new(FingerTable::new(self_info)),
            successor_list: RwLock::new(Vec::with_capacity(successor_list_size)),
            successor_walk: Mutex::new(SuccessorWalk::default()),
            successor_list_size,
            next_finger: AtomicUsize::new(0),
            pending: PendingLookups::new(),
        }
    }

    pub fn id(&self) -> Key {
        self.self_info.id
    }

    pub fn pending(&self) -> &PendingLookups {
        &self.pending
    }

    pub async fn state(&self) -> RingState {
        *self.state.read().await
    }

    // ============================================================
    // MEMBERSHIP
    // ============================================================

    /// Originates a new ring with this node as its only member.
    pub async fn create_ring(&self) {
        *self.state.write().await = RingState::Forming;
        self.finger_table.write().await.start();
        *self.predecessor.lock().await = None;
        *self.state.write().await = RingState::Stable;
        info!("Node {} created a new ring", self.self_info);
    }

    pub async fn begin_join(&self) {
        *self.predecessor.lock().await = None;
        *self.state.write().await = RingState::Joining;
    }

    /// Installs the successor resolved by the contact peer.
    pub async fn complete_join(&self, successor: NodeInfo) {
        {
            let mut table = self.finger_table.write().await;
            table.update_finger(0, successor);
            table.fill_empty(successor);
        }
        *self.state.write().await = RingState::Stable;
        info!("Node {} joined the ring, successor is {}", self.self_info, successor);
    }

    // ============================================================
    // NEIGHBOURS
    // ============================================================

    pub async fn successor(&self) -> Option<NodeInfo> {
        self.finger_table.read().await.get_successor()
    }

    pub async fn predecessor(&self) -> Option<NodeInfo> {
        *self.predecessor.lock().await
    }

    /// Handles NOTIFY: adopts `candidate` if we have no predecessor or it sits strictly
    /// between the current predecessor and us. Returns whether it was adopted.
    pub async fn notify(&self, candidate: NodeInfo) -> bool {
        let mut predecessor = self.predecessor.lock().await;
        let adopt = match *predecessor {
            None => true,
            Some(current) => is_strictly_between(candidate.id, current.id, self.self_info.id),
        };
        if adopt {
            *predecessor = Some(candidate);
            info!("Predecessor of {} is now {}", self.self_info, candidate);
        }
        adopt
    }

    /// Applies the successor's reported predecessor and returns the successor to notify.
    pub async fn stabilize(&self, reported: Option<NodeInfo>) -> Option<NodeInfo> {
        let mut table = self.finger_table.write().await;
        let successor = table.get_successor()?;

        match reported {
            Some(candidate) if is_strictly_between(candidate.id, self.self_info.id, successor.id) => {
                table.update_finger(0, candidate);
                info!("Successor of {} is now {}", self.self_info, candidate);
                Some(candidate)
            }
            _ => Some(successor),
        }
    }

    // ============================================================
    // ROUTING
    // ============================================================

    pub async fn fingers(&self) -> Vec<Option<NodeInfo>> {
        self.finger_table.read().await.entries().to_vec()
    }

    /// Decides how to handle a lookup for `key`, or `None` before the ring is joined.
    pub async fn next_hop(&self, key: Key) -> Option<Hop> {
        let table = self.finger_table.read().await;
        let successor = table.get_successor()?;

        if is_key_between(key, self.self_info.id, successor.id, false, true) {
            return Some(Hop::Owner(successor));
        }

        let closest = table.find_closest_preceding_node(key);
        if closest == self.self_info {
            // Nothing closer than us: our successor is the best we can say.
            return Some(Hop::Owner(successor));
        }
        Some(Hop::Forward(closest))
    }

    /// Records a node learned from a SUCCESSOR reply in the finger table.
    ///
    /// Only the node's own distance from us matters: when it is exactly a power of two
    /// the matching slot now points at it. Returns the updated slot, if any.
    pub async fn learn_successor(&self, node: NodeInfo) -> Option<usize> {
        let index = finger_index_for(self.self_info.id, node.id)?;
        self.set_finger(index, node).await;
        Some(index)
    }

    /// Installs the owner resolved for the start of slot `index`.
    pub async fn set_finger(&self, index: usize, node: NodeInfo) {
        self.finger_table.write().await.update_finger(index, node);
        debug!("Finger {} of {} now {}", index, self.self_info, node);
    }

    /// Next finger to refresh, round-robin over the table, with its interval start.
    pub fn advance_finger(&self) -> (usize, Key) {
        let index = self
            .next_finger
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                Some((i + 1) % FINGER_TABLE_SIZE)
            })
            .unwrap_or_default();
        (index, finger_start(self.self_info.id, index))
    }

    // ============================================================
    // SUCCESSOR LIST
    // ============================================================

    pub async fn successor_list(&self) -> Vec<NodeInfo> {
        self.successor_list.read().await.clone()
    }

    /// Starts a new walk, discarding any unfinished one. Returns the node to ask first.
    pub async fn begin_successor_walk(&self) -> Option<NodeInfo> {
        let successor = self.successor().await?;
        let mut walk = self.successor_walk.lock().await;

        if successor == self.self_info {
            *walk = SuccessorWalk::default();
            self.successor_list.write().await.clear();
            return None;
        }

        walk.active = true;
        walk.last = Some(successor);
        walk.found = vec![successor];
        if walk.found.len() >= self.successor_list_size {
            walk.active = false;
            *self.successor_list.write().await = walk.found.clone();
            return None;
        }
        Some(successor)
    }

    /// Handles NODE_SUCCESSOR during a walk.
    pub async fn record_walk_step(&self, answer: NodeInfo) -> WalkStep {
        let mut walk = self.successor_walk.lock().await;
        if !walk.active {
            return WalkStep::Finished;
        }

        let finished = answer == self.self_info
            || walk.last == Some(answer)
            || walk.found.contains(&answer);

        if !finished {
            walk.found.push(answer);
            walk.last = Some(answer);
            if walk.found.len() < self.successor_list_size {
                return WalkStep::Continue(answer);
            }
        }

        walk.active = false;
        let found = walk.found.clone();
        debug!("Successor list of {}: {:?}", self.self_info, found);
        *self.successor_list.write().await = found;
        WalkStep::Finished
    }
}
