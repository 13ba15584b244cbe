use crate::chord::key::{finger_start, is_key_between, is_strictly_between, Key};
use crate::chord::types::NodeInfo;
use crate::chord::{FINGER_TABLE_SIZE, RING_SIZE};

/// Routing shortcuts of one node.
///
/// Slot `i` covers the interval `[owner + 2^i, owner + 2^(i+1) - 1]` and slot 0 doubles as
/// the immediate successor. Slots are empty only until the ring has been created or joined.
#[derive(Clone, Debug)]
pub struct FingerTable {
    owner: NodeInfo,
    entries: Vec<Option<NodeInfo>>,
}

impl FingerTable {
    pub fn new(owner: NodeInfo) -> Self {
        Self {
            owner,
            entries: vec![None; FINGER_TABLE_SIZE],
        }
    }

    /// Points every slot at the owner, used when originating a ring.
    pub fn start(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = Some(self.owner);
        }
    }

    pub fn get_successor(&self) -> Option<NodeInfo> {
        self.entries[0]
    }

    pub fn has_successors(&self) -> bool {
        self.entries[0].is_some()
    }

    pub fn entries(&self) -> &[Option<NodeInfo>] {
        &self.entries
    }

    pub fn update_finger(&mut self, index: usize, node: NodeInfo) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = Some(node);
        }
    }

    /// Installs `node` in every slot that is still empty.
    pub fn fill_empty(&mut self, node: NodeInfo) {
        for entry in self.entries.iter_mut().filter(|entry| entry.is_none()) {
            *entry = Some(node);
        }
    }

    /// Returns the finger whose interval contains `key`.
    pub fn get_finger(&self, key: Key) -> Option<NodeInfo> {
        (0..FINGER_TABLE_SIZE)
            .find(|&i| {
                let start = finger_start(self.owner.id, i);
                let end = (start + (1u64 << i) - 1) % RING_SIZE;
                is_key_between(key, start, end, true, true)
            })
            .and_then(|i| self.entries[i])
    }

    /// Highest finger strictly between the owner and `key`, or the owner itself.
    pub fn find_closest_preceding_node(&self, key: Key) -> NodeInfo {
        self.entries
            .iter()
            .rev()
            .flatten()
            .find(|finger| is_strictly_between(finger.id, self.owner.id, key))
            .copied()
            .unwrap_or(self.owner)
    }
}
