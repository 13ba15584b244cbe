use crate::chord::key::Key;
use crate::chord::types::NodeInfo;
use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Work deferred until the owner of a key is known.
#[async_trait]
pub trait ChordTask: Send {
    async fn execute(self: Box<Self>, owner: NodeInfo);
}

#[async_trait]
impl<F> ChordTask for F
where
    F: FnOnce(NodeInfo) + Send + 'static,
{
    async fn execute(self: Box<Self>, owner: NodeInfo) {
        (*self)(owner)
    }
}

pub type BoxedTask = Box<dyn ChordTask>;

/// Continuations waiting on lookups, keyed by the key being resolved.
///
/// A key has a queue only while something waits on it. Draining removes the whole queue
/// under the lock, so a task is either part of that drain or lands in a fresh queue whose
/// creator issues a new lookup.
#[derive(Default)]
pub struct PendingLookups {
    queues: Mutex<HashMap<Key, VecDeque<BoxedTask>>>,
}

impl PendingLookups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `task` under `key`. Returns true if the queue was created by this call,
    /// in which case the caller is responsible for issuing the lookup.
    pub async fn enqueue(&self, key: Key, task: BoxedTask) -> bool {
        let mut queues = self.queues.lock().await;
        let created = !queues.contains_key(&key);
        queues.entry(key).or_default().push_back(task);
        created
    }

    /// Runs every task queued under `key` in insertion order. Returns how many ran.
    pub async fn resolve(&self, key: Key, owner: NodeInfo) -> usize {
        let tasks = {
            let mut queues = self.queues.lock().await;
            queues.remove(&key)
        };

        let Some(tasks) = tasks else {
            return 0;
        };

        let count = tasks.len();
        debug!("Resolved key {} to {}, running {} task(s)", key, owner, count);
        for task in tasks {
            task.execute(owner).await;
        }
        count
    }

    pub async fn waiting(&self, key: Key) -> usize {
        self.queues.lock().await.get(&key).map_or(0, VecDeque::len)
    }

    pub async fn pending_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.queues.lock().await.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}
