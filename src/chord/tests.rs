//! Chord Module Tests
//!
//! Covers the ring arithmetic and the local half of the protocol, without any network.
//!
//! ## Test Scopes
//! - **Keys**: hashing onto the ring and interval membership, including wraparound.
//! - **Finger table**: interval lookup and closest preceding node.
//! - **Node state**: notify, stabilize, finger learning and the successor-list walk.
//! - **Pending lookups**: continuation ordering and exactly-once resumption.

#[cfg(test)]
mod tests {
    use crate::chord::finger::FingerTable;
    use crate::chord::key::{
        distance, finger_index_for, finger_start, generate_key, is_key_between, Key,
    };
    use crate::chord::node::{ChordNode, Hop, WalkStep};
    use crate::chord::tasks::PendingLookups;
    use crate::chord::types::{NodeInfo, RingState};
    use crate::chord::{FINGER_TABLE_SIZE, RING_SIZE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn node(id: Key, port: u16) -> NodeInfo {
        NodeInfo::new(id, SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Walks the ring one key at a time from `start` to `end`.
    fn naive_between(key: Key, start: Key, end: Key, start_incl: bool, end_incl: bool) -> bool {
        if key == start && key == end {
            return start_incl || end_incl;
        }
        if key == start {
            return start_incl;
        }
        if key == end {
            return end_incl;
        }
        let mut current = (start + 1) % RING_SIZE;
        while current != end {
            if current == key {
                return true;
            }
            current = (current + 1) % RING_SIZE;
        }
        false
    }

    // ============================================================
    // KEY TESTS
    // ============================================================

    #[test]
    fn test_generate_key_is_deterministic_and_in_range() {
        for i in 0..1000 {
            let input = format!("10.0.0.{}:{}", i % 255, 8000 + i);
            let key = generate_key(input.as_bytes());
            assert_eq!(key, generate_key(input.as_bytes()));
            assert!(key < RING_SIZE, "key {} outside the ring", key);
        }
    }

    #[test]
    fn test_generate_key_spreads_inputs() {
        let keys: std::collections::HashSet<Key> = (0..1000)
            .map(|i| generate_key(format!("file_{}", i).as_bytes()))
            .collect();
        assert!(keys.len() > 950, "only {} distinct keys", keys.len());
    }

    #[test]
    fn test_node_id_hashes_host_and_port() {
        let address: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let info = NodeInfo::from_address(address);
        assert_eq!(info.id, generate_key(b"127.0.0.1:8000"));
        assert_eq!(info.address, address);
    }

    #[test]
    fn test_distance_wraps() {
        assert_eq!(distance(10, 20), 10);
        assert_eq!(distance(RING_SIZE - 5, 5), 10);
        assert_eq!(distance(7, 7), 0);
    }

    #[test]
    fn test_is_key_between_plain_interval() {
        assert!(is_key_between(15, 10, 20, false, false));
        assert!(!is_key_between(10, 10, 20, false, false));
        assert!(is_key_between(10, 10, 20, true, false));
        assert!(!is_key_between(20, 10, 20, true, false));
        assert!(is_key_between(20, 10, 20, false, true));
        assert!(!is_key_between(25, 10, 20, true, true));
    }

    #[test]
    fn test_is_key_between_wraparound() {
        let start = RING_SIZE - 10;
        assert!(is_key_between(RING_SIZE - 1, start, 5, false, false));
        assert!(is_key_between(0, start, 5, false, false));
        assert!(is_key_between(5, start, 5, false, true));
        assert!(!is_key_between(6, start, 5, true, true));
        assert!(!is_key_between(100, start, 5, true, true));
    }

    #[test]
    fn test_is_key_between_equal_bounds_covers_ring() {
        assert!(is_key_between(1, 42, 42, false, false));
        assert!(is_key_between(41, 42, 42, false, false));
        assert!(!is_key_between(42, 42, 42, false, false));
        assert!(is_key_between(42, 42, 42, true, false));
        assert!(is_key_between(42, 42, 42, false, true));
    }

    #[test]
    fn test_is_key_between_matches_ring_walk() {
        let mut rng = StdRng::seed_from_u64(16);
        for _ in 0..300 {
            let start = rng.random_range(0..RING_SIZE);
            // Keep arcs short enough that the naive walk stays cheap.
            let end = (start + rng.random_range(0..2048)) % RING_SIZE;
            let key = match rng.random_range(0..4) {
                0 => start,
                1 => end,
                _ => (start + rng.random_range(0..4096)) % RING_SIZE,
            };

            for (start_incl, end_incl) in [(false, false), (true, false), (false, true), (true, true)] {
                assert_eq!(
                    is_key_between(key, start, end, start_incl, end_incl),
                    naive_between(key, start, end, start_incl, end_incl),
                    "key {} in ({}, {}) incl ({}, {})",
                    key,
                    start,
                    end,
                    start_incl,
                    end_incl
                );
            }
        }
    }

    #[test]
    fn test_finger_index_for_powers_of_two() {
        assert_eq!(finger_index_for(10, 11), Some(0));
        assert_eq!(finger_index_for(10, 10 + 1024), Some(10));
        assert_eq!(finger_index_for(RING_SIZE - 1, 0), Some(0));
        assert_eq!(finger_index_for(10, 13), None);
        assert_eq!(finger_index_for(10, 10), None);
    }

    #[test]
    fn test_finger_start_wraps() {
        assert_eq!(finger_start(0, 0), 1);
        assert_eq!(finger_start(0, 15), 1 << 15);
        assert_eq!(finger_start(RING_SIZE - 1, 0), 0);
    }

    // ============================================================
    // FINGER TABLE TESTS
    // ============================================================

    #[test]
    fn test_get_finger_uses_interval_of_key() {
        let owner = node(0, 8000);
        let mut table = FingerTable::new(owner);
        for i in 0..FINGER_TABLE_SIZE {
            table.update_finger(i, node(1000 + i as Key, 9000 + i as u16));
        }

        // [4, 7] is interval 2
        assert_eq!(table.get_finger(5).map(|n| n.id), Some(1002));
        assert_eq!(table.get_finger(1).map(|n| n.id), Some(1000));
        assert_eq!(table.get_finger(RING_SIZE - 1).map(|n| n.id), Some(1015));
        // The owner's own id is in no interval.
        assert_eq!(table.get_finger(0), None);
    }

    #[test]
    fn test_closest_preceding_node_prefers_highest_finger() {
        let owner = node(0, 8000);
        let mut table = FingerTable::new(owner);
        table.update_finger(0, node(10, 8001));
        table.update_finger(4, node(20, 8002));
        table.update_finger(8, node(300, 8003));

        assert_eq!(table.find_closest_preceding_node(250).id, 20);
        assert_eq!(table.find_closest_preceding_node(1000).id, 300);
        assert_eq!(table.find_closest_preceding_node(5), owner);
        assert_eq!(table.find_closest_preceding_node(10), owner);
    }

    #[test]
    fn test_start_points_every_slot_at_owner() {
        let owner = node(77, 8000);
        let mut table = FingerTable::new(owner);
        assert!(!table.has_successors());

        table.start();
        assert_eq!(table.get_successor(), Some(owner));
        assert!(table.entries().iter().all(|entry| *entry == Some(owner)));
    }

    // ============================================================
    // NODE STATE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_create_ring_owns_every_key() {
        let me = node(100, 8000);
        let chord = ChordNode::new(me, 4);
        assert_eq!(chord.next_hop(5).await, None);

        chord.create_ring().await;
        assert_eq!(chord.state().await, RingState::Stable);
        assert_eq!(chord.predecessor().await, None);
        for key in [0, 99, 100, 101, RING_SIZE - 1] {
            assert_eq!(chord.next_hop(key).await, Some(Hop::Owner(me)));
        }
    }

    #[tokio::test]
    async fn test_next_hop_owner_and_forward() {
        let chord = ChordNode::new(node(100, 8000), 4);
        let successor = node(200, 8001);
        chord.begin_join().await;
        assert_eq!(chord.state().await, RingState::Joining);
        chord.complete_join(successor).await;
        assert_eq!(chord.state().await, RingState::Stable);

        assert_eq!(chord.next_hop(150).await, Some(Hop::Owner(successor)));
        assert_eq!(chord.next_hop(200).await, Some(Hop::Owner(successor)));
        assert_eq!(chord.next_hop(500).await, Some(Hop::Forward(successor)));
        // Our own id belongs to us, so it goes round the ring.
        assert_eq!(chord.next_hop(100).await, Some(Hop::Forward(successor)));
    }

    #[tokio::test]
    async fn test_notify_adopts_closer_predecessor_only() {
        let chord = ChordNode::new(node(100, 8000), 4);
        chord.create_ring().await;

        assert!(chord.notify(node(50, 8001)).await);
        assert!(chord.notify(node(80, 8002)).await);
        assert!(!chord.notify(node(60, 8003)).await);
        assert!(!chord.notify(node(150, 8004)).await);
        assert_eq!(chord.predecessor().await.map(|n| n.id), Some(80));
    }

    #[tokio::test]
    async fn test_notify_across_zero() {
        let chord = ChordNode::new(node(10, 8000), 4);
        chord.create_ring().await;

        assert!(chord.notify(node(RING_SIZE - 100, 8001)).await);
        assert!(chord.notify(node(RING_SIZE - 1, 8002)).await);
        assert!(chord.notify(node(5, 8003)).await);
        assert_eq!(chord.predecessor().await.map(|n| n.id), Some(5));
    }

    #[tokio::test]
    async fn test_stabilize_adopts_node_between_us_and_successor() {
        let chord = ChordNode::new(node(100, 8000), 4);
        assert_eq!(chord.stabilize(None).await, None);

        chord.complete_join(node(200, 8001)).await;
        let between = node(150, 8002);

        assert_eq!(chord.stabilize(Some(between)).await, Some(between));
        assert_eq!(chord.successor().await, Some(between));

        assert_eq!(chord.stabilize(Some(node(300, 8003))).await, Some(between));
        assert_eq!(chord.stabilize(None).await, Some(between));
        assert_eq!(chord.successor().await, Some(between));
    }

    #[tokio::test]
    async fn test_stabilize_on_single_node_ring_takes_newcomer() {
        let me = node(100, 8000);
        let chord = ChordNode::new(me, 4);
        chord.create_ring().await;

        // Our successor is ourselves, so any other node sits between.
        let newcomer = node(40_000, 8001);
        assert_eq!(chord.stabilize(Some(newcomer)).await, Some(newcomer));
        assert_eq!(chord.stabilize(Some(me)).await, Some(newcomer));
    }

    #[tokio::test]
    async fn test_new_node_is_detached() {
        let chord = ChordNode::new(node(100, 8000), 4);
        assert_eq!(chord.state().await, RingState::Detached);
        assert_eq!(chord.successor().await, None);

        chord.create_ring().await;
        assert_eq!(chord.state().await, RingState::Stable);
    }

    #[tokio::test]
    async fn test_learn_successor_uses_node_distance_only() {
        let chord = ChordNode::new(node(100, 8000), 4);

        // key distance 8 would be slot 3, but the node sits 20 away
        assert_eq!(chord.learn_successor(node(120, 8001)).await, None);
        assert!(chord.fingers().await.iter().all(Option::is_none));

        let b = node(104, 8002);
        assert_eq!(chord.learn_successor(b).await, Some(2));
        assert_eq!(chord.fingers().await[2], Some(b));
        assert_eq!(chord.successor().await, None);

        let c = node(101, 8003);
        assert_eq!(chord.learn_successor(c).await, Some(0));
        assert_eq!(chord.successor().await, Some(c));
    }

    #[tokio::test]
    async fn test_set_finger_installs_single_slot() {
        let chord = ChordNode::new(node(100, 8000), 4);
        let owner = node(900, 8001);
        chord.set_finger(5, owner).await;

        let fingers = chord.fingers().await;
        assert_eq!(fingers[5], Some(owner));
        assert_eq!(fingers.iter().filter(|entry| entry.is_some()).count(), 1);
    }

    #[tokio::test]
    async fn test_advance_finger_is_round_robin() {
        let chord = ChordNode::new(node(RING_SIZE - 1, 8000), 4);
        assert_eq!(chord.advance_finger(), (0, 0));
        assert_eq!(chord.advance_finger(), (1, 1));
        for _ in 2..FINGER_TABLE_SIZE {
            chord.advance_finger();
        }
        assert_eq!(chord.advance_finger().0, 0);
    }

    #[tokio::test]
    async fn test_successor_walk_stops_at_capacity() {
        let chord = ChordNode::new(node(100, 8000), 4);
        chord.complete_join(node(200, 8001)).await;

        assert_eq!(chord.begin_successor_walk().await.map(|n| n.id), Some(200));
        assert_eq!(chord.record_walk_step(node(300, 8002)).await, WalkStep::Continue(node(300, 8002)));
        assert_eq!(chord.record_walk_step(node(400, 8003)).await, WalkStep::Continue(node(400, 8003)));
        assert_eq!(chord.record_walk_step(node(500, 8004)).await, WalkStep::Finished);

        let ids: Vec<Key> = chord.successor_list().await.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![200, 300, 400, 500]);

        // Late answers after the walk finished are ignored.
        assert_eq!(chord.record_walk_step(node(600, 8005)).await, WalkStep::Finished);
        assert_eq!(chord.successor_list().await.len(), 4);
    }

    #[tokio::test]
    async fn test_successor_walk_stops_when_ring_closes() {
        let me = node(100, 8000);
        let chord = ChordNode::new(me, 4);
        chord.complete_join(node(200, 8001)).await;

        chord.begin_successor_walk().await;
        assert!(matches!(chord.record_walk_step(node(300, 8002)).await, WalkStep::Continue(_)));
        assert_eq!(chord.record_walk_step(me).await, WalkStep::Finished);

        let ids: Vec<Key> = chord.successor_list().await.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![200, 300]);
    }

    #[tokio::test]
    async fn test_successor_walk_alone_clears_list() {
        let chord = ChordNode::new(node(100, 8000), 4);
        chord.create_ring().await;
        assert_eq!(chord.begin_successor_walk().await, None);
        assert!(chord.successor_list().await.is_empty());
    }

    // ============================================================
    // PENDING LOOKUP TESTS
    // ============================================================

    fn recorder(log: &Arc<Mutex<Vec<(u32, Key)>>>, tag: u32) -> Box<dyn crate::chord::tasks::ChordTask> {
        let log = log.clone();
        Box::new(move |owner: NodeInfo| log.lock().unwrap().push((tag, owner.id)))
    }

    #[tokio::test]
    async fn test_first_enqueue_creates_queue() {
        let pending = PendingLookups::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(pending.enqueue(7, recorder(&log, 1)).await);
        assert!(!pending.enqueue(7, recorder(&log, 2)).await);
        assert!(pending.enqueue(8, recorder(&log, 3)).await);
        assert_eq!(pending.waiting(7).await, 2);
        assert_eq!(pending.pending_keys().await, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_tasks_never_run_before_resolution() {
        let pending = PendingLookups::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        pending.enqueue(7, recorder(&log, 1)).await;
        assert_eq!(pending.resolve(8, node(9, 8000)).await, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_runs_in_order_exactly_once() {
        let pending = PendingLookups::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in 1..=3 {
            pending.enqueue(42, recorder(&log, tag)).await;
        }
        assert_eq!(pending.resolve(42, node(50, 8000)).await, 3);
        assert_eq!(pending.resolve(42, node(50, 8000)).await, 0);

        assert_eq!(*log.lock().unwrap(), vec![(1, 50), (2, 50), (3, 50)]);
        assert_eq!(pending.waiting(42).await, 0);

        // A task added after the drain starts a fresh queue.
        assert!(pending.enqueue(42, recorder(&log, 4)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_enqueue_and_resolve_runs_each_task_once() {
        const TASKS: usize = 200;
        let pending = Arc::new(PendingLookups::new());
        let runs = Arc::new(Mutex::new(vec![0u32; TASKS]));
        let created = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for tag in 0..TASKS {
            let pending_for_enqueue = pending.clone();
            let runs = runs.clone();
            let created = created.clone();
            handles.push(tokio::spawn(async move {
                let task = Box::new(move |_owner: NodeInfo| runs.lock().unwrap()[tag] += 1);
                if pending_for_enqueue.enqueue(7, task).await {
                    created.fetch_add(1, Ordering::SeqCst);
                }
            }));

            if tag % 10 == 0 {
                let pending = pending.clone();
                let drained = drained.clone();
                handles.push(tokio::spawn(async move {
                    if pending.resolve(7, node(9, 8000)).await > 0 {
                        drained.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }
        if pending.resolve(7, node(9, 8000)).await > 0 {
            drained.fetch_add(1, Ordering::SeqCst);
        }

        assert!(runs.lock().unwrap().iter().all(|&count| count == 1));
        assert_eq!(pending.waiting(7).await, 0);
        // Every queue that was created got drained by exactly one resolve.
        assert_eq!(created.load(Ordering::SeqCst), drained.load(Ordering::SeqCst));
    }
}
