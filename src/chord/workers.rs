use crate::chord::routing::ChordRouter;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Runs `stabilize` on the worker pool every `period`.
pub async fn run_stabilize_worker(router: Arc<ChordRouter>, period: Duration) {
    info!("Starting stabilize worker");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let task_router = router.clone();
        router.outbox().pool().submit("stabilize", async move {
            task_router.stabilize().await;
        });
    }
}

/// Refreshes one finger per tick; a full pass over the table takes `KEY_BITS` ticks.
pub async fn run_finger_maintainer(router: Arc<ChordRouter>, period: Duration) {
    info!("Starting finger table maintainer");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let task_router = router.clone();
        router.outbox().pool().submit("fix fingers", async move {
            task_router.fix_fingers().await;
        });
    }
}

/// Re-walks the ring for the successor list every `period`.
pub async fn run_successor_maintainer(router: Arc<ChordRouter>, period: Duration) {
    info!("Starting successor list maintainer");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let task_router = router.clone();
        router.outbox().pool().submit("successor list walk", async move {
            task_router.update_successor_list().await;
        });
    }
}
