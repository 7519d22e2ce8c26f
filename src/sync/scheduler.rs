// Gossip Scheduler - Fixed-interval exchange rounds
//
// A single background task owns the timer. Each tick runs one round to
// completion before the next tick is taken, so rounds never overlap; ticks
// missed while a round was running are skipped. Shutdown is only observed
// between rounds, which lets an in-flight exchange finish or time out.

use crate::storage::StorageAdapter;
use crate::sync::gossip::{GossipEngine, RoundOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to the running gossip loop
pub struct GossipScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl GossipScheduler {
    /// Start the loop. The first round fires one `interval` from now.
    pub fn spawn<S: StorageAdapter>(engine: Arc<GossipEngine<S>>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(run_loop(engine, interval, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Check if the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop issuing rounds and wait for the loop to exit.
    ///
    /// A round already in progress runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Gossip scheduler task ended abnormally");
        }
    }
}

async fn run_loop<S: StorageAdapter>(
    engine: Arc<GossipEngine<S>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let _ = shutdown_rx.borrow_and_update();

    info!(
        node = %engine.node_name(),
        interval_secs = interval.as_secs(),
        peers = engine.peers().len(),
        "Starting gossip scheduler"
    );

    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!(
                        node = %engine.node_name(),
                        "Shutdown signal received, stopping gossip scheduler"
                    );
                    break;
                }
                continue;
            }

            _ = timer.tick() => {}
        }

        match engine.run_round().await {
            RoundOutcome::Completed { .. } | RoundOutcome::Failed { .. } => {}
            outcome => debug!(node = %engine.node_name(), ?outcome, "Tick produced no exchange"),
        }
    }
}
