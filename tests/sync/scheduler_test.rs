// Scheduler Tests
// Timing runs on tokio's paused clock

use async_trait::async_trait;
use relaymesh::storage::MemoryStore;
use relaymesh::sync::{GossipEngine, GossipPayload, GossipScheduler, PeerSelector};
use relaymesh::transport::{GossipTransport, PeerAddress, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(60);

/// Answers every exchange with an empty payload after `delay`
#[derive(Default)]
struct CountingTransport {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    finished: AtomicUsize,
}

impl CountingTransport {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GossipTransport for CountingTransport {
    async fn exchange(
        &self,
        _peer: &PeerAddress,
        _payload: &GossipPayload,
    ) -> Result<GossipPayload, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(GossipPayload::empty("peer"))
    }
}

fn engine(transport: Arc<CountingTransport>) -> Arc<GossipEngine<MemoryStore>> {
    Arc::new(GossipEngine::new(
        "node-a",
        Arc::new(MemoryStore::new()),
        PeerSelector::new(vec![PeerAddress::new("node-b", 5000)], None),
        transport,
    ))
}

#[tokio::test(start_paused = true)]
async fn test_no_round_before_first_interval() {
    let transport = Arc::new(CountingTransport::default());
    let scheduler = GossipScheduler::spawn(engine(transport.clone()), INTERVAL);

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;

    assert_eq!(transport.calls(), 0);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_one_round_per_tick() {
    let transport = Arc::new(CountingTransport::default());
    let engine = engine(transport.clone());
    let scheduler = GossipScheduler::spawn(engine.clone(), INTERVAL);

    tokio::time::sleep(INTERVAL * 5 + INTERVAL / 2).await;

    assert_eq!(transport.calls(), 5);
    assert_eq!(engine.stats().rounds_completed, 5);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_rounds_never_overlap() {
    // Each exchange outlasts two ticks
    let transport = Arc::new(CountingTransport::with_delay(INTERVAL * 2 + INTERVAL / 2));
    let scheduler = GossipScheduler::spawn(engine(transport.clone()), INTERVAL);

    tokio::time::sleep(INTERVAL * 20).await;

    assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);
    let calls = transport.calls();
    assert!(calls >= 2, "expected some rounds, got {calls}");
    assert!(calls < 20, "missed ticks should be skipped, got {calls}");
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_round_finish() {
    let transport = Arc::new(CountingTransport::with_delay(Duration::from_secs(10)));
    let engine = engine(transport.clone());
    let scheduler = GossipScheduler::spawn(engine.clone(), INTERVAL);

    // First tick at 60s, exchange runs until 70s
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(transport.calls(), 1);
    assert!(engine.is_round_in_flight());

    scheduler.shutdown().await;

    assert_eq!(transport.finished.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().rounds_completed, 1);
    assert!(!engine.is_round_in_flight());

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_rounds_do_not_stop_scheduler() {
    struct Failing(AtomicUsize);

    #[async_trait]
    impl GossipTransport for Failing {
        async fn exchange(
            &self,
            _peer: &PeerAddress,
            _payload: &GossipPayload,
        ) -> Result<GossipPayload, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Timeout)
        }
    }

    let transport = Arc::new(Failing(AtomicUsize::new(0)));
    let engine = Arc::new(GossipEngine::new(
        "node-a",
        Arc::new(MemoryStore::new()),
        PeerSelector::new(vec![PeerAddress::new("node-b", 5000)], None),
        transport.clone(),
    ));
    let scheduler = GossipScheduler::spawn(engine.clone(), INTERVAL);

    tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;

    assert_eq!(transport.0.load(Ordering::SeqCst), 3);
    assert_eq!(engine.stats().rounds_failed, 3);
    assert!(!scheduler.is_finished());
    scheduler.shutdown().await;
}
