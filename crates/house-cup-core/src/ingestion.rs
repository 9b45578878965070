//! Start/stop control of the background ingestion worker.
//!
//! At most one worker runs at a time. The worker pulls raw events from the
//! configured [`EventProducer`], validates and stores each one, and after
//! every successful insert asks the [`BroadcastHub`] to publish fresh
//! totals. Bad events are logged and skipped; they never end the worker.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start--> Running --stop------------> Idle
//!                    |
//!                    +--producer exhausted--> Idle
//! ```
//!
//! [`IngestionController::start`] and [`IngestionController::stop`] are
//! synchronous and idempotent. Stopping cancels the worker's token; the
//! worker notices before its next pull or insert, so at most the event it
//! is currently storing lands after `stop` returns. Handles of cancelled
//! workers are kept so [`IngestionController::shutdown`] can wait for
//! them.

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use house_cup_db::{EventStore, StoreError};
use house_cup_types::{IngestionStatus, RawEvent, ScoredEvent, WorkerId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::BroadcastHub;
use crate::producer::EventProducer;

/// Why a worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The producer stream ended.
    Exhausted,
    /// The worker was cancelled by `stop` or `shutdown`.
    Stopped,
}

/// Counters a worker reports when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    /// The worker these counters belong to.
    pub worker_id: WorkerId,
    /// Raw events taken from the producer.
    pub pulled: u64,
    /// Events stored.
    pub inserted: u64,
    /// Events skipped because their id was already stored.
    pub duplicates: u64,
    /// Events skipped because they failed validation.
    pub rejected: u64,
    /// Events skipped because the store failed.
    pub failed: u64,
    /// How the worker ended.
    pub exit: WorkerExit,
}

impl WorkerReport {
    const fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            pulled: 0,
            inserted: 0,
            duplicates: 0,
            rejected: 0,
            failed: 0,
            exit: WorkerExit::Exhausted,
        }
    }
}

struct ActiveWorker {
    id: WorkerId,
    cancel: CancellationToken,
    handle: JoinHandle<WorkerReport>,
}

enum IngestionState {
    Idle,
    Running(ActiveWorker),
}

struct Shared {
    store: Arc<dyn EventStore>,
    hub: Arc<BroadcastHub>,
    producer: Arc<dyn EventProducer>,
    state: Mutex<IngestionState>,
    stopping: Mutex<Vec<JoinHandle<WorkerReport>>>,
}

impl Shared {
    /// Clear the worker slot, but only if `id` still owns it.
    fn retire(&self, id: WorkerId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&*state, IngestionState::Running(active) if active.id == id) {
            *state = IngestionState::Idle;
            debug!(worker = %id, "Worker slot released");
        }
    }
}

/// Owns the ingestion worker slot.
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct IngestionController {
    shared: Arc<Shared>,
}

impl IngestionController {
    /// Create an idle controller.
    pub fn new(
        store: Arc<dyn EventStore>,
        hub: Arc<BroadcastHub>,
        producer: Arc<dyn EventProducer>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                hub,
                producer,
                state: Mutex::new(IngestionState::Idle),
                stopping: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Launch a worker unless one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> IngestionStatus {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let IngestionState::Running(active) = &*state {
            debug!(worker = %active.id, "Start requested while running");
            return IngestionStatus { active: true };
        }

        let id = WorkerId::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.shared),
            id,
            cancel.clone(),
        ));
        *state = IngestionState::Running(ActiveWorker { id, cancel, handle });

        info!(worker = %id, "Ingestion started");
        IngestionStatus { active: true }
    }

    /// Cancel the running worker, if any.
    pub fn stop(&self) -> IngestionStatus {
        let previous = {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, IngestionState::Idle)
        };

        match previous {
            IngestionState::Running(active) => {
                active.cancel.cancel();
                let mut stopping = self
                    .shared
                    .stopping
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                stopping.retain(|h| !h.is_finished());
                stopping.push(active.handle);
                info!(worker = %active.id, "Ingestion stopped");
            }
            IngestionState::Idle => debug!("Stop requested while idle"),
        }

        IngestionStatus { active: false }
    }

    /// Whether a worker currently holds the slot.
    pub fn status(&self) -> IngestionStatus {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        IngestionStatus {
            active: matches!(&*state, IngestionState::Running(_)),
        }
    }

    /// Stop ingestion and wait for every worker this controller launched.
    ///
    /// Returns the reports of workers that had not yet been collected.
    pub async fn shutdown(&self) -> Vec<WorkerReport> {
        self.stop();

        let handles = std::mem::take(
            &mut *self
                .shared
                .stopping
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Ingestion worker panicked"),
            }
        }
        reports
    }
}

async fn run_worker(shared: Arc<Shared>, id: WorkerId, cancel: CancellationToken) -> WorkerReport {
    let mut report = WorkerReport::new(id);
    let mut events = shared.producer.open();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            next = events.next() => next,
        };
        if cancel.is_cancelled() {
            report.exit = WorkerExit::Stopped;
            break;
        }
        let Some(raw) = next else {
            report.exit = WorkerExit::Exhausted;
            break;
        };

        report.pulled = report.pulled.saturating_add(1);
        ingest_one(&shared, raw, &mut report).await;
    }

    shared.retire(id);
    info!(
        worker = %id,
        pulled = report.pulled,
        inserted = report.inserted,
        duplicates = report.duplicates,
        rejected = report.rejected,
        failed = report.failed,
        exit = ?report.exit,
        "Ingestion worker finished"
    );
    report
}

async fn ingest_one(shared: &Shared, raw: RawEvent, report: &mut WorkerReport) {
    let raw_id = raw.id.clone();
    let event = match ScoredEvent::try_from(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(event_id = %raw_id, error = %e, "Skipping invalid event");
            report.rejected = report.rejected.saturating_add(1);
            return;
        }
    };

    match shared.store.insert(&event).await {
        Ok(()) => {
            report.inserted = report.inserted.saturating_add(1);
            if let Err(e) = shared.hub.publish_latest().await {
                error!(event_id = %event.id, error = %e, "Failed to publish leaderboard");
            }
        }
        Err(StoreError::DuplicateKey(id)) => {
            warn!(event_id = %id, "Skipping duplicate event");
            report.duplicates = report.duplicates.saturating_add(1);
        }
        Err(StoreError::Validation(e)) => {
            warn!(event_id = %event.id, error = %e, "Store rejected event");
            report.rejected = report.rejected.saturating_add(1);
        }
        Err(e) => {
            error!(event_id = %event.id, error = %e, "Failed to store event");
            report.failed = report.failed.saturating_add(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::stream::{self, BoxStream};
    use house_cup_db::MemoryEventStore;
    use house_cup_types::{FeedMessage, House};

    use super::*;
    use crate::aggregator::Aggregator;
    use crate::hub::ChannelSubscriber;
    use crate::producer::{ChannelProducer, StaticProducer};

    fn raw(id: &str, category: &str, points: i64) -> RawEvent {
        RawEvent {
            id: id.to_owned(),
            category: category.to_owned(),
            points: serde_json::Number::from(points),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// A producer that never ends and counts how often it was opened.
    #[derive(Default)]
    struct EndlessProducer {
        opens: AtomicUsize,
    }

    impl EventProducer for EndlessProducer {
        fn open(&self) -> BoxStream<'static, RawEvent> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            stream::pending().boxed()
        }
    }

    fn controller_with(
        producer: Arc<dyn EventProducer>,
    ) -> (IngestionController, Arc<MemoryEventStore>, Arc<BroadcastHub>) {
        let store = Arc::new(MemoryEventStore::new());
        let dyn_store: Arc<dyn EventStore> = Arc::clone(&store) as Arc<dyn EventStore>;
        let hub = Arc::new(BroadcastHub::new(Aggregator::new(Arc::clone(&dyn_store))));
        let controller = IngestionController::new(dyn_store, Arc::clone(&hub), producer);
        (controller, store, hub)
    }

    async fn wait_until_idle(controller: &IngestionController) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.status().active {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn starting_twice_runs_one_worker() {
        let producer = Arc::new(EndlessProducer::default());
        let (controller, _store, _hub) =
            controller_with(Arc::clone(&producer) as Arc<dyn EventProducer>);

        assert!(controller.start().active);
        assert!(controller.start().active);
        tokio::task::yield_now().await;

        let reports = controller.shutdown().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(producer.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_then_status_is_inactive() {
        let (controller, _store, _hub) = controller_with(Arc::new(EndlessProducer::default()));

        assert!(!controller.status().active);
        controller.start();
        assert!(controller.status().active);

        assert!(!controller.stop().active);
        assert!(!controller.status().active);

        // Idempotent.
        assert!(!controller.stop().active);
    }

    #[tokio::test]
    async fn stopped_worker_reports_stopped() {
        let (controller, _store, _hub) = controller_with(Arc::new(EndlessProducer::default()));
        controller.start();
        let reports = controller.shutdown().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].exit, WorkerExit::Stopped);
    }

    #[tokio::test]
    async fn exhausted_producer_returns_to_idle() {
        let producer = StaticProducer::new(vec![raw("1", "Gryff", 10), raw("2", "Slyth", 5)]);
        let (controller, store, _hub) = controller_with(Arc::new(producer));

        controller.start();
        wait_until_idle(&controller).await;

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(controller.shutdown().await.is_empty());
    }

    #[tokio::test]
    async fn bad_events_are_skipped_and_good_ones_broadcast() {
        let mut bad_points = raw("frac", "Raven", 0);
        bad_points.points = serde_json::Number::from_f64(1.5).unwrap();
        let mut bad_time = raw("when", "Raven", 3);
        bad_time.timestamp = "yesterday".to_owned();

        let producer = StaticProducer::new(vec![
            raw("1", "Gryff", 10),
            raw("2", "Dragons", 4),
            bad_points,
            bad_time,
            raw("", "Huff", 2),
            raw("1", "Gryff", 10),
            raw("3", "Slyth", 5),
        ]);
        let (controller, store, hub) = controller_with(Arc::new(producer));

        let (subscriber, mut rx) = ChannelSubscriber::channel(32);
        hub.on_connect(Arc::new(subscriber)).await.unwrap();
        let _connect = rx.recv().await.unwrap();

        controller.start();
        wait_until_idle(&controller).await;

        assert_eq!(store.count().await.unwrap(), 2);

        let mut updates = Vec::new();
        while let Ok(message) = rx.try_recv() {
            updates.push(message);
        }
        assert_eq!(updates.len(), 2, "one update per stored event");

        let FeedMessage::LeaderboardUpdate(last) = updates.pop().unwrap();
        assert_eq!(last.all.get(House::Gryff), 10);
        assert_eq!(last.all.get(House::Slyth), 5);
        assert_eq!(last.all.get(House::Raven), 0);
        assert_eq!(last.all.get(House::Huff), 0);
    }

    #[tokio::test]
    async fn stale_worker_exit_does_not_clear_new_worker() {
        let (producer, tx) = ChannelProducer::new(8);
        let (controller, store, _hub) = controller_with(Arc::new(producer));

        controller.start();
        controller.stop();
        controller.start();
        let current = match &*controller.shared.state.lock().unwrap() {
            IngestionState::Running(active) => active.id,
            IngestionState::Idle => panic!("expected a running worker"),
        };

        // A late retire from some other worker id must not free the slot.
        controller.shared.retire(WorkerId::new());
        assert!(controller.status().active);

        tx.send(raw("x", "Huff", 1)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.count().await.unwrap() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(controller.status().active);

        let reports = controller.shutdown().await;
        assert!(reports.iter().any(|r| r.worker_id == current && r.inserted == 1));
    }

    #[tokio::test]
    async fn restart_after_exhaustion_opens_a_new_stream() {
        let producer = StaticProducer::new(vec![raw("1", "Gryff", 1)]);
        let (controller, store, _hub) = controller_with(Arc::new(producer));

        controller.start();
        wait_until_idle(&controller).await;
        controller.start();
        wait_until_idle(&controller).await;

        // The replayed event is a duplicate the second time round.
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
