//! Publish/subscribe fan-out of leaderboard snapshots.
//!
//! The [`BroadcastHub`] owns the set of connected [`Subscriber`]s. It
//! knows nothing about transports: a subscriber is anything that can take
//! a [`FeedMessage`] without blocking. The observer wraps each WebSocket
//! in a [`ChannelSubscriber`]; tests use the same type directly.
//!
//! # Ordering
//!
//! Snapshot computation and delivery happen under a single publish lock.
//! A subscriber that connects therefore never receives an older snapshot
//! after its connect snapshot, and successive publishes reach every
//! subscriber in the order they were computed.
//!
//! # Delivery
//!
//! Delivery is best-effort and never waits. A subscriber whose buffer is
//! full misses that message and catches up on the next one; a subscriber
//! whose receiver is gone is dropped from the set. Neither case is
//! reported to the caller as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use house_cup_db::StoreError;
use house_cup_types::{FeedMessage, LeaderboardSnapshot, SubscriberId};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, warn};

use crate::aggregator::Aggregator;

/// Why a message could not be handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's buffer is full; this message was dropped.
    #[error("subscriber {0} is lagging, message dropped")]
    Lagging(SubscriberId),

    /// The subscriber has gone away.
    #[error("subscriber {0} is disconnected")]
    Disconnected(SubscriberId),
}

/// A connected observer of the live feed.
pub trait Subscriber: Send + Sync {
    /// Stable identity used for membership.
    fn id(&self) -> SubscriberId;

    /// Hand over a message without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the message could not be queued.
    fn deliver(&self, message: &FeedMessage) -> Result<(), DeliveryError>;
}

/// A [`Subscriber`] backed by a bounded [`mpsc`] channel.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    id: SubscriberId,
    tx: mpsc::Sender<FeedMessage>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiver its messages arrive on.
    ///
    /// `buffer` is clamped to at least one message.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<FeedMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                id: SubscriberId::new(),
                tx,
            },
            rx,
        )
    }
}

impl Subscriber for ChannelSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn deliver(&self, message: &FeedMessage) -> Result<(), DeliveryError> {
        self.tx.try_send(message.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging(self.id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected(self.id),
        })
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the message.
    pub delivered: usize,
    /// Subscribers that were lagging and missed it.
    pub dropped: usize,
    /// Subscribers found disconnected and removed.
    pub pruned: usize,
}

/// Fan-out of leaderboard snapshots to every connected subscriber.
pub struct BroadcastHub {
    aggregator: Aggregator,
    subscribers: RwLock<BTreeMap<SubscriberId, Arc<dyn Subscriber>>>,
    publish_lock: Mutex<()>,
}

impl BroadcastHub {
    /// Create a hub with no subscribers.
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            subscribers: RwLock::new(BTreeMap::new()),
            publish_lock: Mutex::new(()),
        }
    }

    /// The aggregator snapshots are computed with.
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Number of connected subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Send `snapshot` to every connected subscriber.
    pub async fn publish(&self, snapshot: &LeaderboardSnapshot) -> PublishReport {
        let _order = self.publish_lock.lock().await;
        self.fan_out(snapshot).await
    }

    /// Compute a fresh snapshot and send it to every subscriber.
    ///
    /// Computation and delivery share the publish lock, so no subscriber
    /// sees this snapshot after a newer one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot could not be computed;
    /// nothing is sent in that case.
    pub async fn publish_latest(&self) -> Result<PublishReport, StoreError> {
        let _order = self.publish_lock.lock().await;
        let snapshot = self.aggregator.snapshot().await?;
        Ok(self.fan_out(&snapshot).await)
    }

    /// Register `subscriber` and send it a fresh snapshot.
    ///
    /// The subscriber stays registered even if the snapshot cannot be
    /// computed; it will get the next published one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connect snapshot could not be
    /// computed.
    pub async fn on_connect(&self, subscriber: Arc<dyn Subscriber>) -> Result<(), StoreError> {
        let _order = self.publish_lock.lock().await;

        let id = subscriber.id();
        let count = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(id, Arc::clone(&subscriber));
            subscribers.len()
        };
        debug!(subscriber = %id, subscribers = count, "Subscriber connected");

        let snapshot = self.aggregator.snapshot().await?;
        if let Err(e) = subscriber.deliver(&FeedMessage::LeaderboardUpdate(snapshot)) {
            warn!(subscriber = %id, error = %e, "Failed to send connect snapshot");
        }
        Ok(())
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub async fn on_disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Subscriber disconnected");
        }
        removed
    }

    async fn fan_out(&self, snapshot: &LeaderboardSnapshot) -> PublishReport {
        let message = FeedMessage::LeaderboardUpdate(snapshot.clone());
        let mut report = PublishReport::default();
        let mut gone = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, subscriber) in subscribers.iter() {
                match subscriber.deliver(&message) {
                    Ok(()) => report.delivered = report.delivered.saturating_add(1),
                    Err(DeliveryError::Lagging(_)) => {
                        debug!(subscriber = %id, "Subscriber lagging, update dropped");
                        report.dropped = report.dropped.saturating_add(1);
                    }
                    Err(e @ DeliveryError::Disconnected(_)) => {
                        warn!(subscriber = %id, error = %e, "Delivery failed");
                        gone.push(*id);
                    }
                }
            }
        }

        if !gone.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &gone {
                subscribers.remove(id);
            }
            report.pruned = gone.len();
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use house_cup_db::{EventStore, MemoryEventStore};
    use house_cup_types::{House, ScoredEvent};

    use super::*;

    fn hub_over(store: &Arc<MemoryEventStore>) -> BroadcastHub {
        let store: Arc<dyn EventStore> = Arc::clone(store) as Arc<dyn EventStore>;
        BroadcastHub::new(Aggregator::new(store))
    }

    fn event(id: &str, category: House, points: i64) -> ScoredEvent {
        ScoredEvent {
            id: id.to_owned(),
            category,
            points,
            timestamp: Utc::now(),
        }
    }

    fn all_time(message: FeedMessage) -> house_cup_types::WindowTotals {
        let FeedMessage::LeaderboardUpdate(snapshot) = message;
        snapshot.all
    }

    /// A subscriber whose transport always fails.
    struct BrokenSubscriber {
        id: SubscriberId,
        attempts: AtomicUsize,
    }

    impl Subscriber for BrokenSubscriber {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn deliver(&self, _message: &FeedMessage) -> Result<(), DeliveryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Disconnected(self.id))
        }
    }

    #[tokio::test]
    async fn connect_sends_current_snapshot() {
        let store = Arc::new(MemoryEventStore::new());
        store.insert(&event("1", House::Gryff, 10)).await.unwrap();
        let hub = hub_over(&store);

        let (subscriber, mut rx) = ChannelSubscriber::channel(8);
        hub.on_connect(Arc::new(subscriber)).await.unwrap();

        let totals = all_time(rx.try_recv().unwrap());
        assert_eq!(totals.get(House::Gryff), 10);
        assert_eq!(totals.get(House::Huff), 0);
        assert!(rx.try_recv().is_err(), "only one connect snapshot");
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let store = Arc::new(MemoryEventStore::new());
        let hub = hub_over(&store);

        let (a, mut rx_a) = ChannelSubscriber::channel(8);
        let (b, mut rx_b) = ChannelSubscriber::channel(8);
        hub.on_connect(Arc::new(a)).await.unwrap();
        hub.on_connect(Arc::new(b)).await.unwrap();
        let _ = rx_a.try_recv();
        let _ = rx_b.try_recv();

        store.insert(&event("1", House::Raven, 7)).await.unwrap();
        let report = hub.publish_latest().await.unwrap();
        assert_eq!(report.delivered, 2);

        assert_eq!(all_time(rx_a.try_recv().unwrap()).get(House::Raven), 7);
        assert_eq!(all_time(rx_b.try_recv().unwrap()).get(House::Raven), 7);
    }

    #[tokio::test]
    async fn broken_subscriber_does_not_block_others() {
        let store = Arc::new(MemoryEventStore::new());
        let hub = hub_over(&store);

        let broken = Arc::new(BrokenSubscriber {
            id: SubscriberId::new(),
            attempts: AtomicUsize::new(0),
        });
        hub.on_connect(Arc::clone(&broken) as Arc<dyn Subscriber>)
            .await
            .unwrap();
        let (healthy, mut rx) = ChannelSubscriber::channel(8);
        hub.on_connect(Arc::new(healthy)).await.unwrap();
        let _ = rx.try_recv();

        let report = hub.publish(&LeaderboardSnapshot::default()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert!(rx.try_recv().is_ok());
        assert_eq!(hub.subscriber_count().await, 1);

        // Pruned: not attempted again.
        let attempts = broken.attempts.load(Ordering::SeqCst);
        hub.publish(&LeaderboardSnapshot::default()).await;
        assert_eq!(broken.attempts.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_kept_and_catches_up() {
        let store = Arc::new(MemoryEventStore::new());
        let hub = hub_over(&store);

        let (slow, mut rx) = ChannelSubscriber::channel(1);
        hub.on_connect(Arc::new(slow)).await.unwrap();
        // Buffer now holds the connect snapshot.

        store.insert(&event("1", House::Huff, 1)).await.unwrap();
        let report = hub.publish_latest().await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(hub.subscriber_count().await, 1);

        let _ = rx.try_recv();
        store.insert(&event("2", House::Huff, 2)).await.unwrap();
        hub.publish_latest().await.unwrap();
        assert_eq!(all_time(rx.try_recv().unwrap()).get(House::Huff), 3);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_stops_delivery() {
        let store = Arc::new(MemoryEventStore::new());
        let hub = hub_over(&store);

        let (subscriber, mut rx) = ChannelSubscriber::channel(8);
        let id = subscriber.id();
        hub.on_connect(Arc::new(subscriber)).await.unwrap();
        let _ = rx.try_recv();

        assert!(hub.on_disconnect(id).await);
        assert!(!hub.on_disconnect(id).await);

        hub.publish(&LeaderboardSnapshot::default()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_not_an_error() {
        let store = Arc::new(MemoryEventStore::new());
        let hub = hub_over(&store);
        let report = hub.publish_latest().await.unwrap();
        assert_eq!(report, PublishReport::default());
    }
}
