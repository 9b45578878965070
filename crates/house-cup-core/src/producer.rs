//! Sources of raw scoring events.
//!
//! An [`EventProducer`] hands the ingestion worker a fresh stream of
//! [`RawEvent`]s each time ingestion starts. Streams may be finite or run
//! until the worker drops them; the worker treats every pulled item as
//! untrusted and validates it before storage.
//!
//! - [`RandomProducer`] -- synthetic events on a fixed interval, used by
//!   the server binary.
//! - [`StaticProducer`] -- a fixed list, replayed on every open.
//! - [`ChannelProducer`] -- events pushed in from elsewhere through an
//!   [`mpsc`] sender.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use house_cup_types::{House, RawEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, mpsc};

use crate::config::IngestionConfig;

/// Something the ingestion worker can pull raw events from.
pub trait EventProducer: Send + Sync {
    /// Open a new event stream.
    ///
    /// Called once per ingestion start. The stream ends when the producer
    /// is exhausted.
    fn open(&self) -> BoxStream<'static, RawEvent>;
}

// ---------------------------------------------------------------------------
// RandomProducer
// ---------------------------------------------------------------------------

/// Emits one random event per interval.
#[derive(Debug, Clone)]
pub struct RandomProducer {
    interval: Duration,
    max_events: Option<u64>,
    min_points: i64,
    max_points: i64,
    max_backdate: TimeDelta,
}

impl RandomProducer {
    /// Build a producer from the `ingestion` config section.
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            max_events: (config.max_events > 0).then_some(config.max_events),
            min_points: config.min_points.min(config.max_points),
            max_points: config.max_points.max(config.min_points),
            max_backdate: i64::try_from(config.max_backdate_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
        }
    }

    /// Override the delay before each event.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop after `count` events.
    #[must_use]
    pub const fn with_max_events(mut self, count: u64) -> Self {
        self.max_events = Some(count);
        self
    }
}

impl Default for RandomProducer {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}

impl EventProducer for RandomProducer {
    fn open(&self) -> BoxStream<'static, RawEvent> {
        let producer = self.clone();
        let rng = StdRng::from_os_rng();

        stream::unfold((producer, rng, 0_u64), |(producer, mut rng, emitted)| async move {
            if producer.max_events.is_some_and(|max| emitted >= max) {
                return None;
            }
            if !producer.interval.is_zero() {
                tokio::time::sleep(producer.interval).await;
            }
            let event = producer.generate(&mut rng);
            Some((event, (producer, rng, emitted.saturating_add(1))))
        })
        .boxed()
    }
}

impl RandomProducer {
    fn generate(&self, rng: &mut impl Rng) -> RawEvent {
        let category = match rng.random_range(0..4_u8) {
            0 => House::Gryff,
            1 => House::Slyth,
            2 => House::Raven,
            _ => House::Huff,
        };
        let points = rng.random_range(self.min_points..=self.max_points);

        let backdate_secs = self.max_backdate.num_seconds();
        let age = if backdate_secs > 0 {
            TimeDelta::seconds(rng.random_range(0..=backdate_secs))
        } else {
            TimeDelta::zero()
        };
        let timestamp = Utc::now()
            .checked_sub_signed(age)
            .unwrap_or_else(Utc::now);

        RawEvent {
            id: uuid::Uuid::new_v4().to_string(),
            category: category.code().to_owned(),
            points: serde_json::Number::from(points),
            timestamp: timestamp.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticProducer
// ---------------------------------------------------------------------------

/// Replays a fixed list of events, then ends.
#[derive(Debug, Clone, Default)]
pub struct StaticProducer {
    events: Arc<[RawEvent]>,
}

impl StaticProducer {
    /// Create a producer over the given events.
    pub fn new(events: impl Into<Vec<RawEvent>>) -> Self {
        Self {
            events: events.into().into(),
        }
    }
}

impl EventProducer for StaticProducer {
    fn open(&self) -> BoxStream<'static, RawEvent> {
        stream::iter(self.events.to_vec()).boxed()
    }
}

// ---------------------------------------------------------------------------
// ChannelProducer
// ---------------------------------------------------------------------------

/// Yields events sent through a paired [`mpsc::Sender`].
///
/// Only one open stream receives at a time; a later open takes over once
/// the earlier stream is dropped. The stream ends when every sender is
/// gone and the buffer is drained.
#[derive(Debug, Clone)]
pub struct ChannelProducer {
    rx: Arc<Mutex<mpsc::Receiver<RawEvent>>>,
}

impl ChannelProducer {
    /// Create a producer and the sender that feeds it.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<RawEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
            tx,
        )
    }
}

impl EventProducer for ChannelProducer {
    fn open(&self) -> BoxStream<'static, RawEvent> {
        let rx = Arc::clone(&self.rx);
        stream::unfold(rx, |rx| async move {
            let next = rx.lock().await.recv().await;
            next.map(|event| (event, rx))
        })
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use house_cup_types::ScoredEvent;

    use super::*;

    fn raw(id: &str) -> RawEvent {
        RawEvent {
            id: id.to_owned(),
            category: "Gryff".to_owned(),
            points: serde_json::Number::from(1),
            timestamp: "2026-10-19T12:00:00Z".to_owned(),
        }
    }

    #[tokio::test]
    async fn random_events_are_valid_and_in_range() {
        let config = IngestionConfig {
            min_points: -3,
            max_points: 3,
            max_backdate_secs: 600,
            ..IngestionConfig::default()
        };
        let producer = RandomProducer::from_config(&config)
            .with_interval(Duration::ZERO)
            .with_max_events(50);

        let events: Vec<RawEvent> = producer.open().collect().await;
        assert_eq!(events.len(), 50);

        let earliest = Utc::now() - TimeDelta::seconds(601);
        for raw in events {
            let event = ScoredEvent::try_from(raw).unwrap();
            assert!((-3..=3).contains(&event.points));
            assert!(event.timestamp > earliest);
        }
    }

    #[tokio::test]
    async fn random_ids_are_unique() {
        let producer = RandomProducer::default()
            .with_interval(Duration::ZERO)
            .with_max_events(100);
        let mut ids: Vec<String> = producer.open().map(|e| e.id).collect().await;
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[tokio::test]
    async fn static_producer_replays_on_every_open() {
        let producer = StaticProducer::new(vec![raw("a"), raw("b")]);
        let first: Vec<RawEvent> = producer.open().collect().await;
        let second: Vec<RawEvent> = producer.open().collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn channel_producer_ends_when_senders_drop() {
        let (producer, tx) = ChannelProducer::new(4);
        tx.send(raw("x")).await.unwrap();
        tx.send(raw("y")).await.unwrap();
        drop(tx);

        let ids: Vec<String> = producer.open().map(|e| e.id).collect().await;
        assert_eq!(ids, vec!["x".to_owned(), "y".to_owned()]);
    }
}
