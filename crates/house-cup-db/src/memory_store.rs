//! In-memory [`EventStore`] implementation.
//!
//! Holds every event in a map keyed by id behind a [`RwLock`], so
//! concurrent aggregate reads share the lock and only inserts take it
//! exclusively. Nothing survives the process; use
//! [`SqliteEventStore`](crate::event_store::SqliteEventStore) when the log
//! must be durable.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use house_cup_types::{House, ScoredEvent};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::event_store::EventStore;

/// Volatile event store keyed by event id.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<BTreeMap<String, ScoredEvent>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &ScoredEvent) -> Result<(), StoreError> {
        event.validate()?;

        let mut events = self.events.write().await;
        match events.entry(event.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(event.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(())
            }
        }
    }

    async fn sum_by_category(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<House, i64>, StoreError> {
        let cutoff = cutoff.as_ref().map(DateTime::timestamp_micros);
        let events = self.events.read().await;
        let mut sums: BTreeMap<House, i64> = BTreeMap::new();
        for event in events
            .values()
            .filter(|e| cutoff.is_none_or(|cutoff| e.timestamp.timestamp_micros() > cutoff))
        {
            let entry = sums.entry(event.category).or_insert(0);
            *entry = entry.saturating_add(event.points);
        }
        Ok(sums)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let events = self.events.read().await;
        Ok(u64::try_from(events.len()).unwrap_or(u64::MAX))
    }
}
