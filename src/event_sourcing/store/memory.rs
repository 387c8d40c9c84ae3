use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::domain::PayloadKey;
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{
    decode_all, AggregateRef, EventEnvelope, NewEvent, RawEvent, StoredPosition,
};
use super::event_store::EventStore;

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Keeps the encoded rows, exactly like the database backend, so every read
// goes through the type registry. Appends run in one critical section with
// no await inside: an append is either fully visible or absent.
//
// ============================================================================

#[derive(Default)]
struct Log {
    rows: Vec<RawEvent>,
    ids: HashSet<String>,
    by_aggregate: HashMap<AggregateRef, Vec<usize>>,
    by_key: HashMap<KeyIndex, Vec<usize>>,
    unavailable: bool,
}

/// `(event_type, key, value)`
type KeyIndex = (String, PayloadKey, String);

fn key_entries(event: &NewEvent) -> Vec<KeyIndex> {
    let Ok(serde_json::Value::Object(fields)) = event.payload.to_json() else {
        return Vec::new();
    };
    PayloadKey::ALL
        .into_iter()
        .filter_map(|key| match fields.get(key.field()) {
            Some(serde_json::Value::String(value)) => {
                Some((event.event_type().to_string(), key, value.clone()))
            }
            _ => None,
        })
        .collect()
}

#[derive(Default)]
pub struct MemoryEventStore {
    log: Mutex<Log>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|log| log.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Log>> {
        let log = self
            .log
            .lock()
            .map_err(|_| CoreError::Storage("event log lock poisoned".to_string()))?;
        if log.unavailable {
            return Err(CoreError::Storage("event log unavailable".to_string()));
        }
        Ok(log)
    }

    fn select(&self, predicate: impl Fn(&RawEvent) -> bool) -> CoreResult<Vec<RawEvent>> {
        let log = self.lock()?;
        Ok(log.rows.iter().filter(|row| predicate(row)).cloned().collect())
    }

    /// Simulate an outage of the backing store.
    #[cfg(test)]
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut log) = self.log.lock() {
            log.unavailable = unavailable;
        }
    }

    /// Overwrite a stored payload, bypassing the append-only contract.
    #[cfg(test)]
    pub(crate) fn tamper(&self, sequence: i64, data: &str) {
        if let Ok(mut log) = self.log.lock() {
            if let Some(row) = log.rows.iter_mut().find(|row| row.sequence == sequence) {
                row.data = data.to_string();
            }
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: &NewEvent) -> CoreResult<StoredPosition> {
        let mut log = self.lock()?;

        if log.ids.contains(&event.id) {
            return Err(CoreError::Duplicate(format!("event {}", event.id)));
        }

        let position = StoredPosition {
            sequence: log.rows.len() as i64 + 1,
            version: log
                .by_aggregate
                .get(&event.aggregate)
                .map_or(0, |indexes| indexes.len() as i64)
                + 1,
        };
        let row = RawEvent::from_new(event, position)?;

        let index = log.rows.len();
        log.rows.push(row);
        log.ids.insert(event.id.clone());
        log.by_aggregate
            .entry(event.aggregate.clone())
            .or_default()
            .push(index);
        for entry in key_entries(event) {
            log.by_key.entry(entry).or_default().push(index);
        }

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type(),
            aggregate = %event.aggregate,
            sequence = position.sequence,
            version = position.version,
            "Appended event to in-memory log"
        );

        Ok(position)
    }

    async fn events_for_aggregate(&self, aggregate: &AggregateRef) -> CoreResult<Vec<EventEnvelope>> {
        let rows: Vec<RawEvent> = {
            let log = self.lock()?;
            log.by_aggregate
                .get(aggregate)
                .map(|indexes| indexes.iter().map(|&i| log.rows[i].clone()).collect())
                .unwrap_or_default()
        };
        decode_all(rows)
    }

    async fn events_by_type(&self, event_type: &str) -> CoreResult<Vec<EventEnvelope>> {
        decode_all(self.select(|row| row.event_type == event_type)?)
    }

    async fn events_by_key(
        &self,
        event_type: &str,
        key: PayloadKey,
        value: &str,
    ) -> CoreResult<Vec<EventEnvelope>> {
        let rows: Vec<RawEvent> = {
            let log = self.lock()?;
            log.by_key
                .get(&(event_type.to_string(), key, value.to_string()))
                .map(|indexes| indexes.iter().map(|&i| log.rows[i].clone()).collect())
                .unwrap_or_default()
        };
        decode_all(rows)
    }

    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<EventEnvelope>> {
        let mut rows = self.select(|row| row.timestamp >= start && row.timestamp <= end)?;
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.sequence.cmp(&b.sequence)));
        decode_all(rows)
    }

    async fn events_after(&self, sequence: i64, limit: usize) -> CoreResult<Vec<EventEnvelope>> {
        let rows: Vec<RawEvent> = {
            let log = self.lock()?;
            // sequence n lives at index n - 1
            let start = usize::try_from(sequence.max(0)).unwrap_or(usize::MAX).min(log.rows.len());
            log.rows[start..].iter().take(limit).cloned().collect()
        };
        decode_all(rows)
    }

    async fn current_version(&self, aggregate: &AggregateRef) -> CoreResult<i64> {
        let log = self.lock()?;
        Ok(log
            .by_aggregate
            .get(aggregate)
            .map_or(0, |indexes| indexes.len() as i64))
    }
}

// ============================================================================
// Tests
// ============================================================================
