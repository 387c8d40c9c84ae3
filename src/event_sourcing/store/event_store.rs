use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::PayloadKey;
use crate::error::CoreResult;
use crate::event_sourcing::core::{
    replay, Aggregate, AggregateRef, EventEnvelope, NewEvent, Replayed, StoredPosition,
};

// ============================================================================
// Event Log Store - append-only contract
// ============================================================================
//
// Responsibilities:
// 1. Append envelopes, assigning `sequence` and per-aggregate `version`
//    atomically with persistence
// 2. Query by aggregate, by type, by indexed payload key, by time range and
//    by log position
// 3. Return fully decoded batches or fail the whole call
//
// Implementations never retry; retry policy belongs to callers.
//
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event. Fails `Duplicate` if its id was appended before.
    async fn append(&self, event: &NewEvent) -> CoreResult<StoredPosition>;

    /// Full history of one aggregate, ascending by sequence.
    async fn events_for_aggregate(&self, aggregate: &AggregateRef) -> CoreResult<Vec<EventEnvelope>>;

    /// All events carrying `event_type`, ascending by sequence.
    async fn events_by_type(&self, event_type: &str) -> CoreResult<Vec<EventEnvelope>>;

    /// Events of `event_type` whose payload field `key` equals `value`,
    /// ascending by sequence. Served from an index, not a scan of the type.
    async fn events_by_key(
        &self,
        event_type: &str,
        key: PayloadKey,
        value: &str,
    ) -> CoreResult<Vec<EventEnvelope>>;

    /// Events with `start <= timestamp <= end`, ordered by timestamp then sequence.
    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<EventEnvelope>>;

    /// Up to `limit` events with a sequence greater than `sequence`.
    async fn events_after(&self, sequence: i64, limit: usize) -> CoreResult<Vec<EventEnvelope>>;

    /// Version of the aggregate's latest event, 0 when it has none.
    async fn current_version(&self, aggregate: &AggregateRef) -> CoreResult<i64>;

    async fn aggregate_exists(&self, aggregate: &AggregateRef) -> CoreResult<bool> {
        Ok(self.current_version(aggregate).await? > 0)
    }
}

/// Replay one aggregate straight from the log.
pub async fn load_aggregate<A: Aggregate>(
    store: &dyn EventStore,
    id: &str,
) -> CoreResult<Replayed<A>> {
    let aggregate = AggregateRef::new(A::KIND, id);
    let events = store.events_for_aggregate(&aggregate).await?;

    tracing::debug!(
        aggregate = %aggregate,
        event_count = events.len(),
        "Replaying aggregate from event log"
    );

    Ok(replay(&events))
}
