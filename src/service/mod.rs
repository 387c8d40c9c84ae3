// ============================================================================
// Tipping Service - write boundary and query entry point
// ============================================================================
//
// Write path:  command -> load state from the log -> one event -> append
//              -> project synchronously
// Read path:   projection row -> replay fallback when the row is missing,
//              stale or unreadable
//
// An append that cannot be projected still succeeds; the receipt says so
// and the next read (or the projection worker) heals the row.
//
// ============================================================================

pub mod commands;
pub mod queries;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::{DomainEvent, Score};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{AggregateRef, NewEvent};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use crate::projection::Projector;
use crate::read_model::ReadModelStore;
use crate::utils::{with_deadline, KeyedLocks};

pub use queries::Consistency;

/// What an accepted write left behind in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub event_id: String,
    pub event_type: String,
    pub aggregate: AggregateRef,
    pub sequence: i64,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    /// False when the read model could not be updated in line.
    pub projected: bool,
}

/// Result of settling one finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub match_id: String,
    pub final_score: Score,
    pub awarded: Vec<Receipt>,
    /// Predictions already settled at the right points.
    pub unchanged: usize,
}

pub struct TippingService {
    events: Arc<dyn EventStore>,
    read_model: Arc<dyn ReadModelStore>,
    projector: Arc<Projector>,
    metrics: Arc<Metrics>,
    timeout: Duration,
    writes: KeyedLocks<AggregateRef>,
    registrations: Mutex<()>,
}

impl TippingService {
    pub fn new(
        events: Arc<dyn EventStore>,
        projector: Arc<Projector>,
        metrics: Arc<Metrics>,
        timeout: Duration,
    ) -> Self {
        let read_model = projector.read_model().clone();
        Self {
            events,
            read_model,
            projector,
            metrics,
            timeout,
            writes: KeyedLocks::new(),
            registrations: Mutex::new(()),
        }
    }

    pub fn projector(&self) -> &Arc<Projector> {
        &self.projector
    }

    /// Run one service operation under the configured deadline.
    async fn guarded<T, F>(&self, operation: &'static str, future: F) -> CoreResult<T>
    where
        F: Future<Output = CoreResult<T>>,
    {
        let result = with_deadline(self.timeout, future).await;
        if let Err(CoreError::Timeout(_)) = &result {
            self.metrics.record_timeout(operation);
        }
        result
    }

    /// Append one event and project it.
    async fn commit(&self, payload: DomainEvent) -> CoreResult<Receipt> {
        let event = NewEvent::new(payload)?;
        let event_type = event.event_type().to_string();

        let started = Instant::now();
        let position = self.events.append(&event).await?;
        self.metrics
            .record_append(&event_type, started.elapsed().as_secs_f64());

        let envelope = event.into_envelope(position);
        let projected = match self.projector.project(&envelope).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    aggregate = %envelope.aggregate,
                    sequence = envelope.sequence,
                    error = %e,
                    "Event appended but not projected, row will be healed on read"
                );
                false
            }
        };

        tracing::info!(
            aggregate = %envelope.aggregate,
            event_type = %event_type,
            sequence = envelope.sequence,
            version = envelope.version,
            "Event committed"
        );

        Ok(Receipt {
            event_id: envelope.id,
            event_type,
            aggregate: envelope.aggregate,
            sequence: envelope.sequence,
            version: envelope.version,
            timestamp: envelope.timestamp,
            projected,
        })
    }
}
