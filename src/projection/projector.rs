use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{MatchAggregate, PredictionAggregate, UserAggregate};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{
    replay, Aggregate, AggregateKind, AggregateRef, EventEnvelope, Watermark,
};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use crate::read_model::{MatchRow, PredictionRow, ProjectionRow, ReadModelStore, UserRow};
use crate::utils::KeyedLocks;

// ============================================================================
// Read-Model Projector
// ============================================================================
//
// Keeps projection rows in step with the log using the same folds the
// replayer uses. Each row carries the watermark of the last event folded
// into it:
//
//   sequence <= row.last_sequence      -> already applied, skip
//   version  == row.version + 1        -> apply the single event
//   anything else (gap, missing row,
//   duplicate create, lost race)       -> re-derive the row from the log
//
// Same-aggregate work is serialized by an in-process lock; the watermark
// check in `update_*` catches writers in other processes.
//
// ============================================================================

const REBUILD_CHUNK: usize = 64;
const REBUILD_PAGE: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The single event was folded into the row.
    Applied,
    /// The row already reflects the event.
    Skipped,
    /// The row was re-derived from the full history.
    Rebuilt,
    /// Nothing to project: the aggregate has no state.
    Ignored,
}

impl ProjectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionOutcome::Applied => "applied",
            ProjectionOutcome::Skipped => "skipped",
            ProjectionOutcome::Rebuilt => "rebuilt",
            ProjectionOutcome::Ignored => "ignored",
        }
    }
}

/// How a projection row compares with the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Current,
    Stale { row_version: i64, log_version: i64 },
    Missing { log_version: i64 },
    /// No events and no row.
    Absent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub aggregates: usize,
    pub rows: usize,
    pub last_sequence: i64,
}

/// Glue between an aggregate and its read-model table.
#[async_trait]
pub trait Projectable: Aggregate + 'static {
    async fn create_row(store: &dyn ReadModelStore, row: &ProjectionRow<Self>) -> CoreResult<()>;
    async fn update_row(
        store: &dyn ReadModelStore,
        row: &ProjectionRow<Self>,
        expected: Watermark,
    ) -> CoreResult<()>;
    async fn upsert_row(store: &dyn ReadModelStore, row: &ProjectionRow<Self>) -> CoreResult<()>;
    async fn get_row(store: &dyn ReadModelStore, id: &str) -> CoreResult<Option<ProjectionRow<Self>>>;
}

#[async_trait]
impl Projectable for MatchAggregate {
    async fn create_row(store: &dyn ReadModelStore, row: &MatchRow) -> CoreResult<()> {
        store.create_match(row).await
    }

    async fn update_row(store: &dyn ReadModelStore, row: &MatchRow, expected: Watermark) -> CoreResult<()> {
        store.update_match(row, expected).await
    }

    async fn upsert_row(store: &dyn ReadModelStore, row: &MatchRow) -> CoreResult<()> {
        store.upsert_match(row).await
    }

    async fn get_row(store: &dyn ReadModelStore, id: &str) -> CoreResult<Option<MatchRow>> {
        store.get_match(id).await
    }
}

#[async_trait]
impl Projectable for PredictionAggregate {
    async fn create_row(store: &dyn ReadModelStore, row: &PredictionRow) -> CoreResult<()> {
        store.create_prediction(row).await
    }

    async fn update_row(
        store: &dyn ReadModelStore,
        row: &PredictionRow,
        expected: Watermark,
    ) -> CoreResult<()> {
        store.update_prediction(row, expected).await
    }

    async fn upsert_row(store: &dyn ReadModelStore, row: &PredictionRow) -> CoreResult<()> {
        store.upsert_prediction(row).await
    }

    async fn get_row(store: &dyn ReadModelStore, id: &str) -> CoreResult<Option<PredictionRow>> {
        store.get_prediction(id).await
    }
}

#[async_trait]
impl Projectable for UserAggregate {
    async fn create_row(store: &dyn ReadModelStore, row: &UserRow) -> CoreResult<()> {
        store.create_user(row).await
    }

    async fn update_row(store: &dyn ReadModelStore, row: &UserRow, expected: Watermark) -> CoreResult<()> {
        store.update_user(row, expected).await
    }

    async fn upsert_row(store: &dyn ReadModelStore, row: &UserRow) -> CoreResult<()> {
        store.upsert_user(row).await
    }

    async fn get_row(store: &dyn ReadModelStore, id: &str) -> CoreResult<Option<UserRow>> {
        store.get_user(id).await
    }
}

pub struct Projector {
    events: Arc<dyn EventStore>,
    read_model: Arc<dyn ReadModelStore>,
    metrics: Arc<Metrics>,
    locks: KeyedLocks<AggregateRef>,
}

impl Projector {
    pub fn new(
        events: Arc<dyn EventStore>,
        read_model: Arc<dyn ReadModelStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            events,
            read_model,
            metrics,
            locks: KeyedLocks::new(),
        }
    }

    pub fn read_model(&self) -> &Arc<dyn ReadModelStore> {
        &self.read_model
    }

    /// Project one appended event, healing the row when it cannot simply be
    /// advanced.
    pub async fn project(&self, envelope: &EventEnvelope) -> CoreResult<ProjectionOutcome> {
        let _guard = self.locks.lock(&envelope.aggregate).await;

        let result = match envelope.aggregate.kind {
            AggregateKind::Match => self.project_as::<MatchAggregate>(envelope).await,
            AggregateKind::Prediction => self.project_as::<PredictionAggregate>(envelope).await,
            AggregateKind::User => self.project_as::<UserAggregate>(envelope).await,
        };

        match &result {
            Ok(outcome) => {
                self.metrics.record_projection(outcome.as_str());
                tracing::debug!(
                    aggregate = %envelope.aggregate,
                    sequence = envelope.sequence,
                    version = envelope.version,
                    outcome = outcome.as_str(),
                    "Projected event"
                );
            }
            Err(e) => {
                self.metrics.record_projection_failure(envelope.aggregate.kind.as_str());
                tracing::error!(
                    aggregate = %envelope.aggregate,
                    sequence = envelope.sequence,
                    error = %e,
                    "Failed to project event"
                );
            }
        }
        result
    }

    /// Fold one event into its row with no healing.
    ///
    /// Creation events insert (`Duplicate` if the row exists), other known
    /// events update (`NotFound` if it does not), unknown events do nothing.
    pub async fn apply(&self, envelope: &EventEnvelope) -> CoreResult<ProjectionOutcome> {
        if envelope.payload.is_unknown() {
            return Ok(ProjectionOutcome::Ignored);
        }

        let _guard = self.locks.lock(&envelope.aggregate).await;

        match envelope.aggregate.kind {
            AggregateKind::Match => self.apply_fresh::<MatchAggregate>(envelope).await,
            AggregateKind::Prediction => self.apply_fresh::<PredictionAggregate>(envelope).await,
            AggregateKind::User => self.apply_fresh::<UserAggregate>(envelope).await,
        }
    }

    /// Re-derive one row from the aggregate's full history.
    pub async fn rebuild(&self, aggregate: &AggregateRef) -> CoreResult<ProjectionOutcome> {
        let _guard = self.locks.lock(aggregate).await;

        match aggregate.kind {
            AggregateKind::Match => self.rebuild_as::<MatchAggregate>(&aggregate.id).await,
            AggregateKind::Prediction => self.rebuild_as::<PredictionAggregate>(&aggregate.id).await,
            AggregateKind::User => self.rebuild_as::<UserAggregate>(&aggregate.id).await,
        }
    }

    /// Drop the whole projection and re-derive every row from the log.
    pub async fn rebuild_all(&self) -> CoreResult<RebuildSummary> {
        self.read_model.clear().await?;

        let mut aggregates = BTreeSet::new();
        let mut last_sequence = 0;
        loop {
            let page = self
                .observe(self.events.events_after(last_sequence, REBUILD_PAGE).await)?;
            let Some(last) = page.last() else {
                break;
            };
            last_sequence = last.sequence;
            aggregates.extend(page.into_iter().map(|envelope| envelope.aggregate));
        }

        let aggregates: Vec<AggregateRef> = aggregates.into_iter().collect();
        let mut rows = 0;
        for chunk in aggregates.chunks(REBUILD_CHUNK) {
            let outcomes = try_join_all(chunk.iter().map(|aggregate| self.rebuild(aggregate))).await?;
            rows += outcomes
                .iter()
                .filter(|outcome| **outcome == ProjectionOutcome::Rebuilt)
                .count();
        }

        let summary = RebuildSummary {
            aggregates: aggregates.len(),
            rows,
            last_sequence,
        };
        tracing::info!(
            aggregates = summary.aggregates,
            rows = summary.rows,
            last_sequence = summary.last_sequence,
            "Rebuilt read model from event log"
        );
        Ok(summary)
    }

    /// Compare a row's watermark with the aggregate's latest logged version.
    pub async fn verify(&self, aggregate: &AggregateRef) -> CoreResult<Freshness> {
        let log_version = self.events.current_version(aggregate).await?;
        let row = match aggregate.kind {
            AggregateKind::Match => self.row_watermark::<MatchAggregate>(&aggregate.id).await?,
            AggregateKind::Prediction => {
                self.row_watermark::<PredictionAggregate>(&aggregate.id).await?
            }
            AggregateKind::User => self.row_watermark::<UserAggregate>(&aggregate.id).await?,
        };

        Ok(match row {
            None if log_version == 0 => Freshness::Absent,
            None => Freshness::Missing { log_version },
            Some(watermark) if watermark.version == log_version => Freshness::Current,
            Some(watermark) => Freshness::Stale {
                row_version: watermark.version,
                log_version,
            },
        })
    }

    async fn row_watermark<A: Projectable>(&self, id: &str) -> CoreResult<Option<Watermark>> {
        Ok(A::get_row(self.read_model.as_ref(), id)
            .await?
            .map(|row| row.watermark))
    }

    async fn project_as<A: Projectable>(&self, envelope: &EventEnvelope) -> CoreResult<ProjectionOutcome> {
        let id = envelope.aggregate.id.as_str();
        let current = A::get_row(self.read_model.as_ref(), id).await?;

        match &current {
            Some(row) if row.watermark.covers(envelope) => return Ok(ProjectionOutcome::Skipped),
            Some(row) if !row.watermark.is_next(envelope) => {
                tracing::warn!(
                    aggregate = %envelope.aggregate,
                    row_version = row.watermark.version,
                    event_version = envelope.version,
                    "Projection gap detected, rebuilding row"
                );
                return self.rebuild_as::<A>(id).await;
            }
            None if envelope.version != 1 => {
                tracing::warn!(
                    aggregate = %envelope.aggregate,
                    event_version = envelope.version,
                    "Projection row missing, rebuilding row"
                );
                return self.rebuild_as::<A>(id).await;
            }
            _ => {}
        }

        match self.apply_to::<A>(envelope, current).await {
            Err(e) if e.is_healable() => {
                tracing::warn!(
                    aggregate = %envelope.aggregate,
                    error = %e,
                    "Projection write rejected, rebuilding row"
                );
                self.rebuild_as::<A>(id).await
            }
            other => other,
        }
    }

    async fn apply_fresh<A: Projectable>(&self, envelope: &EventEnvelope) -> CoreResult<ProjectionOutcome> {
        if let Some(data) = A::apply_first_event(&envelope.payload) {
            A::create_row(
                self.read_model.as_ref(),
                &ProjectionRow::new(data, Watermark::of(envelope)),
            )
            .await?;
            return Ok(ProjectionOutcome::Applied);
        }
        let current = A::get_row(self.read_model.as_ref(), &envelope.aggregate.id).await?;
        self.apply_to::<A>(envelope, current).await
    }

    async fn apply_to<A: Projectable>(
        &self,
        envelope: &EventEnvelope,
        current: Option<ProjectionRow<A>>,
    ) -> CoreResult<ProjectionOutcome> {
        let Some(row) = current else {
            return match A::apply_first_event(&envelope.payload) {
                Some(data) => {
                    A::create_row(
                        self.read_model.as_ref(),
                        &ProjectionRow::new(data, Watermark::of(envelope)),
                    )
                    .await?;
                    Ok(ProjectionOutcome::Applied)
                }
                None => Err(CoreError::NotFound(envelope.aggregate.to_string())),
            };
        };

        if row.watermark.covers(envelope) {
            return Ok(ProjectionOutcome::Skipped);
        }

        let mut data = row.data.clone();
        if let Some(anomaly) = data.apply_event(&envelope.payload) {
            self.metrics.record_anomalies(A::KIND.as_str(), 1);
            tracing::warn!(
                aggregate = %envelope.aggregate,
                sequence = envelope.sequence,
                anomaly = ?anomaly,
                "Integrity anomaly while projecting"
            );
        }

        A::update_row(
            self.read_model.as_ref(),
            &ProjectionRow::new(data, Watermark::of(envelope)),
            row.watermark,
        )
        .await?;
        Ok(ProjectionOutcome::Applied)
    }

    async fn rebuild_as<A: Projectable>(&self, id: &str) -> CoreResult<ProjectionOutcome> {
        let aggregate = AggregateRef::new(A::KIND, id);
        let events = self.observe(self.events.events_for_aggregate(&aggregate).await)?;
        let replayed = replay::<A>(&events);
        self.metrics
            .record_anomalies(A::KIND.as_str(), replayed.anomalies.len());

        let Some(row) = ProjectionRow::from_replayed(replayed) else {
            return Ok(ProjectionOutcome::Ignored);
        };

        A::upsert_row(self.read_model.as_ref(), &row).await?;
        self.metrics.record_rebuild(A::KIND.as_str());
        tracing::info!(
            aggregate = %aggregate,
            version = row.watermark.version,
            last_sequence = row.watermark.last_sequence,
            "Rebuilt projection row from event log"
        );
        Ok(ProjectionOutcome::Rebuilt)
    }

    fn observe<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(CoreError::Decode { .. }) = &result {
            self.metrics.record_decode_failure();
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
