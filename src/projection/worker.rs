use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::CoreResult;
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use crate::read_model::ReadModelStore;
use crate::utils::{retry_on_transient, RetryConfig};
use super::projector::Projector;

// ============================================================================
// Projection Worker - durable catch-up consumer of the event log
// ============================================================================
//
// Polling loop:
// 1. Load the consumer's cursor (last fully projected sequence)
// 2. Fetch the next batch with `events_after`
// 3. Project every event in order
// 4. Save the cursor at the batch's last sequence
//
// The cursor is saved only after the whole batch is projected, so a crash
// replays at most one batch, and projecting is idempotent.
//
// ============================================================================

pub const DEFAULT_CONSUMER: &str = "projection-worker";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub consumer: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer: DEFAULT_CONSUMER.to_string(),
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            retry: RetryConfig::background(),
        }
    }
}

pub struct ProjectionWorker {
    events: Arc<dyn EventStore>,
    read_model: Arc<dyn ReadModelStore>,
    projector: Arc<Projector>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
}

impl ProjectionWorker {
    pub fn new(
        events: Arc<dyn EventStore>,
        projector: Arc<Projector>,
        metrics: Arc<Metrics>,
        mut config: WorkerConfig,
    ) -> Self {
        // an empty batch could never move the cursor
        config.batch_size = config.batch_size.max(1);
        let read_model = projector.read_model().clone();
        Self {
            events,
            read_model,
            projector,
            metrics,
            config,
        }
    }

    /// Project one batch past the cursor. Returns how many events it held.
    pub async fn run_once(&self) -> CoreResult<usize> {
        let cursor = self.read_model.load_cursor(&self.config.consumer).await?;
        let batch = self
            .events
            .events_after(cursor, self.config.batch_size)
            .await?;

        let Some(last) = batch.last().map(|envelope| envelope.sequence) else {
            return Ok(0);
        };

        for envelope in &batch {
            self.projector.project(envelope).await?;
        }

        self.read_model.save_cursor(&self.config.consumer, last).await?;
        self.metrics.set_cursor(last);

        tracing::debug!(
            consumer = %self.config.consumer,
            from = cursor,
            to = last,
            events = batch.len(),
            "Projected batch"
        );
        Ok(batch.len())
    }

    /// `run_once`, retrying transient storage failures with backoff.
    pub async fn run_once_with_retry(&self) -> CoreResult<usize> {
        retry_on_transient(self.config.retry.clone(), |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt("projection_batch");
            }
            self.run_once()
        })
        .await
        .into_result()
    }

    /// Run batches until the cursor reaches the end of the log.
    pub async fn catch_up(&self) -> CoreResult<usize> {
        let mut total = 0;
        loop {
            let projected = self.run_once().await?;
            total += projected;
            if projected == 0 || projected < self.config.batch_size {
                return Ok(total);
            }
        }
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            consumer = %self.config.consumer,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Projection worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let projected = match self.run_once_with_retry().await {
                Ok(projected) => projected,
                Err(e) => {
                    tracing::error!(
                        consumer = %self.config.consumer,
                        error = %e,
                        "Projection batch failed, waiting for next poll"
                    );
                    0
                }
            };

            // a full batch means there is probably more waiting
            if projected > 0 && projected == self.config.batch_size {
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(consumer = %self.config.consumer, "Projection worker stopped");
    }

    pub fn spawn(self) -> WorkerHandle {
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(Arc::new(self).run(receiver));
        WorkerHandle { shutdown, handle }
    }
}

pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker and wait for the current batch to finish.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        // the worker may already have exited
        let _ = self.shutdown.send(true);
        self.handle.await
    }
}

// ============================================================================
// Tests
// ============================================================================
