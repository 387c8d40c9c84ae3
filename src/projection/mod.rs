// ============================================================================
// Projection
// ============================================================================
//
// - Projector: folds appended events into read-model rows, self-healing
// - Worker: catches the read model up from a durable cursor
//
// ============================================================================

pub mod projector;
pub mod worker;

pub use projector::{Freshness, Projectable, ProjectionOutcome, Projector, RebuildSummary};
pub use worker::{ProjectionWorker, WorkerConfig, WorkerHandle, DEFAULT_CONSUMER};
