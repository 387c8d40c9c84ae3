use serde::{Deserialize, Serialize};

use crate::domain::{DomainEvent, MatchStatus, Score};
use super::event::AggregateKind;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// State is derived from events only. Both the replayer and the projector go
// through these two functions, so a projection row and a replay can never
// disagree about what an event means.
//
// Folds must stay pure: no clocks, no I/O, no randomness.
//
// ============================================================================

pub trait Aggregate: Sized + Clone + Send + Sync {
    const KIND: AggregateKind;

    /// Create the aggregate from its creation event; `None` for any other event.
    fn apply_first_event(event: &DomainEvent) -> Option<Self>;

    /// Apply a subsequent event. Irrelevant events are no-ops. Integrity
    /// problems are returned, not raised: the event already happened.
    fn apply_event(&mut self, event: &DomainEvent) -> Option<AnomalyKind>;

    fn aggregate_id(&self) -> &str;
}

/// Data-integrity condition found while folding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnomalyKind {
    IllegalStatusTransition { from: MatchStatus, to: MatchStatus },
    NegativeGoals(Score),
    DuplicateCreation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub event_id: String,
    pub sequence: i64,
    pub kind: AnomalyKind,
}
