use serde::{Deserialize, Serialize};

use super::aggregate::{Aggregate, Anomaly};
use super::event::{AggregateRef, EventEnvelope};

// ============================================================================
// Aggregate Replayer
// ============================================================================
//
// `replay` is a total fold over envelopes, ordered by `sequence` whatever the
// input order or timestamps. A `Replayed` value can be continued with more
// events, and re-folding an event it has already seen is a no-op, so
// replaying a prefix and then the rest gives the same state as one pass.
//
// ============================================================================

/// Last log position folded into a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    pub version: i64,
    pub last_sequence: i64,
}

impl Watermark {
    pub const ZERO: Watermark = Watermark { version: 0, last_sequence: 0 };

    pub fn of(envelope: &EventEnvelope) -> Self {
        Self {
            version: envelope.version,
            last_sequence: envelope.sequence,
        }
    }

    /// Whether `envelope` is already covered by this watermark.
    pub fn covers(&self, envelope: &EventEnvelope) -> bool {
        envelope.sequence <= self.last_sequence
    }

    /// Whether `envelope` is the very next event of the aggregate.
    pub fn is_next(&self, envelope: &EventEnvelope) -> bool {
        envelope.version == self.version + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Replayed<A> {
    pub aggregate: Option<AggregateRef>,
    pub state: Option<A>,
    pub watermark: Watermark,
    pub anomalies: Vec<Anomaly>,
}

impl<A> Default for Replayed<A> {
    fn default() -> Self {
        Self {
            aggregate: None,
            state: None,
            watermark: Watermark::ZERO,
            anomalies: Vec::new(),
        }
    }
}

impl<A: Aggregate> Replayed<A> {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold one envelope. Envelopes of another aggregate, or at or below the
    /// watermark, leave the value untouched.
    pub fn fold(mut self, envelope: &EventEnvelope) -> Self {
        if envelope.aggregate.kind != A::KIND || self.watermark.covers(envelope) {
            return self;
        }
        match &self.aggregate {
            Some(aggregate) if *aggregate != envelope.aggregate => return self,
            Some(_) => {}
            None => self.aggregate = Some(envelope.aggregate.clone()),
        }

        match self.state.as_mut() {
            None => self.state = A::apply_first_event(&envelope.payload),
            Some(state) => {
                if let Some(kind) = state.apply_event(&envelope.payload) {
                    tracing::warn!(
                        aggregate = %envelope.aggregate,
                        event_id = %envelope.id,
                        sequence = envelope.sequence,
                        anomaly = ?kind,
                        "Integrity anomaly in event log"
                    );
                    self.anomalies.push(Anomaly {
                        event_id: envelope.id.clone(),
                        sequence: envelope.sequence,
                        kind,
                    });
                }
            }
        }

        self.watermark = Watermark::of(envelope);
        self
    }

    /// Continue with more events, in sequence order.
    pub fn fold_more(self, events: &[EventEnvelope]) -> Self {
        let mut ordered: Vec<&EventEnvelope> = events.iter().collect();
        ordered.sort_by_key(|e| e.sequence);
        ordered.into_iter().fold(self, |acc, envelope| acc.fold(envelope))
    }

    pub fn into_state(self) -> Option<A> {
        self.state
    }
}

pub fn replay<A: Aggregate>(events: &[EventEnvelope]) -> Replayed<A> {
    Replayed::empty().fold_more(events)
}

/// State as it was right after log position `sequence`.
pub fn replay_until<A: Aggregate>(events: &[EventEnvelope], sequence: i64) -> Replayed<A> {
    let prefix: Vec<EventEnvelope> = events
        .iter()
        .filter(|e| e.sequence <= sequence)
        .cloned()
        .collect();
    replay(&prefix)
}

// ============================================================================
// Tests
// ============================================================================
