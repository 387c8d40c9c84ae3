// ============================================================================
// Event Sourcing Core
// ============================================================================
//
// Envelope, aggregate fold contract and the replayer. Nothing in here
// touches storage.
//
// ============================================================================

pub mod aggregate;
pub mod event;
pub mod replay;

pub use aggregate::{Aggregate, Anomaly, AnomalyKind};
pub use event::{
    decode_all, new_event_id, AggregateKind, AggregateRef, EventEnvelope, NewEvent, RawEvent,
    StoredPosition,
};
pub use replay::{replay, replay_until, Replayed, Watermark};
