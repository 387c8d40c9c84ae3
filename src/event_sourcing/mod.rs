// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Envelopes, the aggregate fold contract, replay and the append-only log.
// What the events mean lives in src/domain/.
//
// ============================================================================

pub mod core;
pub mod store;

pub use self::core::*;
pub use self::store::*;
