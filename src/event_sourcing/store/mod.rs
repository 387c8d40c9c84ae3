// ============================================================================
// Event Log Storage
// ============================================================================
//
// One trait, two backends. The in-memory log serves tests and the demo
// binary; PostgreSQL is the durable backend.
//
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod postgres;

pub use event_store::{load_aggregate, EventStore};
pub use memory::MemoryEventStore;
pub use postgres::PostgresEventStore;
