// ============================================================================
// Read Model
// ============================================================================
//
// Derived, disposable query tables. Each row carries the watermark of the
// last event folded into it so the projector can tell whether it is current.
//
// ============================================================================

pub mod leaderboard;
pub mod memory;
pub mod postgres;
pub mod rows;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use leaderboard::{rank, user_stats, LeaderboardEntry};
pub use memory::MemoryReadModel;
pub use postgres::PostgresReadModel;
pub use rows::{MatchRow, PredictionRow, ProjectionRow, UserRow};
pub use store::{MatchFilters, PredictionFilters, ReadModelStore};
