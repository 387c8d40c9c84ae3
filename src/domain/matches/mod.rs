// ============================================================================
// Match Domain
// ============================================================================
//
// - Value objects (MatchStatus, Score)
// - Events (MatchCreated, MatchScoreUpdated, MatchStatusChanged)
// - Errors (MatchError)
// - Aggregate (MatchAggregate fold)
// - Commands (MatchCommand decisions)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;
pub mod aggregate;
pub mod commands;

pub use value_objects::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
pub use commands::*;
