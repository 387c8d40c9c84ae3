// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, events, errors
// and the aggregate fold. `events` ties the payloads together into the closed
// event union the log stores.
//
// ============================================================================

pub mod events;
pub mod matches;
pub mod prediction;
pub mod user;

pub use events::*;
pub use matches::*;
pub use prediction::*;
pub use user::*;
