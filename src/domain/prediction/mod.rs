// ============================================================================
// Prediction Domain
// ============================================================================

pub mod events;
pub mod errors;
pub mod aggregate;
pub mod commands;

pub use events::*;
pub use errors::*;
pub use aggregate::*;
pub use commands::*;
