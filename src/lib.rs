// ============================================================================
// Footy Tipping - event-sourced persistence core
// ============================================================================
//
// - event_sourcing: append-only log, envelopes, aggregate replay
// - projection: read-model projector and catch-up worker
// - read_model: query tables and the leaderboard
// - service: write boundary and queries
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod metrics;
pub mod projection;
pub mod read_model;
pub mod scoring;
pub mod service;
pub mod storage;
pub mod utils;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use service::{Consistency, Receipt, Settlement, TippingService};
