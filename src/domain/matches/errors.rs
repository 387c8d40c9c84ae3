use super::value_objects::{MatchStatus, Score};

// ============================================================================
// Match Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Match not found: {0}")]
    NotFound(String),

    #[error("Match already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: MatchStatus, to: MatchStatus },

    #[error("Goal counts cannot be negative: {0}")]
    NegativeGoals(Score),

    #[error("Cannot record a score while match is {0}")]
    NotInPlay(MatchStatus),

    #[error("Team name cannot be empty")]
    EmptyTeam,

    #[error("A team cannot play itself: {0}")]
    SameTeams(String),
}
