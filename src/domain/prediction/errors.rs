use crate::domain::matches::{MatchStatus, Score};

// ============================================================================
// Prediction Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Predicted goals cannot be negative: {0}")]
    NegativeGoals(Score),

    #[error("Match {match_id} is {status} and no longer accepts predictions")]
    MatchClosed { match_id: String, status: MatchStatus },

    #[error("User {user_id} already predicted match {match_id}")]
    AlreadyPredicted { user_id: String, match_id: String },

    #[error("Prediction already exists: {0}")]
    AlreadyExists(String),

    #[error("User {0} is deactivated")]
    InactiveUser(String),

    #[error("Match {0} has no final score to settle against")]
    NotSettled(String),
}
