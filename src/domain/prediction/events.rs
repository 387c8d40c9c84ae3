use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::matches::Score;

// ============================================================================
// Prediction Events
// ============================================================================

/// Prediction Made - a user's tip for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionMade {
    pub id: String,
    pub user_id: String,
    pub match_id: String,
    pub home_goals: i32,
    pub away_goals: i32,
    pub created_at: DateTime<Utc>,
}

impl PredictionMade {
    pub fn score(&self) -> Score {
        Score::new(self.home_goals, self.away_goals)
    }
}

/// Points Awarded - result of settling a prediction against the final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAwarded {
    pub prediction_id: String,
    pub user_id: String,
    pub match_id: String,
    pub points: i32,
    pub awarded_at: DateTime<Utc>,
}
