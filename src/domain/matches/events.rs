use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{MatchStatus, Score};

// ============================================================================
// Match Events - wire payloads (camelCase JSON)
// ============================================================================

/// Match Created - opens the match stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCreated {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub date: DateTime<Utc>,
    pub competition: String,
}

/// Match Score Updated - last writer by sequence wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScoreUpdated {
    pub match_id: String,
    pub home_goals: i32,
    pub away_goals: i32,
    pub updated_at: DateTime<Utc>,
}

impl MatchScoreUpdated {
    pub fn score(&self) -> Score {
        Score::new(self.home_goals, self.away_goals)
    }
}

/// Match Status Changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatusChanged {
    pub match_id: String,
    pub status: MatchStatus,
    pub changed_at: DateTime<Utc>,
}
