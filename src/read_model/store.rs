use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MatchAggregate, MatchStatus, PredictionAggregate};
use crate::error::CoreResult;
use crate::event_sourcing::core::Watermark;
use super::rows::{MatchRow, PredictionRow, UserRow};

// ============================================================================
// Read-Model Store - projection persistence contract
// ============================================================================
//
// Write operations, per table:
// - create: insert a new row, `Duplicate` if the id exists
// - update: overwrite a row whose stored watermark equals `expected`;
//           `NotFound` if absent, `Conflict` if someone else moved it
// - upsert: overwrite unconditionally unless the stored row is further
//           along the log (used by rebuilds)
//
// Rows are never authoritative: `clear` may drop everything at any time.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilters {
    pub competition: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<MatchStatus>,
}

impl MatchFilters {
    pub fn matches(&self, m: &MatchAggregate) -> bool {
        self.competition.as_ref().map_or(true, |c| *c == m.competition)
            && self.start_date.map_or(true, |start| m.date >= start)
            && self.end_date.map_or(true, |end| m.date <= end)
            && self.status.map_or(true, |status| m.status == status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFilters {
    pub user_id: Option<String>,
    pub match_id: Option<String>,
}

impl PredictionFilters {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            match_id: None,
        }
    }

    pub fn for_match(match_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            match_id: Some(match_id.into()),
        }
    }

    pub fn matches(&self, p: &PredictionAggregate) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == p.user_id)
            && self.match_id.as_ref().map_or(true, |m| *m == p.match_id)
    }
}

#[async_trait]
pub trait ReadModelStore: Send + Sync {
    async fn create_match(&self, row: &MatchRow) -> CoreResult<()>;
    async fn update_match(&self, row: &MatchRow, expected: Watermark) -> CoreResult<()>;
    async fn upsert_match(&self, row: &MatchRow) -> CoreResult<()>;
    async fn get_match(&self, id: &str) -> CoreResult<Option<MatchRow>>;
    /// Ordered by kick-off date, then id.
    async fn list_matches(&self, filters: &MatchFilters) -> CoreResult<Vec<MatchRow>>;

    async fn create_prediction(&self, row: &PredictionRow) -> CoreResult<()>;
    async fn update_prediction(&self, row: &PredictionRow, expected: Watermark) -> CoreResult<()>;
    async fn upsert_prediction(&self, row: &PredictionRow) -> CoreResult<()>;
    async fn get_prediction(&self, id: &str) -> CoreResult<Option<PredictionRow>>;
    /// Ordered by creation time, then id.
    async fn list_predictions(&self, filters: &PredictionFilters) -> CoreResult<Vec<PredictionRow>>;

    async fn create_user(&self, row: &UserRow) -> CoreResult<()>;
    async fn update_user(&self, row: &UserRow, expected: Watermark) -> CoreResult<()>;
    async fn upsert_user(&self, row: &UserRow) -> CoreResult<()>;
    async fn get_user(&self, id: &str) -> CoreResult<Option<UserRow>>;
    /// Ordered by registration time, then id.
    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<UserRow>>;

    /// Drop every projection row and cursor.
    async fn clear(&self) -> CoreResult<()>;

    /// Last log sequence a consumer has fully projected, 0 if none.
    async fn load_cursor(&self, consumer: &str) -> CoreResult<i64>;
    /// Never moves a cursor backwards.
    async fn save_cursor(&self, consumer: &str, sequence: i64) -> CoreResult<()>;
}
