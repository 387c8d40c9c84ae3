use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::UserStats;
use super::rows::{PredictionRow, UserRow};

// ============================================================================
// Leaderboard
// ============================================================================
//
// Stats are computed from settled prediction rows rather than folded into the
// user aggregate: a user's total is a cross-aggregate sum, and computing it
// on read keeps the user stream free of derived events.
//
// Ranking is competition style: equal points share a rank and the next rank
// skips (1, 2, 2, 4).
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    pub picture: String,
    pub stats: UserStats,
    pub success_rate: f64,
}

/// Stats of one user over the given prediction rows.
pub fn user_stats(user_id: &str, predictions: &[PredictionRow]) -> UserStats {
    let mut stats = UserStats::default();
    for row in predictions
        .iter()
        .filter(|row| row.data.user_id == user_id && row.data.is_settled())
    {
        stats.record(row.data.points);
    }
    stats
}

/// Rank active users by total points.
pub fn rank(users: &[UserRow], predictions: &[PredictionRow]) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<&str, UserStats> = HashMap::new();
    for row in predictions.iter().filter(|row| row.data.is_settled()) {
        totals
            .entry(row.data.user_id.as_str())
            .or_default()
            .record(row.data.points);
    }

    let mut entries: Vec<LeaderboardEntry> = users
        .iter()
        .filter(|row| row.data.is_active)
        .map(|row| {
            let stats = totals.get(row.data.id.as_str()).cloned().unwrap_or_default();
            LeaderboardEntry {
                user_id: row.data.id.clone(),
                name: row.data.name.clone(),
                picture: row.data.picture.clone(),
                success_rate: stats.success_rate(),
                stats,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.stats
            .total_points
            .cmp(&a.stats.total_points)
            .then_with(|| b.stats.correct_predictions.cmp(&a.stats.correct_predictions))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let mut previous_points = None;
    let mut current_rank = 0;
    for (position, entry) in entries.iter_mut().enumerate() {
        if previous_points != Some(entry.stats.total_points) {
            current_rank = position as i32 + 1;
            previous_points = Some(entry.stats.total_points);
        }
        entry.stats.current_rank = current_rank;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PredictionAggregate, UserAggregate};
    use crate::event_sourcing::core::Watermark;
    use crate::read_model::rows::ProjectionRow;
    use chrono::Utc;

    fn user(id: &str, name: &str, active: bool) -> UserRow {
        ProjectionRow::new(
            UserAggregate {
                id: id.to_string(),
                external_id: format!("ext-{}", id),
                email: format!("{}@example.com", id),
                name: name.to_string(),
                picture: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_active: active,
                stats: UserStats::default(),
            },
            Watermark { version: 1, last_sequence: 1 },
        )
    }

    fn prediction(id: &str, user_id: &str, points: Option<i32>) -> PredictionRow {
        ProjectionRow::new(
            PredictionAggregate {
                id: id.to_string(),
                user_id: user_id.to_string(),
                match_id: "M1".to_string(),
                home_goals: 1,
                away_goals: 0,
                created_at: Utc::now(),
                points: points.unwrap_or(0),
                awarded_at: points.map(|_| Utc::now()),
            },
            Watermark { version: 1, last_sequence: 1 },
        )
    }

    #[test]
    fn test_user_stats_count_settled_predictions_only() {
        let predictions = vec![
            prediction("P1", "U1", Some(3)),
            prediction("P2", "U1", Some(0)),
            prediction("P3", "U1", None),
            prediction("P4", "U2", Some(1)),
        ];

        let stats = user_stats("U1", &predictions);
        assert_eq!(stats.total_points, 3);
        assert_eq!(stats.total_predictions, 2);
        assert_eq!(stats.correct_predictions, 1);
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn test_ties_share_a_rank() {
        let users = vec![
            user("U1", "Alice", true),
            user("U2", "Bob", true),
            user("U3", "Carol", true),
            user("U4", "Dave", true),
        ];
        let predictions = vec![
            prediction("P1", "U1", Some(3)),
            prediction("P2", "U1", Some(3)),
            prediction("P3", "U2", Some(3)),
            prediction("P4", "U3", Some(3)),
            prediction("P5", "U4", Some(1)),
        ];

        let board = rank(&users, &predictions);
        let ranks: Vec<(&str, i32)> = board
            .iter()
            .map(|e| (e.user_id.as_str(), e.stats.current_rank))
            .collect();
        assert_eq!(ranks, vec![("U1", 1), ("U2", 2), ("U3", 2), ("U4", 4)]);
    }

    #[test]
    fn test_inactive_users_are_left_out() {
        let users = vec![user("U1", "Alice", false), user("U2", "Bob", true)];
        let board = rank(&users, &[prediction("P1", "U1", Some(3))]);

        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_id, "U2");
        assert_eq!(board[0].stats.total_points, 0);
        assert_eq!(board[0].stats.current_rank, 1);
    }
}
