use serde::{Deserialize, Serialize};

// ============================================================================
// User Value Objects
// ============================================================================

/// Tipping statistics for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_points: i32,
    pub correct_predictions: i32,
    pub total_predictions: i32,
    pub current_rank: i32,
}

impl UserStats {
    /// Account for one settled prediction. Any non-zero award counts as correct.
    pub fn record(&mut self, points: i32) {
        self.total_points += points;
        self.total_predictions += 1;
        if crate::scoring::is_correct(points) {
            self.correct_predictions += 1;
        }
    }

    /// Percentage of settled predictions that earned points.
    pub fn success_rate(&self) -> f64 {
        if self.total_predictions == 0 {
            return 0.0;
        }
        f64::from(self.correct_predictions) / f64::from(self.total_predictions) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut stats = UserStats::default();
        stats.record(3);
        stats.record(0);

        assert_eq!(stats.total_points, 3);
        assert_eq!(stats.correct_predictions, 1);
        assert_eq!(stats.total_predictions, 2);
    }

    #[test]
    fn test_success_rate() {
        let mut stats = UserStats::default();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record(3);
        assert_eq!(stats.success_rate(), 100.0);

        stats.record(0);
        assert_eq!(stats.success_rate(), 50.0);
    }
}
