use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::DomainEvent;
use crate::domain::matches::Score;
use crate::event_sourcing::core::{Aggregate, AggregateKind, AnomalyKind};

// ============================================================================
// Prediction Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionAggregate {
    pub id: String,
    pub user_id: String,
    pub match_id: String,
    pub home_goals: i32,
    pub away_goals: i32,
    pub created_at: DateTime<Utc>,
    pub points: i32,
    /// Set once the prediction has been settled
    pub awarded_at: Option<DateTime<Utc>>,
}

impl PredictionAggregate {
    pub fn predicted_score(&self) -> Score {
        Score::new(self.home_goals, self.away_goals)
    }

    pub fn is_settled(&self) -> bool {
        self.awarded_at.is_some()
    }
}

impl Aggregate for PredictionAggregate {
    const KIND: AggregateKind = AggregateKind::Prediction;

    fn apply_first_event(event: &DomainEvent) -> Option<Self> {
        match event {
            DomainEvent::PredictionMade(e) => Some(Self {
                id: e.id.clone(),
                user_id: e.user_id.clone(),
                match_id: e.match_id.clone(),
                home_goals: e.home_goals,
                away_goals: e.away_goals,
                created_at: e.created_at,
                points: 0,
                awarded_at: None,
            }),
            _ => None,
        }
    }

    fn apply_event(&mut self, event: &DomainEvent) -> Option<AnomalyKind> {
        match event {
            DomainEvent::PredictionMade(_) => Some(AnomalyKind::DuplicateCreation),
            DomainEvent::PointsAwarded(e) => {
                self.points = e.points;
                self.awarded_at = Some(e.awarded_at);
                None
            }
            _ => None,
        }
    }

    fn aggregate_id(&self) -> &str {
        &self.id
    }
}
