use chrono::{DateTime, Utc};

use crate::domain::events::DomainEvent;
use crate::domain::matches::{MatchAggregate, Score};
use crate::domain::user::UserAggregate;
use crate::scoring;
use super::aggregate::PredictionAggregate;
use super::errors::PredictionError;
use super::events::{PointsAwarded, PredictionMade};

// ============================================================================
// Prediction Commands
// ============================================================================
//
// A prediction spans three aggregates: the match must still be open, the
// user must be active, and the (user, match) pair must be new. The caller
// loads all three; the decisions here are pure.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct MakePrediction {
    pub prediction_id: String,
    pub user_id: String,
    pub match_id: String,
    pub score: Score,
}

impl MakePrediction {
    pub fn handle(
        &self,
        existing: Option<&PredictionAggregate>,
        fixture: &MatchAggregate,
        user: &UserAggregate,
        already_predicted: bool,
        now: DateTime<Utc>,
    ) -> Result<DomainEvent, PredictionError> {
        if existing.is_some() {
            return Err(PredictionError::AlreadyExists(self.prediction_id.clone()));
        }
        if !self.score.is_valid() {
            return Err(PredictionError::NegativeGoals(self.score));
        }
        if fixture.status.is_terminal() {
            return Err(PredictionError::MatchClosed {
                match_id: fixture.id.clone(),
                status: fixture.status,
            });
        }
        if !user.is_active {
            return Err(PredictionError::InactiveUser(user.id.clone()));
        }
        if already_predicted {
            return Err(PredictionError::AlreadyPredicted {
                user_id: self.user_id.clone(),
                match_id: self.match_id.clone(),
            });
        }

        Ok(DomainEvent::PredictionMade(PredictionMade {
            id: self.prediction_id.clone(),
            user_id: self.user_id.clone(),
            match_id: self.match_id.clone(),
            home_goals: self.score.home_goals,
            away_goals: self.score.away_goals,
            created_at: now,
        }))
    }
}

/// Settle one prediction against its finished match.
///
/// Returns `None` when the prediction is already settled at the same
/// points, so settling twice appends nothing.
pub fn award_points(
    prediction: &PredictionAggregate,
    fixture: &MatchAggregate,
    now: DateTime<Utc>,
) -> Result<Option<DomainEvent>, PredictionError> {
    let Some(final_score) = fixture.final_score() else {
        return Err(PredictionError::NotSettled(fixture.id.clone()));
    };

    let points = scoring::score(&prediction.predicted_score(), Some(&final_score));
    if prediction.is_settled() && prediction.points == points {
        return Ok(None);
    }

    Ok(Some(DomainEvent::PointsAwarded(PointsAwarded {
        prediction_id: prediction.id.clone(),
        user_id: prediction.user_id.clone(),
        match_id: prediction.match_id.clone(),
        points,
        awarded_at: now,
    })))
}
