use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::DomainEvent;
use crate::event_sourcing::core::{Aggregate, AggregateKind, AnomalyKind};
use super::value_objects::{MatchStatus, Score};

// ============================================================================
// Match Aggregate - folded from MatchCreated / ScoreUpdated / StatusChanged
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAggregate {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub date: DateTime<Utc>,
    pub competition: String,
    pub status: MatchStatus,
    pub score: Option<Score>,
}

impl MatchAggregate {
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }

    /// Final score, only once the match is finished.
    pub fn final_score(&self) -> Option<Score> {
        if self.is_finished() {
            self.score
        } else {
            None
        }
    }
}

impl Aggregate for MatchAggregate {
    const KIND: AggregateKind = AggregateKind::Match;

    fn apply_first_event(event: &DomainEvent) -> Option<Self> {
        match event {
            DomainEvent::MatchCreated(e) => Some(Self {
                id: e.id.clone(),
                home_team: e.home_team.clone(),
                away_team: e.away_team.clone(),
                date: e.date,
                competition: e.competition.clone(),
                status: MatchStatus::Scheduled,
                score: None,
            }),
            _ => None,
        }
    }

    fn apply_event(&mut self, event: &DomainEvent) -> Option<AnomalyKind> {
        match event {
            DomainEvent::MatchCreated(_) => Some(AnomalyKind::DuplicateCreation),
            DomainEvent::MatchScoreUpdated(e) => {
                let score = e.score();
                self.score = Some(score);
                if score.is_valid() {
                    None
                } else {
                    Some(AnomalyKind::NegativeGoals(score))
                }
            }
            DomainEvent::MatchStatusChanged(e) => {
                // The log is authoritative: the move is applied even when the
                // graph forbids it, and reported to the caller.
                let from = self.status;
                self.status = e.status;
                if from.can_transition_to(e.status) {
                    None
                } else {
                    Some(AnomalyKind::IllegalStatusTransition { from, to: e.status })
                }
            }
            _ => None,
        }
    }

    fn aggregate_id(&self) -> &str {
        &self.id
    }
}
