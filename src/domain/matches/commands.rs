use chrono::{DateTime, Utc};

use crate::domain::events::DomainEvent;
use super::aggregate::MatchAggregate;
use super::errors::MatchError;
use super::events::{MatchCreated, MatchScoreUpdated, MatchStatusChanged};
use super::value_objects::{MatchStatus, Score};

// ============================================================================
// Match Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum MatchCommand {
    CreateMatch {
        match_id: String,
        home_team: String,
        away_team: String,
        date: DateTime<Utc>,
        competition: String,
    },
    UpdateScore {
        match_id: String,
        score: Score,
    },
    ChangeStatus {
        match_id: String,
        status: MatchStatus,
    },
}

impl MatchCommand {
    pub fn match_id(&self) -> &str {
        match self {
            MatchCommand::CreateMatch { match_id, .. }
            | MatchCommand::UpdateScore { match_id, .. }
            | MatchCommand::ChangeStatus { match_id, .. } => match_id,
        }
    }

    /// Validate against the current state and produce the one event the
    /// command results in.
    pub fn handle(
        &self,
        current: Option<&MatchAggregate>,
        now: DateTime<Utc>,
    ) -> Result<DomainEvent, MatchError> {
        match (self, current) {
            (MatchCommand::CreateMatch { match_id, .. }, Some(_)) => {
                Err(MatchError::AlreadyExists(match_id.clone()))
            }
            (
                MatchCommand::CreateMatch {
                    match_id,
                    home_team,
                    away_team,
                    date,
                    competition,
                },
                None,
            ) => {
                let home_team = home_team.trim();
                let away_team = away_team.trim();
                if home_team.is_empty() || away_team.is_empty() {
                    return Err(MatchError::EmptyTeam);
                }
                if home_team.eq_ignore_ascii_case(away_team) {
                    return Err(MatchError::SameTeams(home_team.to_string()));
                }

                Ok(DomainEvent::MatchCreated(MatchCreated {
                    id: match_id.clone(),
                    home_team: home_team.to_string(),
                    away_team: away_team.to_string(),
                    date: *date,
                    competition: competition.trim().to_string(),
                }))
            }

            (_, None) => Err(MatchError::NotFound(self.match_id().to_string())),

            (MatchCommand::UpdateScore { match_id, score }, Some(fixture)) => {
                if !score.is_valid() {
                    return Err(MatchError::NegativeGoals(*score));
                }
                // Finished matches still take corrections
                if !matches!(fixture.status, MatchStatus::Live | MatchStatus::Finished) {
                    return Err(MatchError::NotInPlay(fixture.status));
                }

                Ok(DomainEvent::MatchScoreUpdated(MatchScoreUpdated {
                    match_id: match_id.clone(),
                    home_goals: score.home_goals,
                    away_goals: score.away_goals,
                    updated_at: now,
                }))
            }

            (MatchCommand::ChangeStatus { match_id, status }, Some(fixture)) => {
                if !fixture.status.can_transition_to(*status) {
                    return Err(MatchError::InvalidStatusTransition {
                        from: fixture.status,
                        to: *status,
                    });
                }

                Ok(DomainEvent::MatchStatusChanged(MatchStatusChanged {
                    match_id: match_id.clone(),
                    status: *status,
                    changed_at: now,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::Aggregate;

    fn create(home: &str, away: &str) -> MatchCommand {
        MatchCommand::CreateMatch {
            match_id: "M1".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            date: Utc::now(),
            competition: "AFL".to_string(),
        }
    }

    fn fixture(status: MatchStatus) -> MatchAggregate {
        let event = create("Carlton", "Collingwood").handle(None, Utc::now()).unwrap();
        let mut fixture = MatchAggregate::apply_first_event(&event).unwrap();
        fixture.status = status;
        fixture
    }

    #[test]
    fn test_create_match_validates_teams() {
        assert!(matches!(create(" ", "Collingwood").handle(None, Utc::now()), Err(MatchError::EmptyTeam)));
        assert!(matches!(
            create("Carlton", "carlton").handle(None, Utc::now()),
            Err(MatchError::SameTeams(_))
        ));

        let existing = fixture(MatchStatus::Scheduled);
        assert!(matches!(
            create("Carlton", "Collingwood").handle(Some(&existing), Utc::now()),
            Err(MatchError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_commands_need_an_existing_match() {
        let command = MatchCommand::ChangeStatus {
            match_id: "M9".to_string(),
            status: MatchStatus::Live,
        };
        assert!(matches!(command.handle(None, Utc::now()), Err(MatchError::NotFound(id)) if id == "M9"));
    }

    #[test]
    fn test_score_requires_match_in_play() {
        let command = MatchCommand::UpdateScore {
            match_id: "M1".to_string(),
            score: Score::new(2, 1),
        };
        assert!(matches!(
            command.handle(Some(&fixture(MatchStatus::Scheduled)), Utc::now()),
            Err(MatchError::NotInPlay(MatchStatus::Scheduled))
        ));
        assert!(command.handle(Some(&fixture(MatchStatus::Live)), Utc::now()).is_ok());
        assert!(command.handle(Some(&fixture(MatchStatus::Finished)), Utc::now()).is_ok());

        let negative = MatchCommand::UpdateScore {
            match_id: "M1".to_string(),
            score: Score::new(-1, 0),
        };
        assert!(matches!(
            negative.handle(Some(&fixture(MatchStatus::Live)), Utc::now()),
            Err(MatchError::NegativeGoals(_))
        ));
    }

    #[test]
    fn test_status_change_follows_transition_graph() {
        let finish = MatchCommand::ChangeStatus {
            match_id: "M1".to_string(),
            status: MatchStatus::Finished,
        };
        assert!(matches!(
            finish.handle(Some(&fixture(MatchStatus::Scheduled)), Utc::now()),
            Err(MatchError::InvalidStatusTransition { .. })
        ));

        let event = finish.handle(Some(&fixture(MatchStatus::Live)), Utc::now()).unwrap();
        assert_eq!(event.event_type(), crate::domain::MATCH_STATUS_CHANGED);
    }
}
