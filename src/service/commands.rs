use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::domain::{
    award_points, DomainEvent, MakePrediction, MatchAggregate, MatchCommand, MatchError,
    MatchStatus, PayloadKey, PredictionAggregate, PredictionError, Score, UserAggregate,
    UserCommand, UserError, PREDICTION_MADE, USER_REGISTERED,
};
use crate::error::CoreResult;
use crate::event_sourcing::core::{new_event_id, AggregateRef};
use crate::event_sourcing::store::load_aggregate;
use super::{Receipt, Settlement, TippingService};

// ============================================================================
// Commands
// ============================================================================
//
// Every write holds the per-aggregate write lock while it loads state from
// the log, decides and appends, so two writers never validate against the
// same version. Predictions and settlement lock their match, which orders
// them against status changes.
//
// ============================================================================

impl TippingService {
    pub async fn create_match(
        &self,
        home_team: &str,
        away_team: &str,
        date: DateTime<Utc>,
        competition: &str,
    ) -> CoreResult<Receipt> {
        self.handle_match(MatchCommand::CreateMatch {
            match_id: new_event_id(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            date,
            competition: competition.to_string(),
        })
        .await
    }

    pub async fn update_score(&self, match_id: &str, score: Score) -> CoreResult<Receipt> {
        self.handle_match(MatchCommand::UpdateScore {
            match_id: match_id.to_string(),
            score,
        })
        .await
    }

    pub async fn change_status(&self, match_id: &str, status: MatchStatus) -> CoreResult<Receipt> {
        self.handle_match(MatchCommand::ChangeStatus {
            match_id: match_id.to_string(),
            status,
        })
        .await
    }

    pub async fn handle_match(&self, command: MatchCommand) -> CoreResult<Receipt> {
        self.guarded("match_command", async {
            let aggregate = AggregateRef::of_match(command.match_id());
            let _guard = self.writes.lock(&aggregate).await;

            let current =
                load_aggregate::<MatchAggregate>(self.events.as_ref(), &aggregate.id).await?;
            let event = command.handle(current.state.as_ref(), Utc::now())?;
            self.commit(event).await
        })
        .await
    }

    pub async fn register_user(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        picture: &str,
    ) -> CoreResult<Receipt> {
        self.handle_user(UserCommand::Register {
            user_id: new_event_id(),
            external_id: external_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            picture: picture.to_string(),
        })
        .await
    }

    pub async fn update_profile(&self, user_id: &str, name: &str, picture: &str) -> CoreResult<Receipt> {
        self.handle_user(UserCommand::UpdateProfile {
            user_id: user_id.to_string(),
            name: name.to_string(),
            picture: picture.to_string(),
        })
        .await
    }

    pub async fn deactivate_user(&self, user_id: &str) -> CoreResult<Receipt> {
        self.handle_user(UserCommand::Deactivate {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn handle_user(&self, command: UserCommand) -> CoreResult<Receipt> {
        self.guarded("user_command", async {
            // external ids are unique across users
            let _registration = match &command {
                UserCommand::Register { external_id, .. } => {
                    let guard = self.registrations.lock().await;
                    if self.registered_user(external_id).await?.is_some() {
                        return Err(UserError::AlreadyExists(external_id.clone()).into());
                    }
                    Some(guard)
                }
                _ => None,
            };

            let aggregate = AggregateRef::of_user(command.user_id());
            let _guard = self.writes.lock(&aggregate).await;

            let current =
                load_aggregate::<UserAggregate>(self.events.as_ref(), &aggregate.id).await?;
            let event = command.handle(current.state.as_ref(), Utc::now())?;
            self.commit(event).await
        })
        .await
    }

    /// Id of the user registered under `external_id`, registering them on
    /// first sight. Returning sign-ins get their existing account back.
    pub async fn ensure_user(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        picture: &str,
    ) -> CoreResult<String> {
        let existing = self
            .guarded("ensure_user", self.registered_user(external_id))
            .await?;
        if let Some(user_id) = existing {
            return Ok(user_id);
        }
        Ok(self
            .register_user(external_id, email, name, picture)
            .await?
            .aggregate
            .id)
    }

    async fn registered_user(&self, external_id: &str) -> CoreResult<Option<String>> {
        let registered = self
            .events
            .events_by_key(USER_REGISTERED, PayloadKey::ExternalId, external_id)
            .await?;
        Ok(registered.into_iter().find_map(|envelope| match envelope.payload {
            DomainEvent::UserRegistered(e) if e.external_id == external_id => Some(e.id),
            _ => None,
        }))
    }

    pub async fn make_prediction(
        &self,
        user_id: &str,
        match_id: &str,
        score: Score,
    ) -> CoreResult<Receipt> {
        self.handle_prediction(MakePrediction {
            prediction_id: new_event_id(),
            user_id: user_id.to_string(),
            match_id: match_id.to_string(),
            score,
        })
        .await
    }

    pub async fn handle_prediction(&self, command: MakePrediction) -> CoreResult<Receipt> {
        self.guarded("prediction_command", async {
            let match_ref = AggregateRef::of_match(&command.match_id);
            let _guard = self.writes.lock(&match_ref).await;

            let fixture = load_aggregate::<MatchAggregate>(self.events.as_ref(), &command.match_id)
                .await?
                .into_state()
                .ok_or_else(|| MatchError::NotFound(command.match_id.clone()))?;
            let user = load_aggregate::<UserAggregate>(self.events.as_ref(), &command.user_id)
                .await?
                .into_state()
                .ok_or_else(|| UserError::NotFound(command.user_id.clone()))?;
            let existing =
                load_aggregate::<PredictionAggregate>(self.events.as_ref(), &command.prediction_id)
                    .await?;
            let already_predicted = self
                .predictions_for_match(&command.match_id)
                .await?
                .iter()
                .any(|(_, user_id)| *user_id == command.user_id);

            let event = command.handle(
                existing.state.as_ref(),
                &fixture,
                &user,
                already_predicted,
                Utc::now(),
            )?;
            self.commit(event).await
        })
        .await
    }

    /// `(prediction_id, user_id)` of every prediction made on a match.
    async fn predictions_for_match(&self, match_id: &str) -> CoreResult<BTreeSet<(String, String)>> {
        let made = self
            .events
            .events_by_key(PREDICTION_MADE, PayloadKey::MatchId, match_id)
            .await?;
        Ok(made
            .into_iter()
            .filter_map(|envelope| match envelope.payload {
                DomainEvent::PredictionMade(e) if e.match_id == match_id => Some((e.id, e.user_id)),
                _ => None,
            })
            .collect())
    }

    /// Score every prediction on a finished match and append `PointsAwarded`
    /// for each one whose points changed. Safe to run again.
    pub async fn settle_match(&self, match_id: &str) -> CoreResult<Settlement> {
        self.guarded("settle_match", async {
            let match_ref = AggregateRef::of_match(match_id);
            let _guard = self.writes.lock(&match_ref).await;

            let fixture = load_aggregate::<MatchAggregate>(self.events.as_ref(), match_id)
                .await?
                .into_state()
                .ok_or_else(|| MatchError::NotFound(match_id.to_string()))?;
            let final_score = fixture
                .final_score()
                .ok_or_else(|| PredictionError::NotSettled(match_id.to_string()))?;

            let mut settlement = Settlement {
                match_id: match_id.to_string(),
                final_score,
                awarded: Vec::new(),
                unchanged: 0,
            };

            for (prediction_id, _) in self.predictions_for_match(match_id).await? {
                let Some(prediction) =
                    load_aggregate::<PredictionAggregate>(self.events.as_ref(), &prediction_id)
                        .await?
                        .into_state()
                else {
                    continue;
                };

                match award_points(&prediction, &fixture, Utc::now())? {
                    Some(event) => settlement.awarded.push(self.commit(event).await?),
                    None => settlement.unchanged += 1,
                }
            }

            tracing::info!(
                match_id = %match_id,
                final_score = %final_score,
                awarded = settlement.awarded.len(),
                unchanged = settlement.unchanged,
                "Match settled"
            );
            Ok(settlement)
        })
        .await
    }
}
