use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::{MatchAggregate, PredictionAggregate, UserAggregate, UserStats};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{replay_until, AggregateRef, EventEnvelope};
use crate::event_sourcing::store::load_aggregate;
use crate::projection::{Projectable, RebuildSummary};
use crate::read_model::{rank, user_stats, LeaderboardEntry, MatchFilters, PredictionFilters};
use super::TippingService;

// ============================================================================
// Queries
// ============================================================================

/// How hard a single-aggregate read checks the projection against the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Serve any existing row.
    #[default]
    Eventual,
    /// Serve the row only if its watermark matches the log's latest version.
    Strong,
}

impl TippingService {
    pub async fn get_match(&self, id: &str, consistency: Consistency) -> CoreResult<MatchAggregate> {
        self.guarded("get_match", self.read::<MatchAggregate>(id, consistency))
            .await?
            .ok_or_else(|| CoreError::NotFound(AggregateRef::of_match(id).to_string()))
    }

    pub async fn get_prediction(
        &self,
        id: &str,
        consistency: Consistency,
    ) -> CoreResult<PredictionAggregate> {
        self.guarded("get_prediction", self.read::<PredictionAggregate>(id, consistency))
            .await?
            .ok_or_else(|| CoreError::NotFound(AggregateRef::of_prediction(id).to_string()))
    }

    pub async fn get_user(&self, id: &str, consistency: Consistency) -> CoreResult<UserAggregate> {
        self.guarded("get_user", async {
            let mut users: Vec<UserAggregate> =
                self.read::<UserAggregate>(id, consistency).await?.into_iter().collect();
            // stats are best effort here
            if let Err(e) = self.attach_stats(&mut users).await {
                tracing::warn!(user_id = %id, error = %e, "Could not attach user stats");
            }
            Ok(users.pop())
        })
        .await?
        .ok_or_else(|| CoreError::NotFound(AggregateRef::of_user(id).to_string()))
    }

    /// Fill in stats and rank from the settled prediction rows. Users outside
    /// the ranking (inactive ones) keep a rank of 0.
    async fn attach_stats(&self, users: &mut [UserAggregate]) -> CoreResult<()> {
        if users.is_empty() {
            return Ok(());
        }
        let ranked = self.read_model.list_users(true).await?;
        let predictions = self
            .read_model
            .list_predictions(&PredictionFilters::default())
            .await?;
        let board: HashMap<String, UserStats> = rank(&ranked, &predictions)
            .into_iter()
            .map(|entry| (entry.user_id, entry.stats))
            .collect();

        for user in users.iter_mut() {
            user.stats = match board.get(&user.id) {
                Some(stats) => stats.clone(),
                None => user_stats(&user.id, &predictions),
            };
        }
        Ok(())
    }

    /// Row first; replay the log when the row is missing, behind the log or
    /// unreadable, and write the replayed row back.
    async fn read<A: Projectable>(&self, id: &str, consistency: Consistency) -> CoreResult<Option<A>> {
        let aggregate = AggregateRef::new(A::KIND, id);

        match A::get_row(self.read_model.as_ref(), id).await {
            Ok(Some(row)) if consistency == Consistency::Eventual => return Ok(Some(row.data)),
            Ok(Some(row)) => {
                let log_version = self.events.current_version(&aggregate).await?;
                if row.watermark.version >= log_version {
                    return Ok(Some(row.data));
                }
                tracing::debug!(
                    aggregate = %aggregate,
                    row_version = row.watermark.version,
                    log_version,
                    "Projection row behind the log, replaying"
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(aggregate = %aggregate, error = %e, "Read model unavailable, replaying");
            }
        }

        let replayed = load_aggregate::<A>(self.events.as_ref(), id).await?;
        if replayed.state.is_some() {
            if let Err(e) = self.projector.rebuild(&aggregate).await {
                tracing::warn!(aggregate = %aggregate, error = %e, "Could not heal projection row");
            }
        }
        Ok(replayed.into_state())
    }

    pub async fn list_matches(&self, filters: &MatchFilters) -> CoreResult<Vec<MatchAggregate>> {
        let rows = self
            .guarded("list_matches", self.read_model.list_matches(filters))
            .await?;
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    pub async fn list_predictions(
        &self,
        filters: &PredictionFilters,
    ) -> CoreResult<Vec<PredictionAggregate>> {
        let rows = self
            .guarded("list_predictions", self.read_model.list_predictions(filters))
            .await?;
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    pub async fn list_users(&self, active_only: bool) -> CoreResult<Vec<UserAggregate>> {
        self.guarded("list_users", async {
            let rows = self.read_model.list_users(active_only).await?;
            let mut users: Vec<UserAggregate> = rows.into_iter().map(|row| row.data).collect();
            self.attach_stats(&mut users).await?;
            Ok(users)
        })
        .await
    }

    pub async fn find_user_by_external_id(&self, external_id: &str) -> CoreResult<Option<UserAggregate>> {
        Ok(self
            .list_users(false)
            .await?
            .into_iter()
            .find(|user| user.external_id == external_id))
    }

    pub async fn leaderboard(&self) -> CoreResult<Vec<LeaderboardEntry>> {
        self.guarded("leaderboard", async {
            let users = self.read_model.list_users(true).await?;
            let predictions = self
                .read_model
                .list_predictions(&PredictionFilters::default())
                .await?;
            Ok(rank(&users, &predictions))
        })
        .await
    }

    pub async fn user_stats(&self, user_id: &str) -> CoreResult<UserStats> {
        let predictions = self
            .guarded(
                "user_stats",
                self.read_model
                    .list_predictions(&PredictionFilters::for_user(user_id)),
            )
            .await?;
        Ok(user_stats(user_id, &predictions))
    }

    /// Every event of one match, oldest first.
    pub async fn match_history(&self, match_id: &str) -> CoreResult<Vec<EventEnvelope>> {
        self.guarded(
            "match_history",
            self.events
                .events_for_aggregate(&AggregateRef::of_match(match_id)),
        )
        .await
    }

    /// The match as it stood once the log reached `sequence`.
    pub async fn match_as_of(&self, match_id: &str, sequence: i64) -> CoreResult<Option<MatchAggregate>> {
        let history = self.match_history(match_id).await?;
        Ok(replay_until::<MatchAggregate>(&history, sequence).into_state())
    }

    /// Events logged between two instants, inclusive.
    pub async fn activity(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<EventEnvelope>> {
        self.guarded("activity", self.events.events_in_range(start, end))
            .await
    }

    /// Drop the read model and rebuild it from the log. Not deadline bound.
    pub async fn rebuild_projection(&self) -> CoreResult<RebuildSummary> {
        self.projector.rebuild_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{fixture, fixture_with};
    use super::*;
    use crate::domain::{MatchStatus, Score};
    use crate::error::ErrorKind;
    use crate::event_sourcing::core::replay;
    use crate::event_sourcing::store::EventStore;
    use crate::read_model::testing::FlakyReadModel;
    use crate::read_model::{ProjectionRow, ReadModelStore};

    #[tokio::test]
    async fn test_read_heals_row_after_failed_projection() {
        let f = fixture_with(FlakyReadModel::new());
        let match_id = f.fixture_match().await;
        f.read_model.fail_writes(true);
        f.service.change_status(&match_id, MatchStatus::Live).await.unwrap();
        let receipt = f.service.update_score(&match_id, Score::new(2, 1)).await.unwrap();
        assert!(!receipt.projected);
        f.read_model.fail_writes(false);

        // the stale row is still served under eventual consistency
        let eventual = f.service.get_match(&match_id, Consistency::Eventual).await.unwrap();
        assert_eq!(eventual.status, MatchStatus::Scheduled);

        let strong = f.service.get_match(&match_id, Consistency::Strong).await.unwrap();
        assert_eq!(strong.status, MatchStatus::Live);
        assert_eq!(strong.score, Some(Score::new(2, 1)));

        let events = f
            .events
            .events_for_aggregate(&AggregateRef::of_match(&match_id))
            .await
            .unwrap();
        let replayed = ProjectionRow::from_replayed(replay::<MatchAggregate>(&events)).unwrap();
        assert_eq!(f.read_model.get_match(&match_id).await.unwrap().unwrap(), replayed);
    }

    #[tokio::test]
    async fn test_missing_row_is_replayed_and_written_back() {
        let f = fixture_with(FlakyReadModel::new());
        f.read_model.fail_writes(true);
        let user = f.user("Tipper").await;
        f.read_model.fail_writes(false);

        assert!(f.read_model.get_user(&user).await.unwrap().is_none());
        let loaded = f.service.get_user(&user, Consistency::Eventual).await.unwrap();
        assert_eq!(loaded.name, "Tipper");
        assert!(f.read_model.get_user(&user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replay_still_answers_when_heal_fails() {
        let f = fixture_with(FlakyReadModel::new());
        f.read_model.fail_writes(true);
        let match_id = f.fixture_match().await;

        let loaded = f.service.get_match(&match_id, Consistency::Strong).await.unwrap();
        assert_eq!(loaded.home_team, "Carlton");
        assert!(f.read_model.get_match(&match_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_aggregate_is_not_found() {
        let f = fixture();
        let err = f.service.get_match("missing", Consistency::Strong).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = f.service.get_prediction("missing", Consistency::Eventual).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_match_history_and_point_in_time() {
        let f = fixture();
        let match_id = f.fixture_match().await;
        let live = f.service.change_status(&match_id, MatchStatus::Live).await.unwrap();
        f.service.update_score(&match_id, Score::new(1, 0)).await.unwrap();

        let history = f.service.match_history(&match_id).await.unwrap();
        assert_eq!(history.len(), 3);

        let then = f.service.match_as_of(&match_id, live.sequence).await.unwrap().unwrap();
        assert_eq!(then.status, MatchStatus::Live);
        assert!(then.score.is_none());

        assert!(f.service.match_as_of(&match_id, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_after_settlement() {
        let f = fixture();
        let ada = f.user("Ada").await;
        let bob = f.user("Bob").await;
        let idle = f.user("Idle").await;
        let match_id = f.fixture_match().await;

        f.service.make_prediction(&ada, &match_id, Score::new(2, 1)).await.unwrap();
        f.service.make_prediction(&bob, &match_id, Score::new(1, 0)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Live).await.unwrap();
        f.service.update_score(&match_id, Score::new(2, 1)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Finished).await.unwrap();
        f.service.settle_match(&match_id).await.unwrap();

        let board = f.service.leaderboard().await.unwrap();
        let order: Vec<(&str, i32, i32)> = board
            .iter()
            .map(|entry| (entry.user_id.as_str(), entry.stats.total_points, entry.stats.current_rank))
            .collect();
        assert_eq!(order, vec![(ada.as_str(), 3, 1), (bob.as_str(), 1, 2), (idle.as_str(), 0, 3)]);

        let stats = f.service.user_stats(&bob).await.unwrap();
        assert_eq!(stats.total_predictions, 1);
        assert_eq!(stats.correct_predictions, 1);
    }

    #[tokio::test]
    async fn test_user_reads_carry_settled_stats() {
        let f = fixture();
        let ada = f.user("Ada").await;
        let bob = f.user("Bob").await;
        let match_id = f.fixture_match().await;

        f.service.make_prediction(&ada, &match_id, Score::new(3, 2)).await.unwrap();
        f.service.make_prediction(&bob, &match_id, Score::new(0, 4)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Live).await.unwrap();
        f.service.update_score(&match_id, Score::new(3, 2)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Finished).await.unwrap();
        f.service.settle_match(&match_id).await.unwrap();

        let board = f.service.leaderboard().await.unwrap();
        for consistency in [Consistency::Eventual, Consistency::Strong] {
            let user = f.service.get_user(&ada, consistency).await.unwrap();
            assert_eq!(user.stats.total_points, 3);
            assert_eq!(user.stats.correct_predictions, 1);
            assert_eq!(user.stats.total_predictions, 1);
            assert_eq!(user.stats.current_rank, board[0].stats.current_rank);
        }

        let listed = f.service.list_users(true).await.unwrap();
        let bob_listed = listed.iter().find(|user| user.id == bob).unwrap();
        assert_eq!(bob_listed.stats.total_points, 0);
        assert_eq!(bob_listed.stats.total_predictions, 1);
        assert_eq!(bob_listed.stats.current_rank, 2);

        let found = f.service.find_user_by_external_id("google-Ada").await.unwrap().unwrap();
        assert_eq!(found.stats.total_points, 3);
    }

    #[tokio::test]
    async fn test_inactive_user_keeps_stats_without_rank() {
        let f = fixture();
        let ada = f.user("Ada").await;
        let match_id = f.fixture_match().await;
        f.service.make_prediction(&ada, &match_id, Score::new(1, 0)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Live).await.unwrap();
        f.service.update_score(&match_id, Score::new(2, 0)).await.unwrap();
        f.service.change_status(&match_id, MatchStatus::Finished).await.unwrap();
        f.service.settle_match(&match_id).await.unwrap();
        f.service.deactivate_user(&ada).await.unwrap();

        let user = f.service.get_user(&ada, Consistency::Strong).await.unwrap();
        assert_eq!(user.stats.total_points, 1);
        assert_eq!(user.stats.current_rank, 0);
    }

    #[tokio::test]
    async fn test_lookup_by_external_id() {
        let f = fixture();
        let user = f.user("Tipper").await;

        let found = f.service.find_user_by_external_id("google-Tipper").await.unwrap().unwrap();
        assert_eq!(found.id, user);
        assert!(f.service.find_user_by_external_id("google-nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rebuild_projection_from_log() {
        let f = fixture();
        f.user("Tipper").await;
        let match_id = f.fixture_match().await;
        f.read_model.clear().await.unwrap();
        assert!(f.service.list_users(false).await.unwrap().is_empty());

        let summary = f.service.rebuild_projection().await.unwrap();
        assert_eq!(summary.aggregates, 2);
        assert_eq!(f.service.list_users(true).await.unwrap().len(), 1);
        let matches = f
            .service
            .list_matches(&MatchFilters {
                status: Some(MatchStatus::Scheduled),
                ..MatchFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(matches[0].id, match_id);
    }
}
