use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::event_sourcing::core::AggregateRef;
use super::matches::{MatchCreated, MatchScoreUpdated, MatchStatusChanged};
use super::prediction::{PointsAwarded, PredictionMade};
use super::user::{UserDeactivated, UserProfileUpdated, UserRegistered};

// ============================================================================
// Domain Event Union & Type Registry
// ============================================================================
//
// One variant per known type tag. Tags the registry does not know decode to
// `Unknown`, which every fold treats as a no-op, so readers keep working when
// a newer producer starts writing new event types.
//
// ============================================================================

pub const MATCH_CREATED: &str = "MatchCreated";
pub const MATCH_SCORE_UPDATED: &str = "MatchScoreUpdated";
pub const MATCH_STATUS_CHANGED: &str = "MatchStatusChanged";
pub const PREDICTION_MADE: &str = "PredictionMade";
pub const POINTS_AWARDED: &str = "PointsAwarded";
pub const USER_REGISTERED: &str = "UserRegistered";
pub const USER_PROFILE_UPDATED: &str = "UserProfileUpdated";
pub const USER_DEACTIVATED: &str = "UserDeactivated";

/// Payload fields the event log can look events up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKey {
    MatchId,
    UserId,
    ExternalId,
}

impl PayloadKey {
    pub const ALL: [PayloadKey; 3] = [PayloadKey::MatchId, PayloadKey::UserId, PayloadKey::ExternalId];

    /// The payload's wire field name.
    pub fn field(self) -> &'static str {
        match self {
            PayloadKey::MatchId => "matchId",
            PayloadKey::UserId => "userId",
            PayloadKey::ExternalId => "externalId",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    MatchCreated(MatchCreated),
    MatchScoreUpdated(MatchScoreUpdated),
    MatchStatusChanged(MatchStatusChanged),
    PredictionMade(PredictionMade),
    PointsAwarded(PointsAwarded),
    UserRegistered(UserRegistered),
    UserProfileUpdated(UserProfileUpdated),
    UserDeactivated(UserDeactivated),
    Unknown { event_type: String, data: Value },
}

impl DomainEvent {
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::MatchCreated(_) => MATCH_CREATED,
            DomainEvent::MatchScoreUpdated(_) => MATCH_SCORE_UPDATED,
            DomainEvent::MatchStatusChanged(_) => MATCH_STATUS_CHANGED,
            DomainEvent::PredictionMade(_) => PREDICTION_MADE,
            DomainEvent::PointsAwarded(_) => POINTS_AWARDED,
            DomainEvent::UserRegistered(_) => USER_REGISTERED,
            DomainEvent::UserProfileUpdated(_) => USER_PROFILE_UPDATED,
            DomainEvent::UserDeactivated(_) => USER_DEACTIVATED,
            DomainEvent::Unknown { event_type, .. } => event_type,
        }
    }

    /// The aggregate this event belongs to, read from the payload's single
    /// identity field. `Unknown` events carry no such knowledge.
    pub fn aggregate_ref(&self) -> Option<AggregateRef> {
        match self {
            DomainEvent::MatchCreated(e) => Some(AggregateRef::of_match(&e.id)),
            DomainEvent::MatchScoreUpdated(e) => Some(AggregateRef::of_match(&e.match_id)),
            DomainEvent::MatchStatusChanged(e) => Some(AggregateRef::of_match(&e.match_id)),
            DomainEvent::PredictionMade(e) => Some(AggregateRef::of_prediction(&e.id)),
            DomainEvent::PointsAwarded(e) => Some(AggregateRef::of_prediction(&e.prediction_id)),
            DomainEvent::UserRegistered(e) => Some(AggregateRef::of_user(&e.id)),
            DomainEvent::UserProfileUpdated(e) => Some(AggregateRef::of_user(&e.user_id)),
            DomainEvent::UserDeactivated(e) => Some(AggregateRef::of_user(&e.user_id)),
            DomainEvent::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DomainEvent::Unknown { .. })
    }

    /// Payload as a JSON object, exactly the wire field set of the tag.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            DomainEvent::MatchCreated(e) => serde_json::to_value(e),
            DomainEvent::MatchScoreUpdated(e) => serde_json::to_value(e),
            DomainEvent::MatchStatusChanged(e) => serde_json::to_value(e),
            DomainEvent::PredictionMade(e) => serde_json::to_value(e),
            DomainEvent::PointsAwarded(e) => serde_json::to_value(e),
            DomainEvent::UserRegistered(e) => serde_json::to_value(e),
            DomainEvent::UserProfileUpdated(e) => serde_json::to_value(e),
            DomainEvent::UserDeactivated(e) => serde_json::to_value(e),
            DomainEvent::Unknown { data, .. } => Ok(data.clone()),
        }
    }

    /// Decode a stored payload by its type tag.
    ///
    /// Only a recognized tag with a malformed payload fails. Unrecognized tags
    /// never fail: non-JSON data is kept verbatim as a string.
    pub fn decode(event_type: &str, data: &str) -> serde_json::Result<Self> {
        fn parse<T: DeserializeOwned>(data: &str) -> serde_json::Result<T> {
            serde_json::from_str(data)
        }

        let event = match event_type {
            MATCH_CREATED => DomainEvent::MatchCreated(parse(data)?),
            MATCH_SCORE_UPDATED => DomainEvent::MatchScoreUpdated(parse(data)?),
            MATCH_STATUS_CHANGED => DomainEvent::MatchStatusChanged(parse(data)?),
            PREDICTION_MADE => DomainEvent::PredictionMade(parse(data)?),
            POINTS_AWARDED => DomainEvent::PointsAwarded(parse(data)?),
            USER_REGISTERED => DomainEvent::UserRegistered(parse(data)?),
            USER_PROFILE_UPDATED => DomainEvent::UserProfileUpdated(parse(data)?),
            USER_DEACTIVATED => DomainEvent::UserDeactivated(parse(data)?),
            other => {
                tracing::debug!(event_type = %other, "Decoding unrecognized event type as unknown");
                DomainEvent::Unknown {
                    event_type: other.to_string(),
                    data: serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string())),
                }
            }
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchStatus;
    use crate::event_sourcing::core::AggregateKind;
    use chrono::Utc;

    #[test]
    fn test_known_tag_round_trips_through_registry() {
        let event = DomainEvent::MatchStatusChanged(MatchStatusChanged {
            match_id: "M1".to_string(),
            status: MatchStatus::Finished,
            changed_at: Utc::now(),
        });

        let json = event.to_json().unwrap().to_string();
        let decoded = DomainEvent::decode(MATCH_STATUS_CHANGED, &json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decodes_human_cased_status() {
        let json = r#"{"matchId":"M1","status":"Finished","changedAt":"2024-05-01T12:00:00Z"}"#;
        match DomainEvent::decode(MATCH_STATUS_CHANGED, json).unwrap() {
            DomainEvent::MatchStatusChanged(e) => assert_eq!(e.status, MatchStatus::Finished),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_for_known_tag_fails() {
        let json = r#"{"matchId":"M1","homeGoals":"two"}"#;
        assert!(DomainEvent::decode(MATCH_SCORE_UPDATED, json).is_err());
    }

    #[test]
    fn test_unknown_tag_is_tolerated() {
        let decoded = DomainEvent::decode("MatchPostponed", r#"{"matchId":"M1"}"#).unwrap();
        assert!(decoded.is_unknown());
        assert_eq!(decoded.event_type(), "MatchPostponed");
        assert!(decoded.aggregate_ref().is_none());

        let garbage = DomainEvent::decode("LegacyBlob", "not json at all").unwrap();
        assert_eq!(
            garbage,
            DomainEvent::Unknown {
                event_type: "LegacyBlob".to_string(),
                data: Value::String("not json at all".to_string()),
            }
        );
    }

    #[test]
    fn test_aggregate_identity_is_namespaced() {
        let prediction = DomainEvent::PredictionMade(PredictionMade {
            id: "X1".to_string(),
            user_id: "X1".to_string(),
            match_id: "X1".to_string(),
            home_goals: 0,
            away_goals: 0,
            created_at: Utc::now(),
        });

        // Shared identifier values never cause misattribution
        let aggregate = prediction.aggregate_ref().unwrap();
        assert_eq!(aggregate.kind, AggregateKind::Prediction);
        assert_ne!(aggregate, AggregateRef::of_match("X1"));
        assert_ne!(aggregate, AggregateRef::of_user("X1"));
    }
}
