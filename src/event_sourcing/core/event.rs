use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::DomainEvent;
use crate::error::{CoreError, CoreResult};

// ============================================================================
// Event Envelope - immutable log record
// ============================================================================
//
// Every envelope names its aggregate explicitly as `(kind, id)`. Replay order
// is `sequence` (global, strictly increasing); `version` counts events per
// aggregate starting at 1 and is what the projector uses to detect gaps.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregateKind {
    Match,
    Prediction,
    User,
}

impl AggregateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Match => "match",
            AggregateKind::Prediction => "prediction",
            AggregateKind::User => "user",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(AggregateKind::Match),
            "prediction" => Ok(AggregateKind::Prediction),
            "user" => Ok(AggregateKind::User),
            other => Err(format!("unknown aggregate kind: {}", other)),
        }
    }
}

/// Namespaced aggregate identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateRef {
    pub kind: AggregateKind,
    pub id: String,
}

impl AggregateRef {
    pub fn new(kind: AggregateKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn of_match(id: impl Into<String>) -> Self {
        Self::new(AggregateKind::Match, id)
    }

    pub fn of_prediction(id: impl Into<String>) -> Self {
        Self::new(AggregateKind::Prediction, id)
    }

    pub fn of_user(id: impl Into<String>) -> Self {
        Self::new(AggregateKind::User, id)
    }
}

impl fmt::Display for AggregateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

/// An event that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub id: String,
    pub aggregate: AggregateRef,
    pub payload: DomainEvent,
    pub timestamp: DateTime<Utc>,
}

impl NewEvent {
    /// Wrap a known event; its aggregate comes from the payload.
    pub fn new(payload: DomainEvent) -> CoreResult<Self> {
        let aggregate = payload.aggregate_ref().ok_or_else(|| {
            CoreError::Validation(format!(
                "event type {} does not identify an aggregate",
                payload.event_type()
            ))
        })?;
        Ok(Self::for_aggregate(aggregate, payload))
    }

    /// Wrap any payload, including ones this build does not know, under an
    /// explicit aggregate.
    pub fn for_aggregate(aggregate: AggregateRef, payload: DomainEvent) -> Self {
        Self {
            id: new_event_id(),
            aggregate,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn event_type(&self) -> &str {
        self.payload.event_type()
    }

    /// Serialized payload as it is persisted.
    pub fn encode_payload(&self) -> CoreResult<String> {
        let value = self.payload.to_json().map_err(|e| {
            CoreError::Validation(format!("cannot encode {} payload: {}", self.event_type(), e))
        })?;
        Ok(value.to_string())
    }

    pub fn into_envelope(self, position: StoredPosition) -> EventEnvelope {
        EventEnvelope {
            id: self.id,
            event_type: self.payload.event_type().to_string(),
            aggregate: self.aggregate,
            sequence: position.sequence,
            version: position.version,
            timestamp: self.timestamp,
            payload: self.payload,
        }
    }
}

/// Log position assigned at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPosition {
    pub sequence: i64,
    pub version: i64,
}

/// A decoded event read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub id: String,
    pub event_type: String,
    pub aggregate: AggregateRef,
    pub sequence: i64,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub payload: DomainEvent,
}

impl EventEnvelope {
    pub fn position(&self) -> StoredPosition {
        StoredPosition {
            sequence: self.sequence,
            version: self.version,
        }
    }
}

/// Persisted row shape shared by the storage backends.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub id: String,
    pub event_type: String,
    pub aggregate_kind: String,
    pub aggregate_id: String,
    pub sequence: i64,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

impl RawEvent {
    pub fn from_new(event: &NewEvent, position: StoredPosition) -> CoreResult<Self> {
        Ok(Self {
            id: event.id.clone(),
            event_type: event.event_type().to_string(),
            aggregate_kind: event.aggregate.kind.as_str().to_string(),
            aggregate_id: event.aggregate.id.clone(),
            sequence: position.sequence,
            version: position.version,
            timestamp: event.timestamp,
            data: event.encode_payload()?,
        })
    }

    /// Decode through the type registry.
    pub fn decode(self) -> CoreResult<EventEnvelope> {
        let decode_error = |reason: String| CoreError::Decode {
            event_id: self.id.clone(),
            event_type: self.event_type.clone(),
            sequence: self.sequence,
            reason,
        };

        let kind: AggregateKind = self.aggregate_kind.parse().map_err(decode_error)?;
        let payload = DomainEvent::decode(&self.event_type, &self.data)
            .map_err(|e| decode_error(e.to_string()))?;

        Ok(EventEnvelope {
            id: self.id,
            event_type: self.event_type,
            aggregate: AggregateRef::new(kind, self.aggregate_id),
            sequence: self.sequence,
            version: self.version,
            timestamp: self.timestamp,
            payload,
        })
    }
}

/// Decode a batch; the first malformed record fails the whole batch.
pub fn decode_all(rows: Vec<RawEvent>) -> CoreResult<Vec<EventEnvelope>> {
    rows.into_iter().map(RawEvent::decode).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MatchCreated, MATCH_CREATED};
    use crate::error::ErrorKind;

    fn match_created() -> DomainEvent {
        DomainEvent::MatchCreated(MatchCreated {
            id: "M1".to_string(),
            home_team: "Team A".to_string(),
            away_team: "Team B".to_string(),
            date: Utc::now(),
            competition: "Premier League".to_string(),
        })
    }

    #[test]
    fn test_new_event_takes_aggregate_from_payload() {
        let event = NewEvent::new(match_created()).unwrap();
        assert_eq!(event.aggregate, AggregateRef::of_match("M1"));
        assert_eq!(event.event_type(), MATCH_CREATED);
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_unknown_payload_needs_explicit_aggregate() {
        let payload = DomainEvent::Unknown {
            event_type: "MatchPostponed".to_string(),
            data: serde_json::json!({}),
        };
        let err = NewEvent::new(payload.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let event = NewEvent::for_aggregate(AggregateRef::of_match("M1"), payload);
        assert_eq!(event.event_type(), "MatchPostponed");
    }

    #[test]
    fn test_raw_event_decodes_back_to_envelope() {
        let event = NewEvent::new(match_created()).unwrap().with_id("evt-1");
        let position = StoredPosition { sequence: 7, version: 1 };
        let raw = RawEvent::from_new(&event, position).unwrap();
        assert_eq!(raw.aggregate_kind, "match");

        let envelope = raw.decode().unwrap();
        assert_eq!(envelope, event.into_envelope(position));
    }

    #[test]
    fn test_batch_decode_reports_offending_record() {
        let good = RawEvent::from_new(
            &NewEvent::new(match_created()).unwrap(),
            StoredPosition { sequence: 1, version: 1 },
        )
        .unwrap();
        let mut bad = good.clone();
        bad.id = "evt-bad".to_string();
        bad.sequence = 2;
        bad.version = 2;
        bad.data = "{\"id\": 42}".to_string();

        match decode_all(vec![good, bad]) {
            Err(CoreError::Decode { event_id, sequence, .. }) => {
                assert_eq!(event_id, "evt-bad");
                assert_eq!(sequence, 2);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
