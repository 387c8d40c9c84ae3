use std::time::Duration;

use crate::domain::{MatchError, PredictionError, UserError};

// ============================================================================
// Core Error Taxonomy
// ============================================================================
//
// Every fallible operation of the event log, the read model and the
// projector returns `CoreError`. The outer layers only need `kind()` to pick
// a response; the message carries the detail.
//
// ============================================================================

/// Coarse classification handed to callers of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    Decode,
    Storage,
    Validation,
    Conflict,
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("failed to decode {event_type} event {event_id} (sequence {sequence}): {reason}")]
    Decode {
        event_id: String,
        event_type: String,
        sequence: i64,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("watermark conflict on {aggregate}: expected {expected}, found {found}")]
    Conflict {
        aggregate: String,
        expected: i64,
        found: i64,
    },

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Duplicate(_) => ErrorKind::Duplicate,
            CoreError::Decode { .. } => ErrorKind::Decode,
            CoreError::Storage(_) => ErrorKind::Storage,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Errors the projector resolves by re-deriving the row from the log.
    pub fn is_healable(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound(_) | CoreError::Duplicate(_) | CoreError::Conflict { .. }
        )
    }
}

impl crate::utils::IsTransient for CoreError {
    fn is_transient(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Timeout(_))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CoreError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::Duplicate(db.message().to_string())
            }
            _ => CoreError::Storage(err.to_string()),
        }
    }
}

impl From<MatchError> for CoreError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::NotFound(id) => CoreError::NotFound(format!("match {}", id)),
            MatchError::AlreadyExists(id) => CoreError::Duplicate(format!("match {}", id)),
            other => CoreError::Validation(other.to_string()),
        }
    }
}

impl From<PredictionError> for CoreError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::AlreadyPredicted { .. } | PredictionError::AlreadyExists(_) => {
                CoreError::Duplicate(err.to_string())
            }
            other => CoreError::Validation(other.to_string()),
        }
    }
}

impl From<UserError> for CoreError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => CoreError::NotFound(format!("user {}", id)),
            UserError::AlreadyExists(id) => CoreError::Duplicate(format!("user {}", id)),
            other => CoreError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchStatus;
    use crate::utils::IsTransient;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::NotFound("m1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::Timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);

        let err: CoreError = MatchError::InvalidStatusTransition {
            from: MatchStatus::Finished,
            to: MatchStatus::Live,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_transient_and_healable_classification() {
        assert!(CoreError::Storage("down".into()).is_transient());
        assert!(!CoreError::Validation("bad".into()).is_transient());
        assert!(CoreError::NotFound("row".into()).is_healable());
        assert!(!CoreError::Storage("down".into()).is_healable());
    }
}
