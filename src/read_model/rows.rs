use serde::{Deserialize, Serialize};

use crate::domain::{MatchAggregate, PredictionAggregate, UserAggregate};
use crate::event_sourcing::core::{Aggregate, AggregateRef, Replayed, Watermark};

/// One projection row: the aggregate as last projected plus the log position
/// it reflects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRow<A> {
    pub data: A,
    pub watermark: Watermark,
}

pub type MatchRow = ProjectionRow<MatchAggregate>;
pub type PredictionRow = ProjectionRow<PredictionAggregate>;
pub type UserRow = ProjectionRow<UserAggregate>;

impl<A: Aggregate> ProjectionRow<A> {
    pub fn new(data: A, watermark: Watermark) -> Self {
        Self { data, watermark }
    }

    pub fn id(&self) -> &str {
        self.data.aggregate_id()
    }

    pub fn aggregate(&self) -> AggregateRef {
        AggregateRef::new(A::KIND, self.id())
    }

    /// Row equivalent of a replay; `None` when the aggregate was never created.
    pub fn from_replayed(replayed: Replayed<A>) -> Option<Self> {
        let watermark = replayed.watermark;
        replayed.into_state().map(|data| Self::new(data, watermark))
    }
}
