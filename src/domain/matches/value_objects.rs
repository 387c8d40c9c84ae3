use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Match Value Objects
// ============================================================================

/// Lifecycle of a match. Legal moves form the graph
/// `Scheduled -> Live -> {Finished, Cancelled}` plus `Scheduled -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Scheduled, MatchStatus::Live)
                | (MatchStatus::Scheduled, MatchStatus::Cancelled)
                | (MatchStatus::Live, MatchStatus::Finished)
                | (MatchStatus::Live, MatchStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Cancelled)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "FINISHED" => Ok(MatchStatus::Finished),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

impl TryFrom<String> for MatchStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MatchStatus> for String {
    fn from(status: MatchStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Goals scored (or predicted) by each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub home_goals: i32,
    pub away_goals: i32,
}

impl Score {
    pub fn new(home_goals: i32, away_goals: i32) -> Self {
        Self { home_goals, away_goals }
    }

    pub fn is_valid(&self) -> bool {
        self.home_goals >= 0 && self.away_goals >= 0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home_goals, self.away_goals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!("Finished".parse::<MatchStatus>().unwrap(), MatchStatus::Finished);
        assert_eq!("LIVE".parse::<MatchStatus>().unwrap(), MatchStatus::Live);
        assert!("postponed".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&MatchStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");

        let status: MatchStatus = serde_json::from_str("\"Scheduled\"").unwrap();
        assert_eq!(status, MatchStatus::Scheduled);
    }

    #[test]
    fn test_status_transition_graph() {
        assert!(MatchStatus::Scheduled.can_transition_to(MatchStatus::Live));
        assert!(MatchStatus::Live.can_transition_to(MatchStatus::Finished));
        assert!(MatchStatus::Live.can_transition_to(MatchStatus::Cancelled));
        assert!(MatchStatus::Scheduled.can_transition_to(MatchStatus::Cancelled));

        assert!(!MatchStatus::Scheduled.can_transition_to(MatchStatus::Finished));
        assert!(!MatchStatus::Finished.can_transition_to(MatchStatus::Live));
        assert!(!MatchStatus::Cancelled.can_transition_to(MatchStatus::Scheduled));
        assert!(!MatchStatus::Live.can_transition_to(MatchStatus::Live));
    }

    #[test]
    fn test_score_validity() {
        assert!(Score::new(0, 0).is_valid());
        assert!(!Score::new(-1, 2).is_valid());
    }
}
