use serde::{Deserialize, Serialize};

use crate::domain::Score;

// ============================================================================
// Scoring Engine
// ============================================================================
//
// Points for one prediction against the final score of its match:
//   exact score                   -> 3
//   same result (win/draw/loss)   -> 1
//   anything else, or no result   -> 0
//
// ============================================================================

pub const EXACT_SCORE_POINTS: i32 = 3;
pub const CORRECT_OUTCOME_POINTS: i32 = 1;
pub const NO_POINTS: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    HomeWin,
    AwayWin,
    Draw,
}

impl Outcome {
    pub fn of(score: &Score) -> Self {
        match score.home_goals.cmp(&score.away_goals) {
            std::cmp::Ordering::Greater => Outcome::HomeWin,
            std::cmp::Ordering::Less => Outcome::AwayWin,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }
}

/// Points earned by `prediction`. `None` means the match has no final result.
pub fn score(prediction: &Score, final_score: Option<&Score>) -> i32 {
    let Some(actual) = final_score else {
        return NO_POINTS;
    };

    if prediction == actual {
        EXACT_SCORE_POINTS
    } else if Outcome::of(prediction) == Outcome::of(actual) {
        CORRECT_OUTCOME_POINTS
    } else {
        NO_POINTS
    }
}

/// A prediction counts as correct when it earned anything.
pub fn is_correct(points: i32) -> bool {
    points > NO_POINTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_score_earns_three() {
        assert_eq!(score(&Score::new(2, 1), Some(&Score::new(2, 1))), 3);
    }

    #[test]
    fn test_correct_outcome_earns_one() {
        assert_eq!(score(&Score::new(3, 1), Some(&Score::new(2, 1))), 1);
        assert_eq!(score(&Score::new(0, 0), Some(&Score::new(2, 2))), 1);
        assert_eq!(score(&Score::new(0, 4), Some(&Score::new(1, 2))), 1);
    }

    #[test]
    fn test_wrong_outcome_earns_nothing() {
        assert_eq!(score(&Score::new(1, 2), Some(&Score::new(2, 1))), 0);
        assert_eq!(score(&Score::new(1, 1), Some(&Score::new(2, 1))), 0);
    }

    #[test]
    fn test_missing_result_earns_nothing() {
        assert_eq!(score(&Score::new(2, 1), None), 0);
        assert_eq!(score(&Score::new(0, 0), None), 0);
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(Outcome::of(&Score::new(3, 0)), Outcome::HomeWin);
        assert_eq!(Outcome::of(&Score::new(0, 3)), Outcome::AwayWin);
        assert_eq!(Outcome::of(&Score::new(1, 1)), Outcome::Draw);
    }

    #[test]
    fn test_points_are_always_in_range() {
        for ph in 0..4 {
            for pa in 0..4 {
                for ah in 0..4 {
                    for aa in 0..4 {
                        let points = score(&Score::new(ph, pa), Some(&Score::new(ah, aa)));
                        assert!([0, 1, 3].contains(&points));
                    }
                }
            }
        }
    }
}
