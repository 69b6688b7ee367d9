use serde::{Deserialize, Serialize};
use std::fmt;

/// Stimulus difficulty in task units (ms, dB, time offsets). Lower is harder.
pub type Difficulty = i64;

/// Rounds half away from negative infinity, i.e. `2.5 -> 3` and `-2.5 -> -2`.
///
/// Stimulus files are looked up by exact integer name, so this must not be
/// banker's rounding.
pub fn round_half_up(value: f64) -> Difficulty {
    (value + 0.5).floor() as Difficulty
}

/// Marker drawn from a block plan before a difficulty is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialKind {
    Catch,
    Standard,
}

/// What was actually presented on a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Catch,
    Standard(Difficulty),
}

impl Condition {
    pub fn with_kind(kind: TrialKind, difficulty: Difficulty) -> Self {
        match kind {
            TrialKind::Catch => Condition::Catch,
            TrialKind::Standard => Condition::Standard(difficulty),
        }
    }

    pub fn is_catch(&self) -> bool {
        matches!(self, Condition::Catch)
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        match self {
            Condition::Catch => None,
            Condition::Standard(d) => Some(*d),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Correct,
    Incorrect,
    /// Catch trials are scored but never move the staircase.
    CatchNeutral,
}

impl Score {
    pub fn derive(condition: &Condition, expected: &str, given: &str) -> Self {
        match condition {
            Condition::Catch => Score::CatchNeutral,
            Condition::Standard(_) if expected == given => Score::Correct,
            Condition::Standard(_) => Score::Incorrect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Increase => Direction::Decrease,
            Direction::Decrease => Direction::Increase,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => f.write_str("increase"),
            Direction::Decrease => f.write_str("decrease"),
        }
    }
}

/// Tag left on the record whose answer moved the difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub direction: Direction,
    pub turnpoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

/// One answered trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: RecordId,
    pub condition: Condition,
    pub expected_response: String,
    pub given_response: String,
    pub score: Score,
    pub annotation: Option<Annotation>,
    pub created_at: u64,
}

impl TrialRecord {
    pub fn new(
        id: RecordId,
        condition: Condition,
        expected_response: impl Into<String>,
        given_response: impl Into<String>,
        created_at: u64,
    ) -> Self {
        let expected_response = expected_response.into();
        let given_response = given_response.into();
        let score = Score::derive(&condition, &expected_response, &given_response);
        Self {
            id,
            condition,
            expected_response,
            given_response,
            score,
            annotation: None,
            created_at,
        }
    }

    /// Whether the participant gave the expected answer, catch trials included
    pub fn is_correct(&self) -> bool {
        self.expected_response == self.given_response
    }

    /// False when the stored score disagrees with the condition and answers,
    /// e.g. a catch trial scored as `Correct`.
    pub fn is_consistent(&self) -> bool {
        self.score == Score::derive(&self.condition, &self.expected_response, &self.given_response)
    }

    pub fn is_turnpoint(&self) -> bool {
        self.annotation.is_some_and(|a| a.turnpoint)
    }
}
