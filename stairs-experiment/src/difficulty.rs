use serde::{Deserialize, Serialize};
use stairs_core::{Difficulty, Direction};

/// Persisted staircase position of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub current_difficulty: Difficulty,
    pub last_direction: Option<Direction>,
    pub turnpoint_count: u32,
}

impl DifficultyState {
    pub fn new(start_difficulty: Difficulty) -> Self {
        Self {
            current_difficulty: start_difficulty,
            last_direction: None,
            turnpoint_count: 0,
        }
    }
}

/// Counts direction reversals.
///
/// A turnpoint is counted once, on the trial whose move flips the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnpointTracker {
    max_turnpoints: u32,
}

impl TurnpointTracker {
    pub fn new(max_turnpoints: u32) -> Self {
        Self { max_turnpoints }
    }

    /// Records a move and returns whether it reversed the previous one.
    pub fn observe(&self, state: &mut DifficultyState, direction: Direction) -> bool {
        let reversal = state.last_direction == Some(direction.opposite());
        if reversal {
            state.turnpoint_count += 1;
        }
        state.last_direction = Some(direction);
        reversal
    }

    pub fn has_converged(&self, state: &DifficultyState) -> bool {
        state.turnpoint_count >= self.max_turnpoints
    }
}
