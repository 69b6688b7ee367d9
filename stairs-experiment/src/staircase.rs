//! Transformed up-down staircase: two correct answers in a row make the next
//! trial harder, one incorrect answer makes it easier.

use stairs_core::{Annotation, Difficulty, Direction, RecordId, Score, TrialRecord, round_half_up};
use tracing::{debug, warn};

use crate::config::TaskConfig;
use crate::difficulty::{DifficultyState, TurnpointTracker};

/// Zero would be absorbing: no multiplier can move the staircase off it.
pub const MIN_DIFFICULTY: Difficulty = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Present the next trial at `difficulty`. `direction` is the move made
    /// on this step, if any.
    Continue {
        difficulty: Difficulty,
        direction: Option<Direction>,
    },
    /// The turnpoint budget is spent.
    Terminate,
}

/// Result of evaluating the latest answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub decision: Decision,
    /// Tag to persist on the record that caused a move.
    pub annotation: Option<(RecordId, Annotation)>,
}

impl Step {
    fn hold(state: &DifficultyState) -> Self {
        Self {
            decision: Decision::Continue {
                difficulty: state.current_difficulty,
                direction: None,
            },
            annotation: None,
        }
    }
}

/// How a history entry takes part in the up-down rule
enum Entry {
    Catch,
    Malformed,
    Answer(Score),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaircaseController {
    increase_multiplier: f64,
    decrease_multiplier: f64,
    tracker: TurnpointTracker,
}

impl StaircaseController {
    pub fn new(increase_multiplier: f64, decrease_multiplier: f64, max_turnpoints: u32) -> Self {
        Self {
            increase_multiplier,
            decrease_multiplier,
            tracker: TurnpointTracker::new(max_turnpoints),
        }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(
            config.increase_multiplier,
            config.decrease_multiplier,
            config.max_turnpoints,
        )
    }

    /// Evaluates the newest answer in `history` (most recent first) and
    /// updates `state` in place.
    ///
    /// Each record moves the staircase at most once: a record that already
    /// carries an annotation is treated as evaluated.
    pub fn next_difficulty(&self, state: &mut DifficultyState, history: &[TrialRecord]) -> Step {
        let Some(latest) = history.first() else {
            debug!(difficulty = state.current_difficulty, "first staircase trial");
            return Step::hold(state);
        };
        if latest.annotation.is_some() {
            return Step::hold(state);
        }

        match classify(latest) {
            Entry::Catch | Entry::Malformed => Step::hold(state),
            Entry::Answer(Score::Incorrect) => self.apply(state, latest.id, Direction::Decrease),
            Entry::Answer(Score::Correct) => {
                let previous = history[1..]
                    .iter()
                    .map(|r| (r, classify(r)))
                    .find(|(_, entry)| !matches!(entry, Entry::Catch));

                match previous {
                    Some((prev, Entry::Answer(Score::Correct))) if prev.annotation.is_none() => {
                        self.apply(state, latest.id, Direction::Increase)
                    }
                    _ => Step::hold(state),
                }
            }
            Entry::Answer(Score::CatchNeutral) => Step::hold(state),
        }
    }

    fn apply(&self, state: &mut DifficultyState, record: RecordId, direction: Direction) -> Step {
        let multiplier = match direction {
            Direction::Increase => self.increase_multiplier,
            Direction::Decrease => self.decrease_multiplier,
        };
        let difficulty =
            round_half_up(state.current_difficulty as f64 * multiplier).max(MIN_DIFFICULTY);
        let turnpoint = self.tracker.observe(state, direction);
        state.current_difficulty = difficulty;

        debug!(
            %direction,
            difficulty,
            turnpoint,
            turnpoints = state.turnpoint_count,
            "staircase moved"
        );

        let decision = if self.tracker.has_converged(state) {
            Decision::Terminate
        } else {
            Decision::Continue {
                difficulty,
                direction: Some(direction),
            }
        };

        Step {
            decision,
            annotation: Some((record, Annotation { direction, turnpoint })),
        }
    }
}

fn classify(record: &TrialRecord) -> Entry {
    if !record.is_consistent() {
        warn!(
            record = record.id.0,
            condition = ?record.condition,
            score = ?record.score,
            "inconsistent trial record, ignoring for staircase moves"
        );
        return Entry::Malformed;
    }
    if record.condition.is_catch() {
        Entry::Catch
    } else {
        Entry::Answer(record.score)
    }
}
