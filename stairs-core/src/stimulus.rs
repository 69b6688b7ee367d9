use crate::trial::{Condition, Difficulty};
use serde::{Deserialize, Serialize};

/// A resolved stimulus, plus the answer a participant should give to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusHandle {
    pub id: String,
    pub expected_response: String,
}

/// Looks up the stimulus for a condition at a difficulty.
///
/// `None` means no stimulus exists for that value, which ends the procedure.
pub trait StimulusResolver {
    fn resolve(&self, condition: &Condition, difficulty: Difficulty) -> Option<StimulusHandle>;
}

impl<F> StimulusResolver for F
where
    F: Fn(&Condition, Difficulty) -> Option<StimulusHandle>,
{
    fn resolve(&self, condition: &Condition, difficulty: Difficulty) -> Option<StimulusHandle> {
        self(condition, difficulty)
    }
}
