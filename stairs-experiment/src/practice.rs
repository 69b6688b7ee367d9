use rand::Rng;
use stairs_core::{Condition, Difficulty, Feedback, TrialRecord};
use tracing::{debug, info};

use crate::catch::{BlockPlan, CatchScheduler};
use crate::config::TaskConfig;

/// Outcome of one practice round
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeStep {
    /// Present another practice trial.
    Continue {
        condition: Condition,
        feedback: Vec<Feedback>,
    },
    /// The block met the bar; practice records must be cleared and the
    /// staircase started.
    Promote { feedback: Vec<Feedback> },
    /// The block missed the bar; practice records must be cleared and the
    /// block restarted from round 0.
    Retry { feedback: Vec<Feedback> },
}

/// Repeats fixed-size practice blocks until one has enough correct answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeGate {
    n_practice_rounds: usize,
    n_correct: usize,
    difficulty: Difficulty,
    scheduler: CatchScheduler,
}

impl PracticeGate {
    pub fn new(
        n_practice_rounds: usize,
        n_correct: usize,
        difficulty: Difficulty,
        scheduler: CatchScheduler,
    ) -> Self {
        Self {
            n_practice_rounds,
            n_correct,
            difficulty,
            scheduler,
        }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(
            config.n_practice_rounds,
            config.n_correct,
            config.practice_difficulty(),
            CatchScheduler::new(config.block_size),
        )
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// `history` holds the practice records of the current block, most
    /// recent first. The round index is the number of such records.
    pub fn advance<R: Rng>(
        &self,
        history: &[TrialRecord],
        plan: &mut Option<BlockPlan>,
        rng: &mut R,
    ) -> PracticeStep {
        let round = history.len();

        let Some(last) = history.first() else {
            debug!("starting practice block");
            return PracticeStep::Continue {
                condition: self.next_condition(plan, rng),
                feedback: vec![Feedback::PracticeIntro {
                    rounds: self.n_practice_rounds,
                }],
            };
        };

        let answer = Feedback::Answer {
            correct: last.is_correct(),
            expected: last.expected_response.clone(),
        };

        if round % self.n_practice_rounds != 0 {
            debug!(round, "practice round");
            return PracticeStep::Continue {
                condition: self.next_condition(plan, rng),
                feedback: vec![answer],
            };
        }

        let correct = history
            .iter()
            .take(self.n_practice_rounds)
            .filter(|r| r.is_correct())
            .count();

        if correct >= self.n_correct {
            info!(correct, required = self.n_correct, "practice passed");
            PracticeStep::Promote {
                feedback: vec![answer, Feedback::PracticePassed],
            }
        } else {
            info!(correct, required = self.n_correct, "practice failed, repeating block");
            PracticeStep::Retry {
                feedback: vec![
                    answer,
                    Feedback::PracticeFailed {
                        correct,
                        required: self.n_correct,
                    },
                ],
            }
        }
    }

    fn next_condition<R: Rng>(&self, plan: &mut Option<BlockPlan>, rng: &mut R) -> Condition {
        Condition::with_kind(self.scheduler.next_kind(plan, rng), self.difficulty)
    }
}
