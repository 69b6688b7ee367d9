use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant-facing messages; the caller localizes or renders them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    PracticeIntro { rounds: usize },
    Answer { correct: bool, expected: String },
    PracticeFailed { correct: usize, required: usize },
    PracticePassed,
    ExperimentEnd,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::PracticeIntro { rounds } => {
                write!(f, "We will start with {rounds} practice trials.")
            }
            Feedback::Answer { correct: true, .. } => f.write_str("Your answer was correct."),
            Feedback::Answer {
                correct: false,
                expected,
            } => write!(f, "Your answer was incorrect. The correct answer was {expected}."),
            Feedback::PracticeFailed { correct, required } => write!(
                f,
                "You answered {correct} practice trials correctly but {required} are needed. \
                 Let's practice once more."
            ),
            Feedback::PracticePassed => {
                f.write_str("Practice complete. Now we will start the real experiment.")
            }
            Feedback::ExperimentEnd => {
                f.write_str("Thank you, this part of the experiment is over.")
            }
        }
    }
}
