pub mod feedback;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use feedback::Feedback;
pub use phase::{Phase, ProcedurePhase};
pub use stimulus::{StimulusHandle, StimulusResolver};
pub use trial::{
    Annotation, Condition, Difficulty, Direction, RecordId, Score, TrialKind, TrialRecord,
    round_half_up,
};
