pub mod catch;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod practice;
pub mod procedure;
pub mod staircase;
pub mod store;
pub mod threshold;

pub use catch::{BlockPlan, CatchScheduler};
pub use config::TaskConfig;
pub use difficulty::{DifficultyState, TurnpointTracker};
pub use error::{EngineError, Result};
pub use practice::{PracticeGate, PracticeStep};
pub use procedure::{FinalResult, FinishReason, Procedure, Round, SessionSummary, TrialPresentation};
pub use staircase::{Decision, StaircaseController, Step};
pub use store::{MemoryStore, SessionId, SessionState, SessionStore, TrialHistory};
pub use threshold::ThresholdEstimate;
