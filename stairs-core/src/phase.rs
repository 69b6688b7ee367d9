use serde::{Deserialize, Serialize};

/// Defines the phases a procedure moves through and what each one allows
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn accepts_responses(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_practice(&self) -> bool {
        false
    }
    fn is_staircase(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcedurePhase {
    #[default]
    Practice,
    Staircase,
    Finished,
}

impl Phase for ProcedurePhase {
    fn accepts_responses(&self) -> bool {
        !matches!(self, Self::Finished)
    }

    fn next(&self) -> Option<Self> {
        use ProcedurePhase::*;
        Some(match self {
            Practice => Staircase,
            Staircase => Finished,
            Finished => return None,
        })
    }

    fn is_practice(&self) -> bool {
        matches!(self, ProcedurePhase::Practice)
    }

    fn is_staircase(&self) -> bool {
        matches!(self, ProcedurePhase::Staircase)
    }
}
