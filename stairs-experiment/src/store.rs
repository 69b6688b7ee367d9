use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use stairs_core::{Annotation, Phase, ProcedurePhase, RecordId, TrialRecord};

use crate::catch::BlockPlan;
use crate::difficulty::DifficultyState;
use crate::error::{EngineError, Result};
use crate::procedure::{FinalResult, TrialPresentation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the engine persists per session between rounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: ProcedurePhase,
    /// Set when the staircase phase begins.
    pub difficulty: Option<DifficultyState>,
    pub plan: Option<BlockPlan>,
    /// Presented trial still waiting for an answer.
    pub pending: Option<TrialPresentation>,
    /// Tag for the record evaluated this round, written to the history
    /// only after this state is saved.
    pub pending_annotation: Option<(RecordId, Annotation)>,
    pub next_record_id: u64,
    pub final_result: Option<FinalResult>,
}

impl SessionState {
    pub fn practice_done(&self) -> bool {
        !self.phase.is_practice()
    }
}

/// Per-session state persistence. Each call is assumed atomic; callers
/// serialize rounds of the same session.
pub trait SessionStore {
    fn load_state(&self, session: SessionId) -> Result<SessionState>;
    fn save_state(&mut self, session: SessionId, state: SessionState) -> Result<()>;
}

/// Trial records of a session
pub trait TrialHistory {
    fn append(&mut self, session: SessionId, record: TrialRecord) -> Result<()>;
    /// Up to `n` records, most recent first. `RecordId` is the ordering key:
    /// ids come from the persisted session counter, while `created_at` may
    /// come from clocks on different hosts.
    fn recent_records(&self, session: SessionId, n: usize) -> Result<Vec<TrialRecord>>;
    fn annotate(&mut self, session: SessionId, id: RecordId, annotation: Annotation) -> Result<()>;
    fn delete_all_records(&mut self, session: SessionId) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: HashMap<SessionId, SessionState>,
    records: HashMap<SessionId, Vec<TrialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of a session in the order they were appended.
    pub fn records(&self, session: SessionId) -> &[TrialRecord] {
        self.records.get(&session).map(Vec::as_slice).unwrap_or_default()
    }
}

impl SessionStore for MemoryStore {
    fn load_state(&self, session: SessionId) -> Result<SessionState> {
        self.states
            .get(&session)
            .cloned()
            .ok_or(EngineError::UnknownSession { session })
    }

    fn save_state(&mut self, session: SessionId, state: SessionState) -> Result<()> {
        self.states.insert(session, state);
        Ok(())
    }
}

impl TrialHistory for MemoryStore {
    fn append(&mut self, session: SessionId, record: TrialRecord) -> Result<()> {
        self.records.entry(session).or_default().push(record);
        Ok(())
    }

    fn recent_records(&self, session: SessionId, n: usize) -> Result<Vec<TrialRecord>> {
        let mut records: Vec<TrialRecord> = self.records(session).to_vec();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        records.truncate(n);
        Ok(records)
    }

    fn annotate(&mut self, session: SessionId, id: RecordId, annotation: Annotation) -> Result<()> {
        let record = self
            .records
            .get_mut(&session)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| {
                EngineError::Storage(format!("no record {} in session {session}", id.0))
            })?;
        record.annotation = Some(annotation);
        Ok(())
    }

    fn delete_all_records(&mut self, session: SessionId) -> Result<()> {
        self.records.remove(&session);
        Ok(())
    }
}
