use rand::Rng;
use serde::{Deserialize, Serialize};
use stairs_core::{
    Condition, Difficulty, Feedback, Phase, ProcedurePhase, RecordId, StimulusHandle,
    StimulusResolver, TrialRecord,
};
use stairs_timing::Clock;
use tracing::{debug, error, info, warn};

use crate::catch::CatchScheduler;
use crate::config::TaskConfig;
use crate::difficulty::DifficultyState;
use crate::error::{EngineError, Result};
use crate::practice::{PracticeGate, PracticeStep};
use crate::staircase::{Decision, StaircaseController};
use crate::store::{SessionId, SessionState, SessionStore, TrialHistory};
use crate::threshold::ThresholdEstimate;

/// Records needed to find the last two non-catch answers. Two catch trials
/// can sit back to back across a block boundary, never three.
const STAIRCASE_LOOKBACK: usize = 4;

/// Task-agnostic parameters of the next trial to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialPresentation {
    pub condition: Condition,
    pub difficulty: Difficulty,
    pub is_practice: bool,
    pub stimulus: StimulusHandle,
    pub feedback: Vec<Feedback>,
}

impl TrialPresentation {
    pub fn feedback_text(&self) -> Option<String> {
        join_feedback(&self.feedback)
    }
}

pub fn join_feedback(feedback: &[Feedback]) -> Option<String> {
    if feedback.is_empty() {
        return None;
    }
    Some(
        feedback
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Converged,
    /// No stimulus exists for the requested difficulty.
    StimulusNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub threshold: ThresholdEstimate,
    pub reason: FinishReason,
    pub feedback: Vec<Feedback>,
}

impl FinalResult {
    pub fn feedback_text(&self) -> Option<String> {
        join_feedback(&self.feedback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Round {
    Trial(TrialPresentation),
    /// A screen without a trial, e.g. the practice retry explanation. The
    /// next call continues the procedure.
    Notice(Vec<Feedback>),
    Finished(FinalResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub phase: ProcedurePhase,
    pub trials: usize,
    pub catch_trials: usize,
    pub catch_correct: usize,
    pub turnpoints: u32,
    pub current_difficulty: Option<Difficulty>,
}

impl SessionSummary {
    /// Share of catch trials answered correctly, `None` before the first.
    pub fn catch_accuracy(&self) -> Option<f64> {
        (self.catch_trials > 0).then(|| self.catch_correct as f64 / self.catch_trials as f64)
    }
}

/// Runs practice, staircase and finalization, one round per call.
///
/// Rounds of one session must not run concurrently; the store is read and
/// written within each call.
pub struct Procedure<St, S, C, R>
where
    St: SessionStore + TrialHistory,
    S: StimulusResolver,
    C: Clock,
    R: Rng,
{
    pub config: TaskConfig,
    pub store: St,
    pub resolver: S,
    pub clock: C,
    pub rng: R,
    gate: PracticeGate,
    scheduler: CatchScheduler,
    controller: StaircaseController,
}

impl<St, S, C, R> Procedure<St, S, C, R>
where
    St: SessionStore + TrialHistory,
    S: StimulusResolver,
    C: Clock,
    R: Rng,
{
    pub fn new(config: TaskConfig, store: St, resolver: S, clock: C, rng: R) -> Result<Self> {
        config.validate()?;
        if config.has_lenient_practice_gate() {
            warn!(
                task = %config.name,
                n_correct = config.n_correct,
                n_practice_rounds = config.n_practice_rounds,
                "practice gate is lenient"
            );
        }

        Ok(Self {
            gate: PracticeGate::from_config(&config),
            scheduler: CatchScheduler::new(config.block_size),
            controller: StaircaseController::from_config(&config),
            config,
            store,
            resolver,
            clock,
            rng,
        })
    }

    /// Creates or resets a session at practice round 0.
    pub fn start(&mut self, session: SessionId) -> Result<()> {
        self.store.delete_all_records(session)?;
        self.store.save_state(session, SessionState::default())?;
        info!(%session, task = %self.config.name, "session started");
        Ok(())
    }

    pub fn next_round(&mut self, session: SessionId) -> Result<Round> {
        let mut state = self.store.load_state(session)?;

        // a previous round saved its state but may have failed to tag the record
        if let Some((id, annotation)) = state.pending_annotation.take() {
            self.store.annotate(session, id, annotation)?;
        }

        if let Some(result) = &state.final_result {
            return Ok(Round::Finished(result.clone()));
        }
        if let Some(pending) = &state.pending {
            debug!(%session, "trial still awaiting a response");
            return Ok(Round::Trial(pending.clone()));
        }

        let round = if state.phase.is_practice() {
            self.practice_round(session, &mut state)?
        } else if state.phase.is_staircase() {
            self.staircase_round(session, &mut state, Vec::new())?
        } else {
            error!(%session, "finished session has no stored result");
            return Err(EngineError::MissingFinalResult { session });
        };

        // State first: an untagged record is re-tagged on the next call, while
        // a tagged record with unsaved state would never be evaluated again.
        let annotation = state.pending_annotation;
        self.store.save_state(session, state)?;
        if let Some((id, annotation)) = annotation {
            self.store.annotate(session, id, annotation)?;
        }
        Ok(round)
    }

    /// Records the participant's answer to the pending trial.
    pub fn submit_response(&mut self, session: SessionId, given: &str) -> Result<TrialRecord> {
        let mut state = self.store.load_state(session)?;
        if !state.phase.accepts_responses() {
            return Err(EngineError::NoPendingTrial { session });
        }
        let Some(pending) = state.pending.take() else {
            return Err(EngineError::NoPendingTrial { session });
        };

        let record = TrialRecord::new(
            RecordId(state.next_record_id),
            pending.condition,
            pending.stimulus.expected_response,
            given,
            self.clock.now(),
        );
        state.next_record_id += 1;

        debug!(
            %session,
            record = record.id.0,
            condition = ?record.condition,
            score = ?record.score,
            "response recorded"
        );

        self.store.append(session, record.clone())?;
        self.store.save_state(session, state)?;
        Ok(record)
    }

    pub fn summary(&self, session: SessionId) -> Result<SessionSummary> {
        let state = self.store.load_state(session)?;
        let records = self.store.recent_records(session, usize::MAX)?;
        let catches: Vec<_> = records.iter().filter(|r| r.condition.is_catch()).collect();

        Ok(SessionSummary {
            phase: state.phase,
            trials: records.len(),
            catch_trials: catches.len(),
            catch_correct: catches.iter().filter(|r| r.is_correct()).count(),
            turnpoints: state.difficulty.as_ref().map_or(0, |d| d.turnpoint_count),
            current_difficulty: state.difficulty.as_ref().map(|d| d.current_difficulty),
        })
    }

    fn practice_round(&mut self, session: SessionId, state: &mut SessionState) -> Result<Round> {
        let history = self
            .store
            .recent_records(session, self.config.n_practice_rounds)?;

        match self.gate.advance(&history, &mut state.plan, &mut self.rng) {
            PracticeStep::Continue {
                condition,
                feedback,
            } => {
                let difficulty = self.gate.difficulty();
                self.present(session, state, condition, difficulty, true, feedback)
            }
            PracticeStep::Promote { feedback } => {
                self.store.delete_all_records(session)?;
                state.plan = None;
                if let Some(next) = state.phase.next() {
                    state.phase = next;
                }
                state.difficulty = Some(DifficultyState::new(self.config.start_difficulty));
                info!(
                    %session,
                    start_difficulty = self.config.start_difficulty,
                    "practice done, starting staircase"
                );
                self.staircase_round(session, state, feedback)
            }
            PracticeStep::Retry { feedback } => {
                self.store.delete_all_records(session)?;
                state.plan = None;
                Ok(Round::Notice(feedback))
            }
        }
    }

    fn staircase_round(
        &mut self,
        session: SessionId,
        state: &mut SessionState,
        feedback: Vec<Feedback>,
    ) -> Result<Round> {
        let Some(mut difficulty) = state.difficulty.clone() else {
            error!(%session, "staircase phase reached without a difficulty state");
            return Err(EngineError::MissingDifficultyState { session });
        };

        let history = self.store.recent_records(session, STAIRCASE_LOOKBACK)?;
        let step = self.controller.next_difficulty(&mut difficulty, &history);
        state.pending_annotation = step.annotation;
        state.difficulty = Some(difficulty);

        match step.decision {
            Decision::Terminate => self.finish(session, state, FinishReason::Converged, feedback),
            Decision::Continue {
                difficulty,
                direction,
            } => {
                if let Some(direction) = direction {
                    debug!(%session, %direction, difficulty, "difficulty moved");
                }
                let kind = self.scheduler.next_kind(&mut state.plan, &mut self.rng);
                let condition = Condition::with_kind(kind, difficulty);
                self.present(session, state, condition, difficulty, false, feedback)
            }
        }
    }

    fn present(
        &mut self,
        session: SessionId,
        state: &mut SessionState,
        condition: Condition,
        difficulty: Difficulty,
        is_practice: bool,
        feedback: Vec<Feedback>,
    ) -> Result<Round> {
        let Some(stimulus) = self.resolver.resolve(&condition, difficulty) else {
            warn!(%session, ?condition, difficulty, "no stimulus for difficulty");
            return self.finish(session, state, FinishReason::StimulusNotFound, feedback);
        };

        debug!(
            %session,
            catch = condition.is_catch(),
            difficulty,
            is_practice,
            stimulus = %stimulus.id,
            "presenting trial"
        );

        let presentation = TrialPresentation {
            condition,
            difficulty,
            is_practice,
            stimulus,
            feedback,
        };
        state.pending = Some(presentation.clone());
        Ok(Round::Trial(presentation))
    }

    fn finish(
        &mut self,
        session: SessionId,
        state: &mut SessionState,
        reason: FinishReason,
        mut feedback: Vec<Feedback>,
    ) -> Result<Round> {
        let mut records = self.store.recent_records(session, usize::MAX)?;
        if let Some((id, annotation)) = state.pending_annotation {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.annotation = Some(annotation);
            }
        }
        let threshold =
            ThresholdEstimate::from_history(&records, self.config.threshold_average_window);
        feedback.push(Feedback::ExperimentEnd);

        info!(
            %session,
            ?reason,
            threshold = ?threshold.value,
            turnpoints = ?threshold.turnpoints,
            "procedure finished"
        );

        let result = FinalResult {
            threshold,
            reason,
            feedback,
        };
        state.phase = ProcedurePhase::Finished;
        state.pending = None;
        state.final_result = Some(result.clone());
        Ok(Round::Finished(result))
    }
}
