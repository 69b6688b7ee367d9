use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use stairs_core::{
    Annotation, Condition, Difficulty, Direction, Feedback, ProcedurePhase, RecordId,
    StimulusHandle, StimulusResolver, TrialRecord,
};
use stairs_experiment::{
    EngineError, FinishReason, MemoryStore, Procedure, Result, Round, SessionId, SessionState,
    SessionStore, TaskConfig, TrialHistory, TrialPresentation,
};
use stairs_timing::ManualClock;

/// Stimulus files exist for difficulties up to `max`.
struct ToneLibrary {
    max: Difficulty,
}

impl StimulusResolver for ToneLibrary {
    fn resolve(&self, condition: &Condition, difficulty: Difficulty) -> Option<StimulusHandle> {
        if difficulty > self.max {
            return None;
        }
        let expected = if condition.is_catch() { "SAME" } else { "DIFFERENT" };
        Some(StimulusHandle {
            id: format!("tone_{difficulty}.wav"),
            expected_response: expected.to_string(),
        })
    }
}

/// Wraps a `MemoryStore` and fails the next write it is told to.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_next_save: bool,
    fail_next_annotate: bool,
}

impl SessionStore for FlakyStore {
    fn load_state(&self, session: SessionId) -> Result<SessionState> {
        self.inner.load_state(session)
    }

    fn save_state(&mut self, session: SessionId, state: SessionState) -> Result<()> {
        if std::mem::take(&mut self.fail_next_save) {
            return Err(EngineError::Storage("disk full".to_string()));
        }
        self.inner.save_state(session, state)
    }
}

impl TrialHistory for FlakyStore {
    fn append(&mut self, session: SessionId, record: TrialRecord) -> Result<()> {
        self.inner.append(session, record)
    }

    fn recent_records(&self, session: SessionId, n: usize) -> Result<Vec<TrialRecord>> {
        self.inner.recent_records(session, n)
    }

    fn annotate(&mut self, session: SessionId, id: RecordId, annotation: Annotation) -> Result<()> {
        if std::mem::take(&mut self.fail_next_annotate) {
            return Err(EngineError::Storage("connection reset".to_string()));
        }
        self.inner.annotate(session, id, annotation)
    }

    fn delete_all_records(&mut self, session: SessionId) -> Result<()> {
        self.inner.delete_all_records(session)
    }
}

type Run<St> = Procedure<St, ToneLibrary, ManualClock, ChaCha8Rng>;
type TestProcedure = Run<MemoryStore>;

const SESSION: SessionId = SessionId(1);

fn config(max_turnpoints: u32, window: usize) -> TaskConfig {
    TaskConfig {
        name: "test".to_string(),
        n_practice_rounds: 2,
        n_correct: 1,
        block_size: None,
        start_difficulty: 400_000,
        practice_difficulty: None,
        increase_multiplier: 0.5,
        decrease_multiplier: 1.5,
        max_turnpoints,
        threshold_average_window: window,
    }
}

fn procedure(config: TaskConfig, max: Difficulty) -> TestProcedure {
    procedure_over(MemoryStore::new(), config, max)
}

fn procedure_over<St: SessionStore + TrialHistory>(
    store: St,
    config: TaskConfig,
    max: Difficulty,
) -> Run<St> {
    let mut procedure = Procedure::new(
        config,
        store,
        ToneLibrary { max },
        ManualClock::default(),
        ChaCha8Rng::seed_from_u64(11),
    )
    .unwrap();
    procedure.start(SESSION).unwrap();
    procedure
}

fn expect_trial(round: Round) -> TrialPresentation {
    match round {
        Round::Trial(trial) => trial,
        other => panic!("expected a trial, got {other:?}"),
    }
}

/// Answers the trial currently on screen and returns it.
fn answer<St: SessionStore + TrialHistory>(
    procedure: &mut Run<St>,
    correct: bool,
) -> TrialPresentation {
    let trial = expect_trial(procedure.next_round(SESSION).unwrap());
    let given = if correct {
        trial.stimulus.expected_response.clone()
    } else {
        "WRONG".to_string()
    };
    procedure.submit_response(SESSION, &given).unwrap();
    trial
}

/// Runs a passing practice block; leaves the first staircase trial on screen.
fn pass_practice<St: SessionStore + TrialHistory>(procedure: &mut Run<St>) -> TrialPresentation {
    let n = procedure.config.n_practice_rounds;
    for _ in 0..n {
        assert!(answer(procedure, true).is_practice);
    }
    let first = expect_trial(procedure.next_round(SESSION).unwrap());
    assert!(!first.is_practice);
    assert!(first.feedback.contains(&Feedback::PracticePassed));
    first
}

fn state<St: SessionStore + TrialHistory>(procedure: &Run<St>) -> SessionState {
    procedure.store.load_state(SESSION).unwrap()
}

#[test]
fn reversal_example_through_the_procedure() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    pass_practice(&mut procedure);

    assert_eq!(answer(&mut procedure, true).difficulty, 400_000);
    assert_eq!(answer(&mut procedure, true).difficulty, 400_000);

    let third = answer(&mut procedure, false);
    assert_eq!(third.difficulty, 200_000);

    let fourth = answer(&mut procedure, true);
    assert_eq!(fourth.difficulty, 300_000);
    let difficulty = state(&procedure).difficulty.unwrap();
    assert_eq!(difficulty.last_direction, Some(Direction::Decrease));
    assert_eq!(difficulty.turnpoint_count, 1);

    assert_eq!(answer(&mut procedure, true).difficulty, 300_000);

    let sixth = expect_trial(procedure.next_round(SESSION).unwrap());
    assert_eq!(sixth.difficulty, 150_000);
    let difficulty = state(&procedure).difficulty.unwrap();
    assert_eq!(difficulty.current_difficulty, 150_000);
    assert_eq!(difficulty.last_direction, Some(Direction::Increase));
    assert_eq!(difficulty.turnpoint_count, 2);
}

#[test]
fn terminates_after_the_last_turnpoint() {
    let mut procedure = procedure(config(2, 2), 10_000_000);
    pass_practice(&mut procedure);

    for correct in [true, true, false, true] {
        answer(&mut procedure, correct);
    }
    assert_eq!(state(&procedure).difficulty.unwrap().turnpoint_count, 1);
    answer(&mut procedure, true);

    let Round::Finished(result) = procedure.next_round(SESSION).unwrap() else {
        panic!("procedure should have converged");
    };
    assert_eq!(result.reason, FinishReason::Converged);
    assert_eq!(result.threshold.turnpoints, vec![200_000, 300_000]);
    assert_eq!(result.threshold.value, Some(250_000.0));
    assert_eq!(result.feedback.last(), Some(&Feedback::ExperimentEnd));
    assert_eq!(state(&procedure).phase, ProcedurePhase::Finished);

    // finished sessions stay finished
    assert_eq!(procedure.next_round(SESSION).unwrap(), Round::Finished(result));
    assert!(matches!(
        procedure.submit_response(SESSION, "DIFFERENT"),
        Err(EngineError::NoPendingTrial { .. })
    ));
}

#[test]
fn failed_practice_block_restarts_from_round_zero() {
    let mut config = config(8, 4);
    config.n_practice_rounds = 4;
    config.n_correct = 1;
    let mut procedure = procedure(config, 10_000_000);

    let first_attempt: Vec<_> = (0..4).map(|_| answer(&mut procedure, false)).collect();
    assert_eq!(procedure.store.records(SESSION).len(), 4);

    let Round::Notice(feedback) = procedure.next_round(SESSION).unwrap() else {
        panic!("expected the retry notice");
    };
    assert!(feedback.contains(&Feedback::PracticeFailed {
        correct: 0,
        required: 1
    }));
    assert!(procedure.store.records(SESSION).is_empty());
    assert!(!state(&procedure).practice_done());

    let restart = expect_trial(procedure.next_round(SESSION).unwrap());
    assert!(restart.is_practice);
    assert_eq!(restart.feedback, vec![Feedback::PracticeIntro { rounds: 4 }]);
    assert_eq!(restart.difficulty, first_attempt[0].difficulty);
}

#[test]
fn passing_practice_clears_its_records() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    let first = pass_practice(&mut procedure);
    assert_eq!(first.difficulty, 400_000);
    assert!(procedure.store.records(SESSION).is_empty());

    let state = state(&procedure);
    assert!(state.practice_done());
    assert_eq!(state.difficulty.unwrap().turnpoint_count, 0);
}

#[test]
fn unanswered_trial_is_presented_again_unchanged() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    pass_practice(&mut procedure);
    answer(&mut procedure, false);

    let before = state(&procedure);
    let a = expect_trial(procedure.next_round(SESSION).unwrap());
    let after_first = state(&procedure);
    let b = expect_trial(procedure.next_round(SESSION).unwrap());

    assert_eq!(a, b);
    assert_eq!(a.difficulty, 600_000);
    assert_ne!(before, after_first);
    assert_eq!(after_first, state(&procedure));
}

#[test]
fn catch_trials_never_move_the_staircase() {
    let mut config = config(6, 4);
    config.block_size = Some(3);
    let mut procedure = procedure(config, 10_000_000);
    pass_practice(&mut procedure);

    let mut previous_catch: Option<TrialPresentation> = None;
    let mut catches = 0;
    let mut trials = 0;
    loop {
        let trial = match procedure.next_round(SESSION).unwrap() {
            Round::Trial(trial) => trial,
            Round::Finished(_) => break,
            Round::Notice(n) => panic!("unexpected notice {n:?}"),
        };
        if let Some(catch) = previous_catch.take() {
            assert_eq!(trial.difficulty, catch.difficulty);
        }
        trials += 1;
        if trial.condition.is_catch() {
            catches += 1;
            previous_catch = Some(trial.clone());
        }
        // alternate answers so the staircase keeps reversing
        let given = if trials % 3 == 0 {
            "WRONG".to_string()
        } else {
            trial.stimulus.expected_response.clone()
        };
        procedure.submit_response(SESSION, &given).unwrap();
        assert!(trials < 500, "procedure did not converge");
    }

    assert!(catches > 0);
    let summary = procedure.summary(SESSION).unwrap();
    assert_eq!(summary.catch_trials, catches);
    assert_eq!(summary.turnpoints, 6);
}

#[test]
fn missing_stimulus_on_first_trial_finishes_gracefully() {
    let mut config = config(8, 4);
    config.practice_difficulty = Some(1_000);
    let mut procedure = procedure(config, 5_000);

    for _ in 0..2 {
        answer(&mut procedure, true);
    }
    let Round::Finished(result) = procedure.next_round(SESSION).unwrap() else {
        panic!("missing stimulus should end the procedure");
    };
    assert_eq!(result.reason, FinishReason::StimulusNotFound);
    assert_eq!(result.threshold.value, None);
    assert!(result.feedback.contains(&Feedback::PracticePassed));
    assert_eq!(result.feedback.last(), Some(&Feedback::ExperimentEnd));
}

#[test]
fn missing_stimulus_mid_run_keeps_partial_estimate() {
    let mut procedure = procedure(config(8, 4), 450_000);
    pass_practice(&mut procedure);

    answer(&mut procedure, true);
    answer(&mut procedure, true);
    answer(&mut procedure, false);
    assert_eq!(answer(&mut procedure, false).difficulty, 300_000);
    assert_eq!(answer(&mut procedure, false).difficulty, 450_000);

    let Round::Finished(result) = procedure.next_round(SESSION).unwrap() else {
        panic!("675000 has no stimulus");
    };
    assert_eq!(result.reason, FinishReason::StimulusNotFound);
    assert_eq!(result.threshold.turnpoints, vec![200_000]);
}

#[test]
fn staircase_without_difficulty_state_fails_loudly() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    let corrupt = SessionState {
        phase: ProcedurePhase::Staircase,
        ..SessionState::default()
    };
    procedure.store.save_state(SESSION, corrupt).unwrap();

    assert!(matches!(
        procedure.next_round(SESSION),
        Err(EngineError::MissingDifficultyState { session: SESSION })
    ));
}

#[test]
fn finished_without_result_fails_loudly() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    let corrupt = SessionState {
        phase: ProcedurePhase::Finished,
        ..SessionState::default()
    };
    procedure.store.save_state(SESSION, corrupt).unwrap();

    assert!(matches!(
        procedure.next_round(SESSION),
        Err(EngineError::MissingFinalResult { session: SESSION })
    ));
}

#[test]
fn responses_need_a_presented_trial() {
    let mut procedure = procedure(config(8, 4), 10_000_000);
    assert!(matches!(
        procedure.submit_response(SESSION, "SAME"),
        Err(EngineError::NoPendingTrial { .. })
    ));
    assert!(matches!(
        procedure.next_round(SessionId(99)),
        Err(EngineError::UnknownSession { .. })
    ));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = config(8, 4);
    config.increase_multiplier = 2.0;
    let result = Procedure::new(
        config,
        MemoryStore::new(),
        ToneLibrary { max: 1 },
        ManualClock::default(),
        ChaCha8Rng::seed_from_u64(0),
    );
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}

fn every_tone(condition: &Condition, difficulty: Difficulty) -> Option<StimulusHandle> {
    Some(StimulusHandle {
        id: format!("{difficulty}"),
        expected_response: if condition.is_catch() { "SAME" } else { "DIFFERENT" }.to_string(),
    })
}

#[test]
fn plain_functions_resolve_stimuli() {
    let mut procedure = Procedure::new(
        TaskConfig::beat_acceleration(),
        MemoryStore::new(),
        every_tone,
        ManualClock::default(),
        ChaCha8Rng::seed_from_u64(5),
    )
    .unwrap();
    procedure.start(SESSION).unwrap();

    let Round::Trial(trial) = procedure.next_round(SESSION).unwrap() else {
        panic!("practice should start with a trial");
    };
    assert!(trial.is_practice);
    assert_eq!(trial.difficulty, 40);
    assert!(trial.feedback_text().unwrap().contains("2 practice trials"));

    let record = procedure.submit_response(SESSION, &trial.stimulus.expected_response).unwrap();
    assert!(record.is_correct());
    assert!(record.created_at > 0);
}

#[test]
fn resumed_session_orders_history_by_record_id() {
    let mut first = procedure(config(8, 4), 10_000_000);
    pass_practice(&mut first);
    answer(&mut first, true);
    answer(&mut first, true);
    let moved = expect_trial(first.next_round(SESSION).unwrap());
    assert_eq!(moved.difficulty, 200_000);

    // A fresh clock stamps the next record earlier than everything before it.
    let mut resumed = Procedure::new(
        config(8, 4),
        std::mem::take(&mut first.store),
        ToneLibrary { max: 10_000_000 },
        ManualClock::default(),
        ChaCha8Rng::seed_from_u64(12),
    )
    .unwrap();
    resumed.submit_response(SESSION, "WRONG").unwrap();
    let records = resumed.store.records(SESSION);
    assert!(records.last().unwrap().created_at < records[0].created_at);

    let next = expect_trial(resumed.next_round(SESSION).unwrap());
    assert_eq!(next.difficulty, 300_000);
    let difficulty = state(&resumed).difficulty.unwrap();
    assert_eq!(difficulty.last_direction, Some(Direction::Decrease));
    assert_eq!(difficulty.turnpoint_count, 1);
}

#[test]
fn failed_state_save_does_not_consume_the_evaluation() {
    let mut procedure = procedure_over(FlakyStore::default(), config(8, 4), 10_000_000);
    pass_practice(&mut procedure);
    answer(&mut procedure, true);
    answer(&mut procedure, true);

    procedure.store.fail_next_save = true;
    assert!(matches!(
        procedure.next_round(SESSION),
        Err(EngineError::Storage(_))
    ));
    let last = procedure.store.inner.records(SESSION).last().unwrap();
    assert_eq!(last.annotation, None);

    let retried = expect_trial(procedure.next_round(SESSION).unwrap());
    assert_eq!(retried.difficulty, 200_000);
    let last = procedure.store.inner.records(SESSION).last().unwrap();
    assert_eq!(
        last.annotation,
        Some(Annotation {
            direction: Direction::Increase,
            turnpoint: false,
        })
    );
}

#[test]
fn failed_annotation_is_written_on_the_next_call() {
    let mut procedure = procedure_over(FlakyStore::default(), config(8, 4), 10_000_000);
    pass_practice(&mut procedure);
    answer(&mut procedure, true);
    answer(&mut procedure, true);

    procedure.store.fail_next_annotate = true;
    assert!(procedure.next_round(SESSION).is_err());
    assert_eq!(state(&procedure).difficulty.unwrap().current_difficulty, 200_000);
    assert_eq!(procedure.store.inner.records(SESSION).last().unwrap().annotation, None);

    let again = expect_trial(procedure.next_round(SESSION).unwrap());
    assert_eq!(again.difficulty, 200_000);
    let last = procedure.store.inner.records(SESSION).last().unwrap();
    assert_eq!(last.annotation.map(|a| a.direction), Some(Direction::Increase));
}
