use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use stairs_core::{Condition, Difficulty, Feedback, StimulusHandle, StimulusResolver, TrialRecord};
use stairs_experiment::{
    FinalResult, MemoryStore, Procedure, Round, SessionId, SessionSummary, TaskConfig,
};
use stairs_timing::SystemClock;
use tracing::{debug, error, info};

use crate::observer::SimulatedObserver;

/// Runs a simulated participant through an adaptive staircase task
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Built-in task preset
    #[arg(long, default_value = "duration_discrimination")]
    pub task: String,

    /// JSON or TOML task configuration (overrides --task)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for catch placement and the simulated observer
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// True threshold of the simulated observer, in task units
    #[arg(long, default_value_t = 50_000.0)]
    pub threshold: f64,

    /// Psychometric slope of the simulated observer
    #[arg(long, default_value_t = 3.0)]
    pub slope: f64,

    /// Lapse rate of the simulated observer
    #[arg(long, default_value_t = 0.02)]
    pub lapse: f64,

    /// Largest difficulty the stimulus library covers
    #[arg(long)]
    pub max_difficulty: Option<Difficulty>,

    /// Abort if the procedure has not finished after this many rounds
    #[arg(long, default_value_t = 1_000)]
    pub max_rounds: usize,

    /// Where to write the trial log
    #[arg(long, default_value = "staircase_results.json")]
    pub output: PathBuf,
}

/// Stimulus files named by task and integer difficulty
pub struct StimulusLibrary {
    task: String,
    max_difficulty: Option<Difficulty>,
}

impl StimulusResolver for StimulusLibrary {
    fn resolve(&self, condition: &Condition, difficulty: Difficulty) -> Option<StimulusHandle> {
        if difficulty < 0 || self.max_difficulty.is_some_and(|max| difficulty > max) {
            return None;
        }
        let (id, expected) = match condition {
            Condition::Catch => (format!("{}/catch_{difficulty}.wav", self.task), "SAME"),
            Condition::Standard(_) => (format!("{}/{difficulty}.wav", self.task), "DIFFERENT"),
        };
        Some(StimulusHandle {
            id,
            expected_response: expected.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Export<'a> {
    config: &'a TaskConfig,
    result: &'a FinalResult,
    summary: &'a SessionSummary,
    records: &'a [TrialRecord],
}

pub struct App {
    procedure: Procedure<MemoryStore, StimulusLibrary, SystemClock, StdRng>,
    observer: SimulatedObserver<StdRng>,
    max_rounds: usize,
    output: PathBuf,
}

const SESSION: SessionId = SessionId(1);

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => TaskConfig::load(path)
                .with_context(|| format!("Cannot load task configuration {}", path.display()))?,
            None => TaskConfig::preset(&args.task)
                .ok_or_else(|| anyhow!("Unknown task preset {:?}", args.task))?,
        };

        let library = StimulusLibrary {
            task: config.name.clone(),
            max_difficulty: args.max_difficulty,
        };
        let procedure = Procedure::new(
            config,
            MemoryStore::new(),
            library,
            SystemClock,
            StdRng::seed_from_u64(args.seed),
        )?;
        let observer = SimulatedObserver::new(
            args.threshold,
            args.slope,
            args.lapse,
            StdRng::seed_from_u64(args.seed.wrapping_add(1)),
        );

        Ok(Self {
            procedure,
            observer,
            max_rounds: args.max_rounds,
            output: args.output,
        })
    }

    pub fn run(mut self) -> Result<()> {
        println!("=== ADAPTIVE STAIRCASE SIMULATION ===");
        println!("Task: {}", self.procedure.config.name);
        println!("Observer threshold: {:.1}\n", self.observer.threshold);

        self.procedure.start(SESSION)?;

        let result = match self.drive() {
            Ok(result) => result,
            Err(e) => {
                // participants see the ordinary end screen, never the error
                error!("procedure aborted: {e:#}");
                println!("{}", Feedback::ExperimentEnd);
                return Err(e);
            }
        };

        let summary = self.procedure.summary(SESSION)?;
        self.report(&result, &summary);
        self.export(&result, &summary)?;
        Ok(())
    }

    fn drive(&mut self) -> Result<FinalResult> {
        for round in 0..self.max_rounds {
            match self.procedure.next_round(SESSION)? {
                Round::Trial(trial) => {
                    if let Some(text) = trial.feedback_text() {
                        println!("{text}");
                    }
                    let given = self.observer.respond(&trial);
                    debug!(
                        round,
                        practice = trial.is_practice,
                        difficulty = trial.difficulty,
                        stimulus = %trial.stimulus.id,
                        %given,
                        "observer answered"
                    );
                    self.procedure.submit_response(SESSION, &given)?;
                }
                Round::Notice(feedback) => {
                    for line in feedback {
                        println!("{line}");
                    }
                }
                Round::Finished(result) => return Ok(result),
            }
        }
        Err(anyhow!("procedure did not finish within {} rounds", self.max_rounds))
    }

    fn report(&self, result: &FinalResult, summary: &SessionSummary) {
        if let Some(text) = result.feedback_text() {
            println!("{text}\n");
        }
        println!("Experiment Results:");
        println!("Finished: {:?}", result.reason);
        println!(
            "Trials: {}, turnpoints: {}, catch trials: {}",
            summary.trials, summary.turnpoints, summary.catch_trials
        );
        if let Some(accuracy) = summary.catch_accuracy() {
            println!("Catch accuracy: {:.1}%", accuracy * 100.0);
        }
        match result.threshold.value {
            Some(value) => println!(
                "Threshold estimate: {:.1} (from turnpoints {:?})",
                value, result.threshold.turnpoints
            ),
            None => println!("Threshold estimate: none, no turnpoints reached"),
        }
    }

    fn export(&self, result: &FinalResult, summary: &SessionSummary) -> Result<()> {
        let export = Export {
            config: &self.procedure.config,
            result,
            summary,
            records: self.procedure.store.records(SESSION),
        };
        let file = File::create(&self.output)
            .with_context(|| format!("Cannot create result file {}", self.output.display()))?;
        serde_json::to_writer_pretty(file, &export).context("Failed to write results")?;
        info!(path = %self.output.display(), "results saved");
        println!("Results saved to {}", self.output.display());
        Ok(())
    }
}
