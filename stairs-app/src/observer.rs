use rand::Rng;
use stairs_core::Difficulty;
use stairs_experiment::TrialPresentation;

/// Chance of a correct guess in a two-alternative task.
const GUESS_RATE: f64 = 0.5;

/// Simulated participant with a logistic psychometric function
#[derive(Debug, Clone)]
pub struct SimulatedObserver<R: Rng> {
    pub threshold: f64,
    pub slope: f64,
    pub lapse_rate: f64,
    pub rng: R,
}

impl<R: Rng> SimulatedObserver<R> {
    pub fn new(threshold: f64, slope: f64, lapse_rate: f64, rng: R) -> Self {
        Self {
            threshold,
            slope,
            lapse_rate,
            rng,
        }
    }

    /// Probability of answering a standard trial at `difficulty` correctly.
    /// Larger difficulty values are easier to detect.
    pub fn p_correct(&self, difficulty: Difficulty) -> f64 {
        if difficulty <= 0 || self.threshold <= 0.0 {
            return GUESS_RATE;
        }
        let x = (difficulty as f64 / self.threshold).ln();
        let detect = 1.0 / (1.0 + (-self.slope * x).exp());
        GUESS_RATE + (1.0 - GUESS_RATE - self.lapse_rate) * detect
    }

    pub fn respond(&mut self, trial: &TrialPresentation) -> String {
        let p = if trial.condition.is_catch() {
            1.0 - self.lapse_rate
        } else {
            self.p_correct(trial.difficulty)
        };

        if self.rng.random_bool(p.clamp(0.0, 1.0)) {
            trial.stimulus.expected_response.clone()
        } else {
            wrong_answer(&trial.stimulus.expected_response).to_string()
        }
    }
}

fn wrong_answer(expected: &str) -> &'static str {
    if expected == "SAME" { "DIFFERENT" } else { "SAME" }
}
