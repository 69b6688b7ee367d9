use std::path::Path;

use serde::{Deserialize, Serialize};
use stairs_core::Difficulty;

use crate::error::{EngineError, Result};

/// Static parameters of one adaptive task.
///
/// Every staircase task differs from the others only in these values; the
/// algorithm itself is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    /// Practice block size.
    pub n_practice_rounds: usize,
    /// Correct answers needed within one practice block to move on.
    pub n_correct: usize,
    /// Catch-trial spacing: one catch trial per block of this many trials.
    /// `None` disables catch trials.
    #[serde(default)]
    pub block_size: Option<usize>,
    pub start_difficulty: Difficulty,
    /// Difficulty used for practice trials, `start_difficulty` when unset.
    #[serde(default)]
    pub practice_difficulty: Option<Difficulty>,
    /// Applied after two correct answers in a row. Must be below 1.
    pub increase_multiplier: f64,
    /// Applied after an incorrect answer. Must be above 1.
    pub decrease_multiplier: f64,
    pub max_turnpoints: u32,
    /// Number of trailing turnpoints averaged into the threshold.
    pub threshold_average_window: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::duration_discrimination()
    }
}

impl TaskConfig {
    pub fn duration_discrimination() -> Self {
        Self {
            name: "duration_discrimination".to_string(),
            n_practice_rounds: 4,
            n_correct: 2,
            block_size: None,
            start_difficulty: 400_000,
            practice_difficulty: None,
            increase_multiplier: 0.5,
            decrease_multiplier: 1.5,
            max_turnpoints: 8,
            threshold_average_window: 6,
        }
    }

    pub fn beat_acceleration() -> Self {
        Self {
            name: "beat_acceleration".to_string(),
            n_practice_rounds: 2,
            n_correct: 1,
            block_size: Some(5),
            start_difficulty: 40,
            practice_difficulty: Some(40),
            increase_multiplier: 0.5,
            decrease_multiplier: 1.5,
            max_turnpoints: 6,
            threshold_average_window: 4,
        }
    }

    pub fn rhythm_discrimination() -> Self {
        Self {
            name: "rhythm_discrimination".to_string(),
            n_practice_rounds: 4,
            n_correct: 1,
            block_size: Some(4),
            start_difficulty: 160,
            practice_difficulty: Some(320),
            increase_multiplier: 0.5,
            decrease_multiplier: 1.5,
            max_turnpoints: 8,
            threshold_average_window: 6,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "duration_discrimination" => Some(Self::duration_discrimination()),
            "beat_acceleration" => Some(Self::beat_acceleration()),
            "rhythm_discrimination" => Some(Self::rhythm_discrimination()),
            _ => None,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file when the extension says so, JSON otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn practice_difficulty(&self) -> Difficulty {
        self.practice_difficulty.unwrap_or(self.start_difficulty)
    }

    /// True when the practice bar is below `n_practice_rounds - 1`.
    ///
    /// Several tasks ship such bars; they are kept as configured and only
    /// reported.
    pub fn has_lenient_practice_gate(&self) -> bool {
        self.n_correct + 1 < self.n_practice_rounds
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EngineError::InvalidConfig(format!("{}: {msg}", self.name)));

        if self.n_practice_rounds == 0 {
            return fail("n_practice_rounds must be at least 1".into());
        }
        if self.n_correct > self.n_practice_rounds {
            return fail(format!(
                "n_correct ({}) exceeds n_practice_rounds ({})",
                self.n_correct, self.n_practice_rounds
            ));
        }
        if self.start_difficulty <= 0 {
            return fail(format!(
                "start_difficulty must be positive, got {}",
                self.start_difficulty
            ));
        }
        if self.practice_difficulty() <= 0 {
            return fail(format!(
                "practice_difficulty must be positive, got {}",
                self.practice_difficulty()
            ));
        }
        if let Some(size) = self.block_size {
            if size < 2 {
                return fail(format!("block_size must be at least 2, got {size}"));
            }
        }
        if !(self.increase_multiplier > 0.0 && self.increase_multiplier < 1.0) {
            return fail(format!(
                "increase_multiplier must be in (0, 1), got {}",
                self.increase_multiplier
            ));
        }
        if !(self.decrease_multiplier > 1.0 && self.decrease_multiplier.is_finite()) {
            return fail(format!(
                "decrease_multiplier must be above 1, got {}",
                self.decrease_multiplier
            ));
        }
        if self.max_turnpoints == 0 {
            return fail("max_turnpoints must be at least 1".into());
        }
        if self.threshold_average_window == 0
            || self.threshold_average_window > self.max_turnpoints as usize
        {
            return fail(format!(
                "threshold_average_window must be in 1..={}, got {}",
                self.max_turnpoints, self.threshold_average_window
            ));
        }
        Ok(())
    }
}
