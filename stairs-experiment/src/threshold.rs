use serde::{Deserialize, Serialize};
use stairs_core::{Difficulty, TrialRecord};

/// Reported perceptual threshold: the mean difficulty over the last turnpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEstimate {
    /// Turnpoint difficulties used, oldest first.
    pub turnpoints: Vec<Difficulty>,
    /// `None` when the procedure stopped before any turnpoint.
    pub value: Option<f64>,
}

impl ThresholdEstimate {
    /// `turnpoints` in chronological order. Averages the last `window`
    /// values, or all of them when fewer exist.
    pub fn from_turnpoints(turnpoints: &[Difficulty], window: usize) -> Self {
        let start = turnpoints.len().saturating_sub(window);
        let used = turnpoints[start..].to_vec();
        let value = if used.is_empty() {
            None
        } else {
            Some(used.iter().map(|d| *d as f64).sum::<f64>() / used.len() as f64)
        };
        Self {
            turnpoints: used,
            value,
        }
    }

    /// `records` most recent first, as returned by the history reader.
    pub fn from_history(records: &[TrialRecord], window: usize) -> Self {
        let mut turnpoints: Vec<Difficulty> = records
            .iter()
            .filter(|r| r.is_turnpoint())
            .filter_map(|r| r.condition.difficulty())
            .take(window)
            .collect();
        turnpoints.reverse();
        Self::from_turnpoints(&turnpoints, window)
    }

    pub fn empty() -> Self {
        Self {
            turnpoints: Vec::new(),
            value: None,
        }
    }
}
