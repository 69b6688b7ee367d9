use rand::Rng;
use serde::{Deserialize, Serialize};
use stairs_core::TrialKind;
use tracing::debug;

/// Upcoming trial kinds for one block, consumed from the end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPlan {
    pub pending: Vec<TrialKind>,
}

impl BlockPlan {
    /// One random draw places the single catch trial of the block.
    pub fn generate<R: Rng>(block_size: usize, rng: &mut R) -> Self {
        let catch_at = rng.random_range(0..block_size);
        let pending = (0..block_size)
            .map(|i| {
                if i == catch_at {
                    TrialKind::Catch
                } else {
                    TrialKind::Standard
                }
            })
            .collect();
        Self { pending }
    }

    pub fn pop(&mut self) -> Option<TrialKind> {
        self.pending.pop()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// Hands out catch/standard markers, regenerating the block plan as needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchScheduler {
    block_size: Option<usize>,
}

impl CatchScheduler {
    pub fn new(block_size: Option<usize>) -> Self {
        Self { block_size }
    }

    pub fn next_kind<R: Rng>(&self, plan: &mut Option<BlockPlan>, rng: &mut R) -> TrialKind {
        let Some(size) = self.block_size else {
            return TrialKind::Standard;
        };

        if plan.as_ref().is_none_or(BlockPlan::is_exhausted) {
            let fresh = BlockPlan::generate(size, rng);
            debug!(block_size = size, plan = ?fresh.pending, "generated catch-trial block");
            *plan = Some(fresh);
        }

        plan.as_mut()
            .and_then(BlockPlan::pop)
            .unwrap_or(TrialKind::Standard)
    }
}
