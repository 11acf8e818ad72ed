//! Explorer configuration parameters.

use serde::{Deserialize, Serialize};

/// Configuration for a budgeted tree search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Exploration constant `c` in the UCB1 score `W/N + c·sqrt(ln N(s) / N)`.
    pub exploration: f64,

    /// How many actions `propose` is asked for while descending the tree.
    pub propose_width: usize,

    /// How many actions `propose` is asked for when picking the final move.
    pub final_width: usize,

    /// Iterations run by [`crate::Explorer::search_with_defaults`].
    pub budget: usize,

    /// Depth limit used by [`crate::Explorer::search_with_defaults`].
    pub max_depth: usize,

    /// Extra rollout steps allowed beyond `max_depth`.
    /// With 0 a playout never runs past the depth limit, so selection that
    /// stops at `max_depth` evaluates the reached state directly.
    pub rollout_horizon: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            exploration: 1.414,
            propose_width: 16,
            final_width: 32,
            budget: 256,
            max_depth: 8,
            rollout_horizon: 0,
        }
    }
}

impl ExplorerConfig {
    /// Small, fast config for tests.
    pub fn for_testing() -> Self {
        Self {
            budget: 16,
            max_depth: 4,
            ..Self::default()
        }
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_widths(mut self, propose: usize, final_choice: usize) -> Self {
        self.propose_width = propose;
        self.final_width = final_choice;
        self
    }

    pub fn with_rollout_horizon(mut self, horizon: usize) -> Self {
        self.rollout_horizon = horizon;
        self
    }
}
