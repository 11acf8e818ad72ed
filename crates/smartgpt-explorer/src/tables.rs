//! Visit and reward statistics.
//!
//! Statistics live in three flat maps keyed by state hash and by edge key,
//! so a state reached along different paths shares one entry.

use std::collections::HashMap;

/// Visit count read for an edge that has never been backed up.
/// Keeps the UCB score finite; unvisited edges are normally picked before
/// UCB is consulted anyway.
const UNVISITED_EDGE_PRIOR: f64 = 0.1;

/// Key of the edge from state `state_hash` via action `label`.
pub fn edge_key(state_hash: &str, label: &str) -> String {
    format!("{state_hash}::{label}")
}

/// One step of the path recorded during selection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathStep {
    pub state_hash: String,
    /// `None` when the path ends at the root without taking an action.
    pub label: Option<String>,
}

impl PathStep {
    pub fn edge(state_hash: String, label: &str) -> Self {
        Self {
            state_hash,
            label: Some(label.to_string()),
        }
    }

    pub fn leaf(state_hash: String) -> Self {
        Self {
            state_hash,
            label: None,
        }
    }
}

/// Snapshot of table sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorerStats {
    pub states: usize,
    pub edges: usize,
    pub iterations: u64,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct SearchTables {
    /// N(s)
    state_visits: HashMap<String, f64>,
    /// N(s,a)
    edge_visits: HashMap<String, f64>,
    /// W(s,a)
    edge_rewards: HashMap<String, f64>,
    iterations: u64,
}

impl SearchTables {
    pub fn knows_state(&self, state_hash: &str) -> bool {
        self.state_visits.contains_key(state_hash)
    }

    pub fn knows_edge(&self, state_hash: &str, label: &str) -> bool {
        self.edge_visits.contains_key(&edge_key(state_hash, label))
    }

    pub fn state_visits(&self, state_hash: &str) -> Option<f64> {
        self.state_visits.get(state_hash).copied()
    }

    pub fn edge_visits(&self, state_hash: &str, label: &str) -> Option<f64> {
        self.edge_visits.get(&edge_key(state_hash, label)).copied()
    }

    pub fn edge_reward(&self, state_hash: &str, label: &str) -> Option<f64> {
        self.edge_rewards.get(&edge_key(state_hash, label)).copied()
    }

    /// `W/N + c·sqrt(ln N(s) / N)`, reading a missing N(s,a) as 0.1,
    /// a missing N(s) as 1 and a missing W as 0.
    pub fn ucb(&self, state_hash: &str, label: &str, exploration: f64) -> f64 {
        let key = edge_key(state_hash, label);
        let n = self
            .edge_visits
            .get(&key)
            .copied()
            .unwrap_or(UNVISITED_EDGE_PRIOR);
        let w = self.edge_rewards.get(&key).copied().unwrap_or(0.0);
        let parent = self.state_visits.get(state_hash).copied().unwrap_or(1.0);

        w / n + exploration * (parent.ln() / n).sqrt()
    }

    /// Credit `reward` to every state and edge on `path`.
    pub fn backup(&mut self, path: &[PathStep], reward: f64) {
        for step in path {
            *self.state_visits.entry(step.state_hash.clone()).or_insert(0.0) += 1.0;
            if let Some(label) = &step.label {
                let key = edge_key(&step.state_hash, label);
                *self.edge_visits.entry(key.clone()).or_insert(0.0) += 1.0;
                *self.edge_rewards.entry(key).or_insert(0.0) += reward;
            }
        }
        self.iterations += 1;
    }

    pub fn stats(&self) -> ExplorerStats {
        ExplorerStats {
            states: self.state_visits.len(),
            edges: self.edge_visits.len(),
            iterations: self.iterations,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_edge_key_format() {
        assert_eq!(edge_key("root", "go"), "root::go");
    }

    #[test]
    fn test_ucb_defaults_for_unknown_edge() {
        let tables = SearchTables::default();
        // ln(1) = 0, so only the exploitation term remains and W defaults to 0
        assert_eq!(tables.ucb("s", "a", 1.414), 0.0);
    }

    #[test]
    fn test_backup_updates_every_step() {
        let mut tables = SearchTables::default();
        let path = vec![
            PathStep::edge("a".to_string(), "x"),
            PathStep::edge("b".to_string(), "y"),
        ];

        tables.backup(&path, 0.5);
        tables.backup(&path, 1.0);

        assert_eq!(tables.state_visits("a"), Some(2.0));
        assert_eq!(tables.state_visits("b"), Some(2.0));
        assert_eq!(tables.edge_visits("a", "x"), Some(2.0));
        assert_eq!(tables.edge_reward("b", "y"), Some(1.5));
        assert_eq!(tables.stats().iterations, 2);
    }

    #[test]
    fn test_leaf_step_touches_only_state() {
        let mut tables = SearchTables::default();
        tables.backup(&[PathStep::leaf("root".to_string())], 0.3);

        assert_eq!(tables.state_visits("root"), Some(1.0));
        assert_eq!(tables.stats().edges, 0);
    }

    #[test]
    fn test_ucb_matches_formula() {
        let mut tables = SearchTables::default();
        for reward in [1.0, 0.0, 1.0] {
            tables.backup(&[PathStep::edge("s".to_string(), "a")], reward);
        }

        let expected = 2.0 / 3.0 + 1.414 * (3.0f64.ln() / 3.0).sqrt();
        assert!((tables.ucb("s", "a", 1.414) - expected).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_more_reward_never_lowers_ucb(
            visits in 1u32..50,
            reward in 0.0f64..1.0,
            extra in 0.0f64..1.0,
        ) {
            let mut low = SearchTables::default();
            let mut high = SearchTables::default();
            for _ in 0..visits {
                low.backup(&[PathStep::edge("s".to_string(), "a")], reward);
                high.backup(&[PathStep::edge("s".to_string(), "a")], reward + extra);
            }
            prop_assert!(high.ucb("s", "a", 1.414) >= low.ucb("s", "a", 1.414));
        }
    }
}
