//! Budgeted UCB1 tree search.
//!
//! Each iteration:
//! 1. Selection: descend from the root, taking the first never-tried action
//!    or else the action with the highest UCB1 score
//! 2. Expansion: a state missing from the visit table is evaluated, the
//!    reward is backed up along the path and the iteration ends. The state
//!    itself is not entered, so selection only descends through states that
//!    were on an earlier path
//! 3. Rollout: otherwise play out with the rollout policy until terminal or
//!    out of depth, then evaluate the final state
//! 4. Backup: add one visit and the reward to every state and edge on the path
//!
//! Every iteration calls `evaluate` exactly once.

use std::marker::PhantomData;

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::config::ExplorerConfig;
use crate::policy::{Evaluate, Propose, Rollout};
use crate::state::{Action, State};
use crate::tables::{ExplorerStats, PathStep, SearchTables};

/// Errors that abort a search. Partial statistics from completed
/// iterations are kept.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("propose failed: {0}")]
    Propose(#[source] anyhow::Error),

    #[error("evaluate failed: {0}")]
    Evaluate(#[source] anyhow::Error),

    #[error("rollout failed: {0}")]
    Rollout(#[source] anyhow::Error),
}

impl From<ExplorerError> for smartgpt_common::SmartError {
    fn from(err: ExplorerError) -> Self {
        smartgpt_common::SmartError::Exploration(Box::new(err))
    }
}

/// How a single iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Iteration {
    /// A never-seen state was evaluated
    Expanded,
    /// `propose` had nothing to offer below the root or an inner state
    DeadEnd,
    /// Selection ran out of depth or hit a terminal state
    PlayedOut { rollout_steps: usize },
}

/// Monte Carlo Tree Search driven by caller-supplied callbacks.
///
/// Statistics persist across calls to [`Explorer::search`] until
/// [`Explorer::reset`], so repeated searches from related roots reuse work.
pub struct Explorer<S, P, E, R> {
    propose: P,
    evaluate: E,
    rollout: R,
    config: ExplorerConfig,
    tables: SearchTables,
    _state: PhantomData<fn() -> S>,
}

impl<S, P, E, R> Explorer<S, P, E, R>
where
    S: State,
    P: Propose<S>,
    E: Evaluate<S>,
    R: Rollout<S>,
{
    pub fn new(propose: P, evaluate: E, rollout: R, config: ExplorerConfig) -> Self {
        Self {
            propose,
            evaluate,
            rollout,
            config,
            tables: SearchTables::default(),
            _state: PhantomData,
        }
    }

    /// Run `budget` iterations from `root` and return the state reached by
    /// the most-visited root action. Ties go to the action proposed first;
    /// with no proposed actions the root itself is returned.
    #[instrument(skip(self, root), fields(root_hash = %root.hash()))]
    pub async fn search(
        &mut self,
        root: &S,
        budget: usize,
        max_depth: usize,
    ) -> Result<S, ExplorerError> {
        let mut expanded = 0usize;
        let mut rollout_steps = 0usize;
        for _ in 0..budget {
            match self.iterate(root, max_depth).await? {
                Iteration::Expanded => expanded += 1,
                Iteration::PlayedOut { rollout_steps: steps } => rollout_steps += steps,
                Iteration::DeadEnd => {}
            }
        }
        debug!(
            expanded,
            rollout_steps,
            states = self.tables.stats().states,
            "Search budget spent"
        );

        self.choose(root).await
    }

    /// [`Explorer::search`] with the configured budget and depth.
    pub async fn search_with_defaults(&mut self, root: &S) -> Result<S, ExplorerError> {
        let (budget, max_depth) = (self.config.budget, self.config.max_depth);
        self.search(root, budget, max_depth).await
    }

    async fn iterate(&mut self, root: &S, max_depth: usize) -> Result<Iteration, ExplorerError> {
        let mut path = Vec::new();
        let mut state = root.clone();
        let mut dead_end = false;

        while path.len() < max_depth && !state.terminal() {
            let actions = self
                .propose
                .propose(&state, self.config.propose_width)
                .await
                .map_err(ExplorerError::Propose)?;

            let hash = state.hash();
            let Some(action) = self.select(&hash, &actions) else {
                dead_end = true;
                break;
            };
            path.push(PathStep::edge(hash, action.label()));
            state = action.apply(&state);

            let reached = state.hash();
            if !self.tables.knows_state(&reached) {
                let reward = self.score(&state).await?;
                // only path states are credited; `reached` stays unknown
                self.tables.backup(&path, reward);
                trace!(depth = path.len(), reward, "Expanded new state");
                return Ok(Iteration::Expanded);
            }
        }

        let mut rollout_steps = 0;
        if !dead_end {
            let horizon = max_depth.saturating_add(self.config.rollout_horizon);
            while !state.terminal() && path.len() + rollout_steps < horizon {
                let action = self
                    .rollout
                    .rollout(&state)
                    .await
                    .map_err(ExplorerError::Rollout)?;
                state = action.apply(&state);
                rollout_steps += 1;
            }
        }

        let reward = self.score(&state).await?;
        if path.is_empty() {
            path.push(PathStep::leaf(root.hash()));
        }
        self.tables.backup(&path, reward);
        trace!(depth = path.len(), rollout_steps, reward, "Iteration backed up");

        Ok(if dead_end {
            Iteration::DeadEnd
        } else {
            Iteration::PlayedOut { rollout_steps }
        })
    }

    /// First never-tried action, else highest UCB (first wins ties).
    fn select<'a>(&self, state_hash: &str, actions: &'a [Action<S>]) -> Option<&'a Action<S>> {
        if let Some(untried) = actions
            .iter()
            .find(|a| !self.tables.knows_edge(state_hash, a.label()))
        {
            return Some(untried);
        }

        let c = self.config.exploration;
        let mut best: Option<(&Action<S>, f64)> = None;
        for action in actions {
            let score = self.tables.ucb(state_hash, action.label(), c);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((action, score)),
            }
        }
        best.map(|(action, _)| action)
    }

    async fn choose(&self, root: &S) -> Result<S, ExplorerError> {
        let actions = self
            .propose
            .propose(root, self.config.final_width)
            .await
            .map_err(ExplorerError::Propose)?;

        let hash = root.hash();
        let mut best: Option<(&Action<S>, f64)> = None;
        for action in &actions {
            let visits = self.tables.edge_visits(&hash, action.label()).unwrap_or(0.0);
            if best.map_or(true, |(_, top)| visits > top) {
                best = Some((action, visits));
            }
        }

        match best {
            Some((action, visits)) => {
                debug!(action = action.label(), visits, "Chose root action");
                Ok(action.apply(root))
            }
            None => {
                debug!("No root actions proposed; staying at root");
                Ok(root.clone())
            }
        }
    }

    async fn score(&self, state: &S) -> Result<f64, ExplorerError> {
        self.evaluate
            .evaluate(state)
            .await
            .map_err(ExplorerError::Evaluate)
    }

    /// N(s)
    pub fn state_visits(&self, state_hash: &str) -> Option<f64> {
        self.tables.state_visits(state_hash)
    }

    /// N(s,a)
    pub fn edge_visits(&self, state_hash: &str, label: &str) -> Option<f64> {
        self.tables.edge_visits(state_hash, label)
    }

    /// W(s,a)
    pub fn edge_reward(&self, state_hash: &str, label: &str) -> Option<f64> {
        self.tables.edge_reward(state_hash, label)
    }

    /// Current UCB1 score of an edge under the configured exploration constant.
    pub fn ucb(&self, state_hash: &str, label: &str) -> f64 {
        self.tables.ucb(state_hash, label, self.config.exploration)
    }

    pub fn stats(&self) -> ExplorerStats {
        self.tables.stats()
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Forget all statistics.
    pub fn reset(&mut self) {
        self.tables.clear();
    }
}
