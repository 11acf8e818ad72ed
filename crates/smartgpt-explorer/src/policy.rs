//! Pluggable search callbacks.
//!
//! `propose`, `evaluate` and `rollout` usually call out to a model, so they
//! are asynchronous and fallible. Async closures taking the state by value
//! implement the traits directly.

use std::future::Future;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::state::{Action, State};

/// Generate up to `width` candidate actions for a state.
#[async_trait]
pub trait Propose<S: State>: Send + Sync {
    async fn propose(&self, state: &S, width: usize) -> anyhow::Result<Vec<Action<S>>>;
}

/// Score a state. Rewards are not normalised; keep them on the scale the
/// exploration constant assumes (typically `[0, 1]`).
#[async_trait]
pub trait Evaluate<S: State>: Send + Sync {
    async fn evaluate(&self, state: &S) -> anyhow::Result<f64>;
}

/// Choose the single action taken from a state during a simulated playout.
#[async_trait]
pub trait Rollout<S: State>: Send + Sync {
    async fn rollout(&self, state: &S) -> anyhow::Result<Action<S>>;
}

#[async_trait]
impl<S, F, Fut> Propose<S> for F
where
    S: State,
    F: Fn(S, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<Action<S>>>> + Send + 'static,
{
    async fn propose(&self, state: &S, width: usize) -> anyhow::Result<Vec<Action<S>>> {
        (self)(state.clone(), width).await
    }
}

#[async_trait]
impl<S, F, Fut> Evaluate<S> for F
where
    S: State,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<f64>> + Send + 'static,
{
    async fn evaluate(&self, state: &S) -> anyhow::Result<f64> {
        (self)(state.clone()).await
    }
}

#[async_trait]
impl<S, F, Fut> Rollout<S> for F
where
    S: State,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Action<S>>> + Send + 'static,
{
    async fn rollout(&self, state: &S) -> anyhow::Result<Action<S>> {
        (self)(state.clone()).await
    }
}

/// Rollout policy picking uniformly among a proposer's candidates.
pub struct RandomRollout<P> {
    propose: P,
    width: usize,
    rng: Mutex<StdRng>,
}

impl<P> RandomRollout<P> {
    pub fn new(propose: P, width: usize) -> Self {
        Self {
            propose,
            width,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for tests and benchmarks
    pub fn seeded(propose: P, width: usize, seed: u64) -> Self {
        Self {
            propose,
            width,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl<S, P> Rollout<S> for RandomRollout<P>
where
    S: State,
    P: Propose<S>,
{
    async fn rollout(&self, state: &S) -> anyhow::Result<Action<S>> {
        let mut actions = self.propose.propose(state, self.width).await?;
        if actions.is_empty() {
            anyhow::bail!("no actions to roll out from state {}", state.hash());
        }
        let idx = self.rng.lock().gen_range(0..actions.len());
        Ok(actions.swap_remove(idx))
    }
}
