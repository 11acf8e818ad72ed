//! Budgeted Monte Carlo Tree Search over caller-defined state spaces.
//!
//! The explorer knows nothing about the domain. Callers supply a [`State`]
//! type plus three asynchronous callbacks:
//!
//! - [`Propose`]: up to `width` candidate [`Action`]s for a state
//! - [`Evaluate`]: a scalar reward for a state
//! - [`Rollout`]: one action to take during a simulated playout
//!
//! # Overview
//!
//! Each iteration of [`Explorer::search`] consists of four phases:
//!
//! 1. **Selection**: descend from the root, preferring never-tried actions,
//!    otherwise the highest UCB1 score `W/N + c·sqrt(ln N(s) / N)`
//! 2. **Expansion**: a state missing from the visit table is evaluated and
//!    the iteration stops there; only states on the path are recorded
//! 3. **Rollout**: when selection runs out of depth or hits a terminal state,
//!    play out with the rollout policy (bounded by `max_depth` plus
//!    [`ExplorerConfig::rollout_horizon`])
//! 4. **Backup**: every state and edge on the selection path gets one visit
//!    and the reward
//!
//! After the budget is spent the most-visited root action is applied to the
//! root and the resulting state returned.
//!
//! # Usage
//!
//! ```rust,ignore
//! use smartgpt_explorer::{Action, Explorer, ExplorerConfig, RandomRollout};
//!
//! let propose = |s: Draft, width: usize| async move { llm.suggest_edits(&s, width).await };
//! let evaluate = |s: Draft| async move { judge.score(&s).await };
//! let rollout = RandomRollout::new(propose.clone(), 4);
//!
//! let mut explorer = Explorer::new(propose, evaluate, rollout, ExplorerConfig::default());
//! let next = explorer.search(&draft, 64, 6).await?;
//! ```

pub mod config;
pub mod explorer;
pub mod policy;
pub mod state;
mod tables;

pub use config::ExplorerConfig;
pub use explorer::{Explorer, ExplorerError};
pub use policy::{Evaluate, Propose, RandomRollout, Rollout};
pub use state::{Action, State, Trail};
pub use tables::{edge_key, ExplorerStats};
