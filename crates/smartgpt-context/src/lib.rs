//! # SmartGPT Context
//!
//! Wires the embedder, vector memory and retrieval backends together.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Context                          │
//! │                                                        │
//! │  init: external index ──► graph ──► vector memory      │
//! │        (first usable candidate is committed)           │
//! │                                                        │
//! │  retrieve(q, k)                                        │
//! │     committed.retrieve ──Err──► MemoryRetriever (once) │
//! │                                                        │
//! │  remember(text) ──► MemoryStore ◄── CachedEmbedder     │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;

pub use config::{ContextConfig, EmbeddingSettings, GraphSettings, IndexSettings, MemorySettings};
pub use context::{Candidate, Context, ROLLOUT_WIDTH};
