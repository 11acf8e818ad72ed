//! # SmartGPT Common
//!
//! Shared error type and constants for the SmartGPT exploration-and-memory core.
//!
//! - [`SmartError`]: unified error surfaced by the orchestrating `Context`
//! - Constants shared by the memory stack and its callers

pub mod error;

pub use error::{BoxError, Result, SmartError};

/// SmartGPT core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of context lines a retriever returns
pub const DEFAULT_RETRIEVE_K: usize = 5;

/// Weight of the access timestamp in the memory decay score
pub const MEMORY_DECAY: f64 = 0.7;

/// Default dimension of the local hashing embedder
pub const DEFAULT_EMBED_DIM: usize = 384;

/// Upper bound on vector-index candidates fetched for one memory search
pub const MAX_SEARCH_CANDIDATES: usize = 256;

/// Candidate over-fetch factor applied to `k` before decay re-ranking
pub const SEARCH_OVERFETCH: usize = 4;
