//! # SmartGPT Memory
//!
//! Recency-weighted vector memory and the retrievers built on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Retriever                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ ExternalIndex│  │    Graph     │  │     Memory     │  │
//! │  │  Retriever   │  │  Retriever   │  │   Retriever    │  │
//! │  └──────┬───────┘  └──────┬───────┘  └───────┬────────┘  │
//! │         │                 │                  │           │
//! │   ExternalIndex      GraphClient      ┌──────┴────────┐  │
//! │   (FileIndex, …)     (Neo4j, …)       │  MemoryStore  │  │
//! │                                       │ cosine kNN →  │  │
//! │                                       │ decay re-rank │  │
//! │                                       └──────┬────────┘  │
//! │                                              │           │
//! │                                       ┌──────┴────────┐  │
//! │                                       │   Embedder    │  │
//! │                                       │ (cached)      │  │
//! │                                       └───────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Search in [`MemoryStore`] over-fetches `min(4k, 256)` nearest neighbours
//! and returns the `k` with the highest `0.7·accessed + 0.3·created`.

pub mod embedding;
pub mod external;
pub mod graph;
pub mod retriever;
pub mod store;

pub use embedding::{CachedEmbedder, Embedder, EmbeddingError, HashEmbedder, HttpEmbedder};
pub use external::{
    format_hit, normalize_hits, ExternalIndex, ExternalIndexOptions, FileIndex, IndexError,
    IndexMode,
};
pub use graph::{GraphClient, GraphDocument, GraphError, InMemoryGraph, Neo4jHttpClient, Neo4jSettings};
pub use retriever::{
    ExternalIndexRetriever, GraphRetriever, MemoryRetriever, RetrieveError, Retriever,
};
pub use store::{cosine_similarity, MemoryRecord, MemoryStore, StoreError};
