//! Retriever selection and per-call fallback
//!
//! A [`Context`] commits to one retriever at start-up, trying backends in
//! priority order (external index, graph, vector memory). Every
//! [`Context::retrieve`] call goes to the committed retriever first; when it
//! fails, a one-off memory retriever answers that call instead. The committed
//! retriever is tried again on the next call.

use std::sync::Arc;

use smartgpt_common::Result;
use smartgpt_explorer::{Evaluate, Explorer, ExplorerConfig, Propose, RandomRollout, State};
use smartgpt_memory::{
    CachedEmbedder, Embedder, ExternalIndexOptions, ExternalIndexRetriever, FileIndex,
    GraphClient, GraphRetriever, HashEmbedder, HttpEmbedder, MemoryRetriever, MemoryStore,
    Neo4jHttpClient, Retriever,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::ContextConfig;

/// Width used when a random rollout asks the proposer for candidates
pub const ROLLOUT_WIDTH: usize = 8;

/// A retrieval backend considered during selection
pub enum Candidate {
    /// Open a [`FileIndex`]; skipped when opening fails
    Index(ExternalIndexOptions),
    /// Graph backend; committed only after connectivity is verified
    Graph(Arc<dyn GraphClient>),
    /// Ready-made retriever, committed as-is
    Ready(Arc<dyn Retriever>),
}

/// Memory, embedder and the committed retriever
pub struct Context {
    retriever: Arc<dyn Retriever>,
    memory: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
    explorer_config: ExplorerConfig,
}

impl Context {
    /// Build embedder, memory and retriever from configuration.
    ///
    /// Never fails: an unreachable embedding endpoint is replaced by local
    /// hashing, a memory database that cannot be opened by a process-local
    /// store, and unavailable retrieval backends are skipped. Each
    /// substitution is logged.
    #[instrument(skip(config))]
    pub async fn init(config: &ContextConfig) -> Self {
        let local = || -> Arc<dyn Embedder> {
            Arc::new(CachedEmbedder::new(HashEmbedder::new(
                config.embedding.dimension,
            )))
        };

        let mut embedder: Arc<dyn Embedder> = match &config.embedding.endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, model = %config.embedding.model, "Using remote embeddings");
                Arc::new(CachedEmbedder::new(HttpEmbedder::new(
                    endpoint.clone(),
                    config.embedding.model.clone(),
                    config.embedding.api_key.clone(),
                    config.embedding.dimension,
                )))
            }
            None => local(),
        };

        let dim = match embedder.dim().await {
            Ok(dim) => dim,
            Err(e) => {
                warn!(error = %e, "Embedding endpoint unavailable, using local hashing");
                embedder = local();
                config.embedding.dimension
            }
        };

        let memory = match &config.memory.path {
            Some(path) => MemoryStore::open(path, dim).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Memory database unavailable, keeping memory in process");
                MemoryStore::in_memory(dim)
            }),
            None => MemoryStore::in_memory(dim),
        };
        info!(dim, records = memory.len(), "Memory store ready");

        let mut candidates = Vec::new();
        if let Some(options) = config.index.options() {
            candidates.push(Candidate::Index(options));
        }
        if config.graph.enabled && !config.graph.neo4j.url.is_empty() {
            let client = Neo4jHttpClient::new(config.graph.neo4j.clone());
            candidates.push(Candidate::Graph(Arc::new(client)));
        }

        Self::with_parts(Arc::new(memory), embedder, candidates)
            .await
            .with_explorer_config(config.explorer.clone())
    }

    /// Commit to the first usable candidate, or to the memory retriever.
    pub async fn with_parts(
        memory: Arc<MemoryStore>,
        embedder: Arc<dyn Embedder>,
        candidates: Vec<Candidate>,
    ) -> Self {
        let mut committed: Option<Arc<dyn Retriever>> = None;

        for candidate in candidates {
            match candidate {
                Candidate::Index(options) => match FileIndex::open(&options) {
                    Ok(index) => {
                        committed = Some(Arc::new(ExternalIndexRetriever::new(
                            Arc::new(index),
                            options.mode,
                        )));
                    }
                    Err(e) => {
                        warn!(path = %options.path.display(), error = %e, "External index unavailable");
                    }
                },
                Candidate::Graph(client) => match client.verify_connectivity().await {
                    Ok(()) => committed = Some(Arc::new(GraphRetriever::new(client))),
                    Err(e) => warn!(error = %e, "Graph backend unavailable"),
                },
                Candidate::Ready(retriever) => committed = Some(retriever),
            }

            if committed.is_some() {
                break;
            }
        }

        let retriever = committed.unwrap_or_else(|| {
            Arc::new(MemoryRetriever::new(memory.clone(), embedder.clone())) as Arc<dyn Retriever>
        });
        info!(backend = retriever.name(), "Retriever committed");

        Self {
            retriever,
            memory,
            embedder,
            explorer_config: ExplorerConfig::default(),
        }
    }

    pub fn with_explorer_config(mut self, config: ExplorerConfig) -> Self {
        self.explorer_config = config;
        self
    }

    /// Up to `k` context lines for `query`.
    ///
    /// Errors only when the committed retriever and the memory fallback both
    /// fail; the fallback's error is returned.
    #[instrument(skip(self), fields(backend = self.retriever.name()))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        match self.retriever.retrieve(query, k).await {
            Ok(lines) => Ok(lines),
            Err(e) => {
                warn!(backend = self.retriever.name(), error = %e, "Retriever failed, using memory");
                let fallback = MemoryRetriever::new(self.memory.clone(), self.embedder.clone());
                Ok(fallback.retrieve(query, k).await?)
            }
        }
    }

    /// Retrieved lines separated by blank lines, ready to splice into a prompt.
    ///
    /// Empty when retrieval fails.
    pub async fn context_block(&self, query: &str, k: usize) -> String {
        match self.retrieve(query, k).await {
            Ok(lines) => lines.join("\n\n"),
            Err(e) => {
                warn!(error = %e, "No context available");
                String::new()
            }
        }
    }

    /// Store `text` in vector memory
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn remember(&self, text: &str) -> Result<Uuid> {
        Ok(self.memory.add(text, self.embedder.as_ref()).await?)
    }

    /// Explorer using the configured budget and depth, with random rollouts
    /// drawn from `propose`
    pub fn explorer<S, P, E>(&self, propose: P, evaluate: E) -> Explorer<S, P, E, RandomRollout<P>>
    where
        S: State,
        P: Propose<S> + Clone,
        E: Evaluate<S>,
    {
        let rollout = RandomRollout::new(propose.clone(), ROLLOUT_WIDTH);
        Explorer::new(propose, evaluate, rollout, self.explorer_config.clone())
    }

    /// Name of the committed retriever
    pub fn backend(&self) -> &'static str {
        self.retriever.name()
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn explorer_config(&self) -> &ExplorerConfig {
        &self.explorer_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartgpt_explorer::{Action, Trail};
    use smartgpt_memory::InMemoryGraph;

    fn parts(dim: usize) -> (Arc<MemoryStore>, Arc<dyn Embedder>) {
        (
            Arc::new(MemoryStore::in_memory(dim)),
            Arc::new(CachedEmbedder::new(HashEmbedder::new(dim))),
        )
    }

    #[tokio::test]
    async fn test_init_defaults_to_memory() {
        let context = Context::init(&ContextConfig::default()).await;

        assert_eq!(context.backend(), "memory");
        assert_eq!(context.memory().dim(), 384);
        assert!(context.memory().path().is_none());
    }

    #[tokio::test]
    async fn test_init_survives_unreachable_embedding_endpoint() {
        let mut config = ContextConfig::default();
        config.embedding.endpoint = Some("http://127.0.0.1:1".to_string());
        config.embedding.dimension = 48;

        let context = Context::init(&config).await;

        assert_eq!(context.backend(), "memory");
        assert_eq!(context.memory().dim(), 48);
        context.remember("local hashing took over").await.unwrap();
        let lines = context.retrieve("local hashing took over", 1).await.unwrap();
        assert_eq!(lines, vec!["local hashing took over"]);
    }

    #[tokio::test]
    async fn test_init_survives_unopenable_memory_database() {
        let mut config = ContextConfig::default();
        config.memory.path = Some(
            std::env::temp_dir()
                .join(format!("smartgpt-missing-{}", Uuid::new_v4()))
                .join("memory.sqlite"),
        );

        let context = Context::init(&config).await;

        assert!(context.memory().path().is_none());
        assert_eq!(context.backend(), "memory");
        context.remember("kept in process").await.unwrap();
        assert_eq!(context.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_remember_then_retrieve() {
        let (memory, embedder) = parts(32);
        let context = Context::with_parts(memory, embedder, Vec::new()).await;

        context.remember("the build uses cargo workspaces").await.unwrap();
        let lines = context.retrieve("the build uses cargo workspaces", 3).await.unwrap();

        assert_eq!(lines, vec!["the build uses cargo workspaces"]);
    }

    #[tokio::test]
    async fn test_context_block_joins_with_blank_lines() {
        let (memory, embedder) = parts(32);
        let graph = InMemoryGraph::new();
        graph.insert_document("a", "rust traits");
        graph.insert_document("b", "rust lifetimes");
        let context =
            Context::with_parts(memory, embedder, vec![Candidate::Graph(Arc::new(graph))]).await;

        let block = context.context_block("rust", 5).await;

        assert_eq!(context.backend(), "graph");
        assert_eq!(block, "rust traits\n\nrust lifetimes");
    }

    #[tokio::test]
    async fn test_explorer_uses_configured_defaults() {
        let (memory, embedder) = parts(16);
        let context = Context::with_parts(memory, embedder, Vec::new())
            .await
            .with_explorer_config(ExplorerConfig::for_testing().with_budget(4).with_max_depth(2));

        let propose = |t: Trail, _w: usize| async move {
            anyhow::Ok(if t.steps().len() < 2 {
                vec![Trail::step("draft"), Trail::finishing_step("answer")]
            } else {
                Vec::<Action<Trail>>::new()
            })
        };
        let evaluate = |t: Trail| async move {
            anyhow::Ok(if t.steps().last().map(String::as_str) == Some("answer") { 1.0 } else { 0.1 })
        };

        let mut explorer = context.explorer(propose, evaluate);
        let best = explorer.search_with_defaults(&Trail::new("question")).await.unwrap();

        assert_eq!(explorer.config().budget, 4);
        assert_eq!(explorer.stats().iterations, 4);
        assert_eq!(best.hash(), "question|answer");
    }
}
