//! Retriever selection and per-call fallback, end to end.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use smartgpt_common::SmartError;
use smartgpt_context::{Candidate, Context, ContextConfig};
use smartgpt_memory::{
    CachedEmbedder, Embedder, EmbeddingError, ExternalIndexOptions, FileIndex, GraphClient,
    GraphError, HashEmbedder, InMemoryGraph, MemoryStore, RetrieveError, Retriever,
};
use uuid::Uuid;

/// Retriever that always fails and counts its calls
#[derive(Default)]
struct FlakyRetriever {
    calls: AtomicUsize,
}

#[async_trait]
impl Retriever for FlakyRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrieveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RetrieveError::Graph(GraphError::Connection(
            "connection reset".to_string(),
        )))
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Graph backend that never answers
struct UnreachableGraph;

#[async_trait]
impl GraphClient for UnreachableGraph {
    async fn verify_connectivity(&self) -> Result<(), GraphError> {
        Err(GraphError::Connection("connection refused".to_string()))
    }

    async fn match_documents(&self, _query: &str, _limit: usize) -> Result<Vec<String>, GraphError> {
        Err(GraphError::Connection("connection refused".to_string()))
    }
}

/// Embedder with a known dimension that cannot embed
struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable)
    }

    async fn dim(&self) -> Result<usize, EmbeddingError> {
        Ok(8)
    }
}

fn temp_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("smartgpt-context-{}.{}", Uuid::new_v4(), ext))
}

fn parts(dim: usize) -> (Arc<MemoryStore>, Arc<dyn Embedder>) {
    (
        Arc::new(MemoryStore::in_memory(dim)),
        Arc::new(CachedEmbedder::new(HashEmbedder::new(dim))),
    )
}

fn shared_graph(docs: &[(&str, &str)]) -> Arc<InMemoryGraph> {
    let graph = InMemoryGraph::new();
    for (title, content) in docs {
        graph.insert_document(*title, *content);
    }
    Arc::new(graph)
}

#[tokio::test]
async fn test_failing_backend_falls_back_to_memory_per_call() {
    let (memory, embedder) = parts(32);
    let flaky = Arc::new(FlakyRetriever::default());
    let context = Context::with_parts(memory, embedder, vec![Candidate::Ready(flaky.clone())]).await;
    assert_eq!(context.backend(), "flaky");

    context.remember("deploys run every friday").await.unwrap();

    let first = context.retrieve("deploys run every friday", 3).await.unwrap();
    let second = context.retrieve("deploys run every friday", 3).await.unwrap();

    assert_eq!(first, vec!["deploys run every friday"]);
    assert_eq!(second, first);
    // no permanent downgrade: the committed backend was asked both times
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    assert_eq!(context.backend(), "flaky");
}

#[tokio::test]
async fn test_fallback_error_is_returned_when_both_fail() {
    let memory = Arc::new(MemoryStore::in_memory(8));
    let embedder: Arc<dyn Embedder> = Arc::new(OfflineEmbedder);
    let flaky = Arc::new(FlakyRetriever::default());
    let context = Context::with_parts(memory, embedder, vec![Candidate::Ready(flaky)]).await;

    let err = context.retrieve("anything", 3).await.unwrap_err();

    assert!(matches!(err, SmartError::Retrieval(_)));
    assert!(err.to_string().contains("Service unavailable"));
    assert_eq!(context.context_block("anything", 3).await, "");
}

#[tokio::test]
async fn test_external_index_has_priority_over_graph() {
    let (memory, embedder) = parts(16);
    let path = temp_path("json");

    let context = Context::with_parts(
        memory,
        embedder,
        vec![
            Candidate::Index(ExternalIndexOptions::new(&path)),
            Candidate::Graph(shared_graph(&[("doc", "content")])),
        ],
    )
    .await;

    assert_eq!(context.backend(), "external-index");
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_missing_index_falls_through_to_graph() {
    let (memory, embedder) = parts(16);
    let mut options = ExternalIndexOptions::new(temp_path("json"));
    options.create_if_missing = false;

    let context = Context::with_parts(
        memory,
        embedder,
        vec![
            Candidate::Index(options),
            Candidate::Graph(shared_graph(&[("Tokio", "async runtime")])),
        ],
    )
    .await;

    assert_eq!(context.backend(), "graph");
    assert_eq!(context.retrieve("Tokio", 2).await.unwrap(), vec!["async runtime"]);
}

#[tokio::test]
async fn test_unreachable_graph_is_skipped() {
    let (memory, embedder) = parts(16);

    let context = Context::with_parts(memory, embedder, vec![Candidate::Graph(Arc::new(UnreachableGraph))]).await;

    assert_eq!(context.backend(), "memory");
}

#[tokio::test]
async fn test_init_commits_configured_index() {
    let path = temp_path("json");
    let index = FileIndex::open(&ExternalIndexOptions::new(&path)).unwrap();
    index.add_document("Release notes", "memory store now persists to sqlite");
    index.add_document("Roadmap", "graph retriever caching");
    index.seal().unwrap();

    let config = ContextConfig::from_lookup(|key| match key {
        "SMARTGPT_INDEX_PATH" => Some(path.display().to_string()),
        "SMARTGPT_EMBED_DIM" => Some("16".to_string()),
        _ => None,
    })
    .unwrap();
    let context = Context::init(&config).await;

    assert_eq!(context.backend(), "external-index");
    let block = context.context_block("persists sqlite", 5).await;
    assert_eq!(
        block,
        "TITLE: Release notes\nSNIPPET: memory store now persists to sqlite"
    );
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_durable_memory_survives_restart() {
    let path = temp_path("sqlite");
    let config = ContextConfig::from_lookup(|key| match key {
        "SMARTGPT_MEMORY_PATH" => Some(path.display().to_string()),
        "SMARTGPT_EMBED_DIM" => Some("24".to_string()),
        _ => None,
    })
    .unwrap();

    {
        let context = Context::init(&config).await;
        context.remember("the staging database is postgres 16").await.unwrap();
    }

    let context = Context::init(&config).await;
    assert_eq!(context.memory().len(), 1);
    let lines = context
        .retrieve("the staging database is postgres 16", 1)
        .await
        .unwrap();
    assert_eq!(lines, vec!["the staging database is postgres 16"]);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_concurrent_remember() {
    let (memory, embedder) = parts(32);
    let context = Context::with_parts(memory, embedder, Vec::new()).await;

    let texts: Vec<String> = (0..20).map(|i| format!("note number {i}")).collect();
    let ids = futures::future::join_all(texts.iter().map(|t| context.remember(t))).await;

    let mut ids: Vec<Uuid> = ids.into_iter().map(Result::unwrap).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(context.memory().len(), 20);
}
