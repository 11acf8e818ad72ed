//! Retriever family
//!
//! Callers depend only on [`Retriever`]; backends are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::embedding::Embedder;
use crate::external::{normalize_hits, ExternalIndex, IndexError, IndexMode};
use crate::graph::{GraphClient, GraphError};
use crate::store::{MemoryStore, StoreError};

/// Errors from retrieval backends
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("Graph backend error: {0}")]
    Graph(#[from] GraphError),

    #[error("Memory backend error: {0}")]
    Memory(#[from] StoreError),

    #[error("External index error: {0}")]
    Index(#[from] IndexError),
}

impl From<RetrieveError> for smartgpt_common::SmartError {
    fn from(err: RetrieveError) -> Self {
        smartgpt_common::SmartError::Retrieval(Box::new(err))
    }
}

/// Returns up to `k` text snippets relevant to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrieveError>;

    /// Backend name used in logs
    fn name(&self) -> &'static str;
}

/// Substring match over graph documents, in database order
pub struct GraphRetriever {
    client: Arc<dyn GraphClient>,
}

impl GraphRetriever {
    pub fn new(client: Arc<dyn GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Retriever for GraphRetriever {
    #[instrument(skip(self))]
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrieveError> {
        Ok(self.client.match_documents(query, k).await?)
    }

    fn name(&self) -> &'static str {
        "graph"
    }
}

/// Vector-memory retriever; always constructible, so it is the last resort
pub struct MemoryRetriever {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryRetriever {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Retriever for MemoryRetriever {
    #[instrument(skip(self))]
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrieveError> {
        Ok(self.store.search(query, k, self.embedder.as_ref()).await?)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Delegates to an external index and normalises its hits
pub struct ExternalIndexRetriever {
    index: Arc<dyn ExternalIndex>,
    mode: Option<IndexMode>,
}

impl ExternalIndexRetriever {
    pub fn new(index: Arc<dyn ExternalIndex>, mode: Option<IndexMode>) -> Self {
        Self { index, mode }
    }
}

#[async_trait]
impl Retriever for ExternalIndexRetriever {
    #[instrument(skip(self))]
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrieveError> {
        let response = self.index.find(query, k, self.mode).await?;
        let lines = normalize_hits(&response);
        debug!(hits = lines.len(), "External index answered");
        Ok(lines)
    }

    fn name(&self) -> &'static str {
        "external-index"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::graph::MockGraphClient;
    use mockall::predicate::eq;
    use serde_json::{json, Value};

    struct FixedIndex {
        response: Value,
    }

    #[async_trait]
    impl ExternalIndex for FixedIndex {
        async fn find(&self, _query: &str, _k: usize, mode: Option<IndexMode>) -> Result<Value, IndexError> {
            assert_eq!(mode, Some(IndexMode::Auto));
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_graph_retriever_returns_content() {
        let mut client = MockGraphClient::new();
        client
            .expect_match_documents()
            .with(eq("query"), eq(2usize))
            .times(1)
            .returning(|_, _| Ok(vec!["content-1".to_string(), "content-2".to_string()]));

        let retriever = GraphRetriever::new(Arc::new(client));
        let results = retriever.retrieve("query", 2).await.unwrap();

        assert_eq!(results, vec!["content-1", "content-2"]);
        assert_eq!(retriever.name(), "graph");
    }

    #[tokio::test]
    async fn test_graph_retriever_propagates_errors() {
        let mut client = MockGraphClient::new();
        client
            .expect_match_documents()
            .returning(|_, _| Err(GraphError::Connection("refused".to_string())));

        let retriever = GraphRetriever::new(Arc::new(client));
        let err = retriever.retrieve("query", 2).await.unwrap_err();
        assert!(matches!(err, RetrieveError::Graph(GraphError::Connection(_))));
    }

    #[tokio::test]
    async fn test_memory_retriever_delegates_to_store() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
        let store = Arc::new(MemoryStore::in_memory(64));
        store.add("tokio runtime", embedder.as_ref()).await.unwrap();

        let retriever = MemoryRetriever::new(store.clone(), embedder.clone());
        let results = retriever.retrieve("tokio runtime", 1).await.unwrap();
        assert_eq!(results, vec!["tokio runtime"]);

        store.add("garbage collection", embedder.as_ref()).await.unwrap();
        let direct = store.search("runtime", 5, embedder.as_ref()).await.unwrap();
        let via_retriever = retriever.retrieve("runtime", 5).await.unwrap();
        assert_eq!(via_retriever, direct);
        assert_eq!(via_retriever.len(), 2);
    }

    #[tokio::test]
    async fn test_external_retriever_normalises_hits() {
        let index = FixedIndex {
            response: json!({ "hits": [{ "title": "Doc", "snippet": "Snippet" }, "raw"] }),
        };

        let retriever = ExternalIndexRetriever::new(Arc::new(index), Some(IndexMode::Auto));
        let results = retriever.retrieve("query", 1).await.unwrap();

        assert_eq!(results, vec!["TITLE: Doc\nSNIPPET: Snippet", "raw"]);
    }
}
