//! Graph database clients
//!
//! The graph retriever matches `Document` nodes whose content or title
//! contains the query string.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Cypher issued by the graph retriever
pub const DOCUMENT_MATCH_QUERY: &str = "MATCH (node:Document) \
     WHERE node.content CONTAINS $q OR node.title CONTAINS $q \
     RETURN node.content AS c LIMIT $k";

/// Errors from graph operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed ({code}): {message}")]
    Query { code: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Minimal graph database surface used by the retriever
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Check that the database is reachable and accepts our credentials
    async fn verify_connectivity(&self) -> Result<(), GraphError>;

    /// Content of documents whose content or title contains `query`, at most `limit`
    async fn match_documents(&self, query: &str, limit: usize) -> Result<Vec<String>, GraphError>;
}

/// Connection settings for [`Neo4jHttpClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            username: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Neo4j client speaking the HTTP transactional endpoint
pub struct Neo4jHttpClient {
    settings: Neo4jSettings,
    http_client: reqwest::Client,
}

impl Neo4jHttpClient {
    pub fn new(settings: Neo4jSettings) -> Self {
        Self {
            settings,
            http_client: reqwest::Client::new(),
        }
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.settings.url.trim_end_matches('/'),
            self.settings.database
        )
    }

    async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>, GraphError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let response = self
            .http_client
            .post(self.commit_url())
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphError::Connection(format!("HTTP {status}: {text}")));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::InvalidResponse(e.to_string()))?;

        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(GraphError::Query {
                code: err.code,
                message: err.message,
            });
        }

        Ok(parsed
            .results
            .into_iter()
            .flat_map(|r| r.data.into_iter().map(|d| d.row))
            .collect())
    }
}

#[async_trait]
impl GraphClient for Neo4jHttpClient {
    async fn verify_connectivity(&self) -> Result<(), GraphError> {
        self.run("RETURN 1", json!({})).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn match_documents(&self, query: &str, limit: usize) -> Result<Vec<String>, GraphError> {
        let rows = self
            .run(DOCUMENT_MATCH_QUERY, json!({ "q": query, "k": limit }))
            .await?;

        debug!(rows = rows.len(), "Graph match complete");

        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|cell| match cell {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }
}

/// A document node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub title: String,
    pub content: String,
}

/// In-process document graph with the same matching rules as the Cypher query
#[derive(Default)]
pub struct InMemoryGraph {
    documents: RwLock<Vec<GraphDocument>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, title: impl Into<String>, content: impl Into<String>) {
        self.documents.write().push(GraphDocument {
            title: title.into(),
            content: content.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl GraphClient for InMemoryGraph {
    async fn verify_connectivity(&self) -> Result<(), GraphError> {
        Ok(())
    }

    async fn match_documents(&self, query: &str, limit: usize) -> Result<Vec<String>, GraphError> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|d| d.content.contains(query) || d.title.contains(query))
            .take(limit)
            .map(|d| d.content.clone())
            .collect())
    }
}
