//! Embedding Service
//!
//! Turn text into fixed-dimension vectors for the memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// Text embedded once to discover an embedder's dimension
pub const DIMENSION_PROBE: &str = "dimension probe";

/// Trait for embedding services
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed dimensionality of the vectors this embedder produces
    async fn dim(&self) -> Result<usize, EmbeddingError>;
}

/// Errors from embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable")]
    Unavailable,
}

impl From<EmbeddingError> for smartgpt_common::SmartError {
    fn from(err: EmbeddingError) -> Self {
        smartgpt_common::SmartError::Storage(Box::new(err))
    }
}

/// Deterministic local embedding using hashed whitespace tokens
///
/// Each token is hashed into one of `dimension` buckets; even hashes add one,
/// odd hashes subtract one. The result is L2-normalised.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a new hashing embedder
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// 31-multiplier string hash over UTF-16 code units, wrapping at 32 bits
    fn hash_token(token: &str) -> i32 {
        token
            .encode_utf16()
            .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
    }

    /// Split on whitespace runs. A leading or trailing run yields an empty
    /// token at that end; blank text is a single token.
    fn tokens(text: &str) -> Vec<&str> {
        if text.trim().is_empty() {
            return vec![text];
        }

        let parts: Vec<&str> = text.split(char::is_whitespace).collect();
        let last = parts.len() - 1;
        parts
            .into_iter()
            .enumerate()
            .filter(|(i, token)| !token.is_empty() || *i == 0 || *i == last)
            .map(|(_, token)| token)
            .collect()
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in Self::tokens(text) {
            let hash = Self::hash_token(token);
            let idx = ((hash as i64).unsigned_abs() % self.dimension as u64) as usize;
            let sign = if hash % 2 == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign;
        }

        // Normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(smartgpt_common::DEFAULT_EMBED_DIM)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(self.generate_embedding(text))
    }

    async fn dim(&self) -> Result<usize, EmbeddingError> {
        Ok(self.dimension)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding service backed by an OpenAI-compatible `/v1/embeddings` endpoint
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    http_client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimension,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model, len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.endpoint);
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Api(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!(
                "embedding API error {status}: {body_text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))
    }

    async fn dim(&self) -> Result<usize, EmbeddingError> {
        Ok(self.dimension)
    }
}

/// Cached wrapper for any embedding service
///
/// The cache is keyed by exact text, unbounded, and never evicted.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: RwLock<HashMap<String, Vec<f32>>>,
    dimension: OnceCell<usize>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Create a new cached embedding service
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            dimension: OnceCell::new(),
        }
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Number of cached texts
    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// The wrapped embedder
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        // Check cache
        {
            let cache = self.cache.read();
            if let Some(embedding) = cache.get(text) {
                return Ok(embedding.clone());
            }
        }

        let embedding = self.inner.embed(text).await?;

        {
            let mut cache = self.cache.write();
            cache.insert(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    async fn dim(&self) -> Result<usize, EmbeddingError> {
        self.dimension
            .get_or_try_init(|| async {
                let dim = self.embed(DIMENSION_PROBE).await?.len();
                debug!(dim, "Probed embedding dimension");
                Ok::<usize, EmbeddingError>(dim)
            })
            .await
            .copied()
    }
}
