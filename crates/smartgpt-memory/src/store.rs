//! Memory Storage
//!
//! Text fragments with vector-similarity search, ranked by a recency decay
//! score. Search is two-stage: the vector index prunes the candidate set by
//! cosine similarity, then the decay score orders the final result.
//!
//! Durable stores keep every record in a SQLite `memories` table and rebuild
//! the vector index from it on open.

use std::path::{Path, PathBuf};

use chrono::Utc;
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use smartgpt_common::{MAX_SEARCH_CANDIDATES, MEMORY_DECAY, SEARCH_OVERFETCH};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::embedding::{Embedder, EmbeddingError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS memories(\
    id TEXT PRIMARY KEY, vec BLOB, content TEXT, created INT, accessed INT)";

/// A stored memory
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub content: String,
    pub created: i64,
    pub accessed: i64,
}

impl MemoryRecord {
    /// Create a record stamped with the current time
    pub fn new(vector: Vec<f32>, content: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::now_v7(),
            vector,
            content: content.into(),
            created: now,
            accessed: now,
        }
    }

    /// Create a record with explicit timestamps
    pub fn with_timestamps(
        vector: Vec<f32>,
        content: impl Into<String>,
        created: i64,
        accessed: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            vector,
            content: content.into(),
            created,
            accessed,
        }
    }

    /// `DECAY * accessed + (1 - DECAY) * created`
    pub fn decay_score(&self) -> f64 {
        MEMORY_DECAY * self.accessed as f64 + (1.0 - MEMORY_DECAY) * self.created as f64
    }
}

/// Errors from memory store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<StoreError> for smartgpt_common::SmartError {
    fn from(err: StoreError) -> Self {
        smartgpt_common::SmartError::Storage(Box::new(err))
    }
}

/// Brute-force cosine nearest-neighbour index
#[derive(Default)]
struct VectorIndex {
    entries: Vec<(Uuid, Vec<f32>)>,
}

impl VectorIndex {
    fn add(&mut self, id: Uuid, vector: Vec<f32>) {
        self.entries.push((id, vector));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Up to `n` ids ordered by descending similarity; insertion order breaks ties
    fn knn(&self, query: &[f32], n: usize) -> Vec<Uuid> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, cosine_similarity(v, query)))
            .collect();

        scored.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)));

        scored
            .into_iter()
            .take(n)
            .map(|(i, _)| self.entries[i].0)
            .collect()
    }
}

/// Cosine similarity between two vectors of equal length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Vector memory store
///
/// Records are append-only. A durable store writes each record to its
/// database before the record becomes visible to searches.
pub struct MemoryStore {
    dim: usize,
    records: DashMap<Uuid, MemoryRecord>,
    index: RwLock<VectorIndex>,
    db: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a store that lives only in process memory
    pub fn in_memory(dim: usize) -> Self {
        Self {
            dim,
            records: DashMap::new(),
            index: RwLock::new(VectorIndex::default()),
            db: None,
            path: None,
        }
    }

    /// Open (or create) a SQLite-backed store, loading existing records
    pub fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(CREATE_TABLE, [])?;

        let mut store = Self::in_memory(dim);
        {
            let mut stmt = conn.prepare(
                "SELECT id, vec, content, created, accessed FROM memories ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;

            for row in rows {
                let (id, blob, content, created, accessed) = row?;
                let record = MemoryRecord {
                    id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt {
                        id: id.clone(),
                        reason: e.to_string(),
                    })?,
                    vector: decode_vector(&id, &blob)?,
                    content,
                    created,
                    accessed,
                };
                store.insert_in_memory(record)?;
            }
        }

        info!(path = %path.display(), records = store.len(), dim, "Opened memory database");

        store.db = Some(Mutex::new(conn));
        store.path = Some(path);
        Ok(store)
    }

    /// Embed `text` and store it with `created = accessed = now`
    #[instrument(skip(self, text, embedder), fields(len = text.len()))]
    pub async fn add(&self, text: &str, embedder: &dyn Embedder) -> Result<Uuid, StoreError> {
        let vector = embedder.embed(text).await?;
        self.insert(MemoryRecord::new(vector, text))
    }

    /// Store a fully-formed record
    ///
    /// Fails with [`StoreError::DimensionMismatch`] without touching the store
    /// when the vector length differs from the store's dimension.
    pub fn insert(&self, record: MemoryRecord) -> Result<Uuid, StoreError> {
        self.check_dim(record.vector.len())?;

        if let Some(db) = &self.db {
            db.lock().execute(
                "INSERT INTO memories VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.to_string(),
                    encode_vector(&record.vector),
                    record.content,
                    record.created,
                    record.accessed
                ],
            )?;
        }

        self.insert_in_memory(record)
    }

    fn insert_in_memory(&self, record: MemoryRecord) -> Result<Uuid, StoreError> {
        self.check_dim(record.vector.len())?;

        let id = record.id;
        let mut index = self.index.write();
        index.add(id, record.vector.clone());
        self.records.insert(id, record);

        debug!(%id, total = index.len(), "Stored memory");
        Ok(id)
    }

    /// Return up to `k` contents similar to `query`, freshest first
    #[instrument(skip(self, query, embedder))]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<String>, StoreError> {
        let query_vector = embedder.embed(query).await?;
        self.search_vector(&query_vector, k)
    }

    /// Search with a precomputed query vector
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<String>, StoreError> {
        self.check_dim(query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let n = k.saturating_mul(SEARCH_OVERFETCH).min(MAX_SEARCH_CANDIDATES);
        let neighbours = self.index.read().knn(query, n);
        if neighbours.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows: Vec<(String, f64)> = neighbours
            .iter()
            .filter_map(|id| {
                self.records
                    .get(id)
                    .map(|r| (r.content.clone(), r.decay_score()))
            })
            .collect();

        // Stable sort keeps similarity order among equal scores
        rows.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)));

        Ok(rows.into_iter().take(k).map(|(content, _)| content).collect())
    }

    /// Get a record by ID
    pub fn get(&self, id: &Uuid) -> Option<MemoryRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Vector dimension enforced by this store
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Database path for durable stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn check_dim(&self, actual: usize) -> Result<(), StoreError> {
        if actual != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual,
            });
        }
        Ok(())
    }
}

/// Little-endian `f32`s, four bytes per component
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(id: &str, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("vector blob of {} bytes", blob.len()),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
