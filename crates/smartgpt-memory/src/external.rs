//! External memory indexes
//!
//! An external index answers `find` with hits in whatever shape it likes:
//! bare strings or objects carrying some of `title`, `snippet`, `text`,
//! `content` and `metadata.title`. [`format_hit`] reduces every shape to one
//! of three text renderings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Search mode hint passed through to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    Lex,
    Sem,
    Auto,
    Clip,
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexMode::Lex => "lex",
            IndexMode::Sem => "sem",
            IndexMode::Auto => "auto",
            IndexMode::Clip => "clip",
        };
        f.write_str(s)
    }
}

impl FromStr for IndexMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lex" => Ok(IndexMode::Lex),
            "sem" => Ok(IndexMode::Sem),
            "auto" => Ok(IndexMode::Auto),
            "clip" => Ok(IndexMode::Clip),
            other => Err(IndexError::InvalidMode(other.to_string())),
        }
    }
}

/// Errors from external index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unknown index mode: {0}")]
    InvalidMode(String),

    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Index backend error: {0}")]
    Backend(String),
}

/// Opaque third-party memory index
#[async_trait]
pub trait ExternalIndex: Send + Sync {
    /// Raw response for `query`; either an array of hits or an object with a `hits` array
    async fn find(&self, query: &str, k: usize, mode: Option<IndexMode>) -> Result<Value, IndexError>;
}

/// Render one hit as text
///
/// Strings pass through. Objects become `TITLE: …\nSNIPPET: …` when both a
/// title and a snippet are non-empty, the bare snippet when only the snippet
/// is, and compact JSON otherwise.
///
/// The first field present wins even when it is empty: `{"snippet": "",
/// "text": "t"}` has an empty snippet and renders as JSON.
pub fn format_hit(hit: &Value) -> String {
    if let Value::String(s) = hit {
        return s.clone();
    }

    let title = hit
        .get("title")
        .and_then(Value::as_str)
        .or_else(|| hit.pointer("/metadata/title").and_then(Value::as_str))
        .filter(|t| !t.is_empty());
    let snippet = ["snippet", "text", "content"]
        .iter()
        .find_map(|key| hit.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty());

    match (title, snippet) {
        (Some(title), Some(snippet)) => format!("TITLE: {}\nSNIPPET: {}", title, snippet),
        (None, Some(snippet)) => snippet.to_string(),
        _ => hit.to_string(),
    }
}

/// Normalise a raw `find` response into text lines
pub fn normalize_hits(response: &Value) -> Vec<String> {
    let hits = match response.get("hits") {
        Some(Value::Array(hits)) => hits,
        _ => match response {
            Value::Array(hits) => hits,
            _ => return Vec::new(),
        },
    };

    hits.iter().map(format_hit).collect()
}

/// Options for opening a [`FileIndex`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIndexOptions {
    pub path: PathBuf,
    /// Create an empty index when `path` does not exist
    pub create_if_missing: bool,
    /// Default search mode
    pub mode: Option<IndexMode>,
}

impl ExternalIndexOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            mode: None,
        }
    }
}

/// External index stored as a JSON array of hits in a single file
///
/// Only lexical matching is available; other modes are served lexically.
pub struct FileIndex {
    path: PathBuf,
    entries: RwLock<Vec<Value>>,
}

impl FileIndex {
    /// Open an existing index file, or create one when allowed
    pub fn open(options: &ExternalIndexOptions) -> Result<Self, IndexError> {
        let path = options.path.clone();

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str::<Vec<Value>>(&raw)?
            }
        } else if options.create_if_missing {
            std::fs::write(&path, "[]")?;
            Vec::new()
        } else {
            return Err(IndexError::NotFound(path));
        };

        info!(path = %path.display(), entries = entries.len(), "Opened external index");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Append an entry; persisted on [`FileIndex::seal`]
    pub fn add_entry(&self, entry: Value) {
        self.entries.write().push(entry);
    }

    /// Convenience for `{title, snippet}` entries
    pub fn add_document(&self, title: &str, snippet: &str) {
        self.add_entry(json!({ "title": title, "snippet": snippet }));
    }

    /// Flush all entries to disk
    pub fn seal(&self) -> Result<(), IndexError> {
        let raw = serde_json::to_string_pretty(&*self.entries.read())?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn entry_text(entry: &Value) -> String {
        match entry {
            Value::String(s) => s.to_lowercase(),
            other => ["title", "snippet", "text", "content"]
                .iter()
                .filter_map(|key| other.get(*key).and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

#[async_trait]
impl ExternalIndex for FileIndex {
    async fn find(&self, query: &str, k: usize, mode: Option<IndexMode>) -> Result<Value, IndexError> {
        if matches!(mode, Some(IndexMode::Sem) | Some(IndexMode::Clip)) {
            debug!(mode = ?mode, "File index serves lexical matches only");
        }

        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() || k == 0 {
            return Ok(json!({ "hits": [] }));
        }

        let entries = self.entries.read();
        let mut scored: Vec<(usize, &Value)> = entries
            .iter()
            .map(|entry| {
                let text = Self::entry_text(entry);
                let score = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (score, entry)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let hits: Vec<Value> = scored.into_iter().take(k).map(|(_, e)| e.clone()).collect();
        Ok(json!({ "hits": hits }))
    }
}
