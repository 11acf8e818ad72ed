//! SmartGPT context configuration

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smartgpt_common::{Result, SmartError};
use smartgpt_explorer::ExplorerConfig;
use smartgpt_memory::{ExternalIndexOptions, IndexMode, Neo4jSettings};

/// Context configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Embedding configuration
    pub embedding: EmbeddingSettings,
    /// Vector memory configuration
    pub memory: MemorySettings,
    /// External index configuration
    pub index: IndexSettings,
    /// Graph backend configuration
    pub graph: GraphSettings,
    /// Defaults for explorers built from the context
    pub explorer: ExplorerConfig,
}

impl ContextConfig {
    /// Load configuration from `.env` and `SMARTGPT_*` environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` onto the defaults.
    ///
    /// Blank values count as unset; values that fail to parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        // Embedding settings
        if let Some(val) = get("SMARTGPT_EMBED_DIM") {
            cfg.embedding.dimension = parse("SMARTGPT_EMBED_DIM", &val)?;
        }
        if let Some(val) = get("SMARTGPT_EMBED_ENDPOINT") {
            cfg.embedding.endpoint = Some(val);
        }
        if let Some(val) = get("SMARTGPT_EMBED_MODEL") {
            cfg.embedding.model = val;
        }
        if let Some(val) = get("SMARTGPT_EMBED_API_KEY") {
            cfg.embedding.api_key = Some(val);
        }

        // Memory settings
        if let Some(val) = get("SMARTGPT_MEMORY_PATH") {
            cfg.memory.path = Some(PathBuf::from(val));
        }

        // External index settings
        if let Some(val) = get("SMARTGPT_INDEX_PATH") {
            cfg.index.path = Some(PathBuf::from(val));
        }
        if let Some(val) = get("SMARTGPT_INDEX_MODE") {
            cfg.index.mode = Some(parse::<IndexMode>("SMARTGPT_INDEX_MODE", &val)?);
        }
        if let Some(val) = get("SMARTGPT_INDEX_CREATE") {
            cfg.index.create_if_missing = parse_flag("SMARTGPT_INDEX_CREATE", &val)?;
        }

        // Graph settings
        if let Some(val) = get("SMARTGPT_USE_GRAPH") {
            cfg.graph.enabled = parse_flag("SMARTGPT_USE_GRAPH", &val)?;
        }
        if let Some(val) = get("SMARTGPT_GRAPH_URL") {
            cfg.graph.neo4j.url = val;
        }
        if let Some(val) = get("SMARTGPT_GRAPH_USER") {
            cfg.graph.neo4j.username = val;
        }
        if let Some(val) = get("SMARTGPT_GRAPH_PASSWORD") {
            cfg.graph.neo4j.password = val;
        }
        if let Some(val) = get("SMARTGPT_GRAPH_DATABASE") {
            cfg.graph.neo4j.database = val;
        }

        // Explorer settings
        if let Some(val) = get("SMARTGPT_EXPLORE_BUDGET") {
            cfg.explorer.budget = parse("SMARTGPT_EXPLORE_BUDGET", &val)?;
        }
        if let Some(val) = get("SMARTGPT_EXPLORE_DEPTH") {
            cfg.explorer.max_depth = parse("SMARTGPT_EXPLORE_DEPTH", &val)?;
        }

        Ok(cfg)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SmartError::invalid_setting(key, value))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SmartError::invalid_setting(key, value)),
    }
}

/// Embedding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Dimension of the local hashing embedder, and of the store when no
    /// endpoint is configured
    pub dimension: usize,
    /// OpenAI-compatible embedding endpoint; local hashing when unset
    pub endpoint: Option<String>,
    /// Model requested from the endpoint
    pub model: String,
    /// Bearer token for the endpoint
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimension: smartgpt_common::DEFAULT_EMBED_DIM,
            endpoint: None,
            model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

/// Vector memory settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySettings {
    /// SQLite database file; memory is process-local when unset
    pub path: Option<PathBuf>,
}

/// External index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Index file; the external index is skipped when unset
    pub path: Option<PathBuf>,
    /// Default search mode
    pub mode: Option<IndexMode>,
    /// Create an empty index when the file does not exist
    pub create_if_missing: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: None,
            mode: None,
            create_if_missing: true,
        }
    }
}

impl IndexSettings {
    /// Options for opening the configured index, if any
    pub fn options(&self) -> Option<ExternalIndexOptions> {
        self.path.as_ref().map(|path| ExternalIndexOptions {
            path: path.clone(),
            create_if_missing: self.create_if_missing,
            mode: self.mode,
        })
    }
}

/// Graph backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Try the graph backend during initialisation
    pub enabled: bool,
    /// Connection settings
    pub neo4j: Neo4jSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = ContextConfig::from_lookup(|_| None).unwrap();

        assert_eq!(cfg.embedding.dimension, 384);
        assert!(cfg.embedding.endpoint.is_none());
        assert!(cfg.memory.path.is_none());
        assert!(cfg.index.options().is_none());
        assert!(!cfg.graph.enabled);
        assert_eq!(cfg.graph.neo4j.url, "http://localhost:7474");
        assert_eq!(cfg.explorer.budget, 256);
    }

    #[test]
    fn test_overlay_from_env() {
        let cfg = ContextConfig::from_lookup(lookup(&[
            ("SMARTGPT_EMBED_DIM", "64"),
            ("SMARTGPT_EMBED_ENDPOINT", "http://embed:8080"),
            ("SMARTGPT_MEMORY_PATH", "/var/lib/smartgpt/memory.sqlite"),
            ("SMARTGPT_INDEX_PATH", "/var/lib/smartgpt/index.json"),
            ("SMARTGPT_INDEX_MODE", "sem"),
            ("SMARTGPT_INDEX_CREATE", "false"),
            ("SMARTGPT_USE_GRAPH", "yes"),
            ("SMARTGPT_GRAPH_USER", "reader"),
            ("SMARTGPT_EXPLORE_BUDGET", "32"),
            ("SMARTGPT_EXPLORE_DEPTH", "3"),
        ]))
        .unwrap();

        assert_eq!(cfg.embedding.dimension, 64);
        assert_eq!(cfg.embedding.endpoint.as_deref(), Some("http://embed:8080"));
        assert_eq!(
            cfg.memory.path,
            Some(PathBuf::from("/var/lib/smartgpt/memory.sqlite"))
        );
        let options = cfg.index.options().unwrap();
        assert_eq!(options.mode, Some(IndexMode::Sem));
        assert!(!options.create_if_missing);
        assert!(cfg.graph.enabled);
        assert_eq!(cfg.graph.neo4j.username, "reader");
        assert_eq!(cfg.graph.neo4j.password, "password");
        assert_eq!((cfg.explorer.budget, cfg.explorer.max_depth), (32, 3));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let cfg = ContextConfig::from_lookup(lookup(&[
            ("SMARTGPT_EMBED_ENDPOINT", "  "),
            ("SMARTGPT_INDEX_PATH", ""),
        ]))
        .unwrap();

        assert!(cfg.embedding.endpoint.is_none());
        assert!(cfg.index.path.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ContextConfig::from_lookup(lookup(&[("SMARTGPT_EMBED_DIM", "wide")])).unwrap_err();
        assert!(matches!(err, SmartError::Config(_)));
        assert!(err.to_string().contains("SMARTGPT_EMBED_DIM"));

        let err = ContextConfig::from_lookup(lookup(&[("SMARTGPT_INDEX_MODE", "fuzzy")])).unwrap_err();
        assert!(matches!(err, SmartError::Config(_)));

        let err = ContextConfig::from_lookup(lookup(&[("SMARTGPT_USE_GRAPH", "maybe")])).unwrap_err();
        assert!(matches!(err, SmartError::Config(_)));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut cfg = ContextConfig::default();
        cfg.embedding.api_key = Some("sk-secret".to_string());

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
