//! Configuration management.
//!
//! Options load from a JSON file under the top-level `MemNet` key and can be
//! overridden per-option through `MEMNET_*` environment variables (the
//! environment wins). The resulting [`MemNetConfig`] is an immutable value
//! handed to each component at construction; there is no ambient container.
//!
//! ```json
//! {
//!   "MemNet": {
//!     "VectorStore": { "Endpoint": "http://localhost:6333", "CollectionName": "memnet_collection" },
//!     "LLM": { "Endpoint": "https://api.openai.com/v1", "Model": "gpt-4o-mini", "ApiKey": "sk-..." },
//!     "Embedder": { "Endpoint": "https://api.openai.com/v1", "Model": "text-embedding-3-small", "ApiKey": "sk-..." },
//!     "DuplicateThreshold": 0.6,
//!     "EnableReranking": true
//!   }
//! }
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Vector store connection options.
#[derive(Debug, Clone, Default)]
pub struct VectorStoreConfig {
    /// Backend endpoint. `http(s)://` selects the Qdrant backend,
    /// `redis://` / `rediss://` the Redis backend.
    pub endpoint: Option<String>,
    /// Collection (or index) name.
    pub collection_name: String,
    /// Optional credential. For the Redis backend the form
    /// `user:password` unlocks ACL credentials on the connection.
    pub api_key: Option<String>,
}

/// LLM provider options.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Chat-completions base endpoint.
    pub endpoint: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
}

/// Embedding provider options.
#[derive(Debug, Clone, Default)]
pub struct EmbedderConfig {
    /// Embeddings base endpoint.
    pub endpoint: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
}

/// Main configuration for memnet.
#[derive(Debug, Clone)]
pub struct MemNetConfig {
    /// Vector store connection options.
    pub vector_store: VectorStoreConfig,
    /// LLM provider options.
    pub llm: LlmConfig,
    /// Embedding provider options.
    pub embedder: EmbedderConfig,
    /// Similarity cut-off above which a new statement merges into an
    /// existing memory. Higher means more similar; the merge condition is
    /// strictly `score > duplicate_threshold`.
    pub duplicate_threshold: f32,
    /// Whether search results pass through the LLM reranker.
    pub enable_reranking: bool,
    /// Reserved: conversation history window for future use.
    pub history_limit: usize,
}

impl Default for MemNetConfig {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreConfig {
                endpoint: None,
                collection_name: Self::DEFAULT_COLLECTION.to_string(),
                api_key: None,
            },
            llm: LlmConfig::default(),
            embedder: EmbedderConfig::default(),
            duplicate_threshold: Self::DEFAULT_DUPLICATE_THRESHOLD,
            enable_reranking: true,
            history_limit: 10,
        }
    }
}

impl MemNetConfig {
    /// Default collection name.
    pub const DEFAULT_COLLECTION: &'static str = "memnet_collection";

    /// Default duplicate threshold (similarity).
    pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.6;

    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the environment only.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads configuration from a JSON file, then applies environment
    /// overrides (the environment wins).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or does
    /// not parse as the documented shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&raw).map(Self::with_env_overrides)
    }

    /// Parses configuration from a JSON string holding the `MemNet` key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("malformed config: {e}")))?;
        let mut config = Self::default();
        if let Some(section) = file.mem_net {
            config.apply_file_section(section);
        }
        Ok(config)
    }

    fn apply_file_section(&mut self, section: MemNetSection) {
        if let Some(store) = section.vector_store {
            if store.endpoint.is_some() {
                self.vector_store.endpoint = store.endpoint;
            }
            if let Some(name) = store.collection_name {
                self.vector_store.collection_name = name;
            }
            if store.api_key.is_some() {
                self.vector_store.api_key = store.api_key;
            }
        }
        if let Some(llm) = section.llm {
            apply_provider(&mut self.llm.endpoint, llm.endpoint);
            apply_provider(&mut self.llm.model, llm.model);
            apply_provider(&mut self.llm.api_key, llm.api_key);
        }
        if let Some(embedder) = section.embedder {
            apply_provider(&mut self.embedder.endpoint, embedder.endpoint);
            apply_provider(&mut self.embedder.model, embedder.model);
            apply_provider(&mut self.embedder.api_key, embedder.api_key);
        }
        if let Some(threshold) = section.duplicate_threshold {
            self.duplicate_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(enabled) = section.enable_reranking {
            self.enable_reranking = enabled;
        }
        if let Some(limit) = section.history_limit {
            self.history_limit = limit;
        }
    }

    /// Applies `MEMNET_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("MEMNET_VECTOR_STORE_ENDPOINT") {
            self.vector_store.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_VECTOR_STORE_COLLECTION_NAME") {
            self.vector_store.collection_name = v;
        }
        if let Ok(v) = std::env::var("MEMNET_VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_LLM_ENDPOINT") {
            self.llm.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_EMBEDDER_ENDPOINT") {
            self.embedder.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_EMBEDDER_MODEL") {
            self.embedder.model = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_EMBEDDER_API_KEY") {
            self.embedder.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("MEMNET_DUPLICATE_THRESHOLD") {
            if let Ok(threshold) = v.parse::<f32>() {
                self.duplicate_threshold = threshold.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("MEMNET_ENABLE_RERANKING") {
            self.enable_reranking = v.to_lowercase() == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("MEMNET_HISTORY_LIMIT") {
            if let Ok(limit) = v.parse::<usize>() {
                self.history_limit = limit;
            }
        }
        self
    }

    /// Checks that every option the standard wiring needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing option.
    pub fn validate(&self) -> Result<()> {
        if self.vector_store.endpoint.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Configuration(
                "VectorStore.Endpoint is required".to_string(),
            ));
        }
        if self.vector_store.collection_name.is_empty() {
            return Err(Error::Configuration(
                "VectorStore.CollectionName must not be empty".to_string(),
            ));
        }
        if self.llm.endpoint.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Configuration("LLM.Endpoint is required".to_string()));
        }
        if self.llm.model.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Configuration("LLM.Model is required".to_string()));
        }
        if self.embedder.endpoint.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Configuration(
                "Embedder.Endpoint is required".to_string(),
            ));
        }
        if self.embedder.model.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Configuration(
                "Embedder.Model is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn apply_provider(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// File-level wrapper: everything sits under the `MemNet` key.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "MemNet")]
    mem_net: Option<MemNetSection>,
}

#[derive(Debug, Deserialize)]
struct MemNetSection {
    #[serde(rename = "VectorStore")]
    vector_store: Option<VectorStoreSection>,
    #[serde(rename = "LLM")]
    llm: Option<ProviderSection>,
    #[serde(rename = "Embedder")]
    embedder: Option<ProviderSection>,
    #[serde(rename = "DuplicateThreshold")]
    duplicate_threshold: Option<f32>,
    #[serde(rename = "EnableReranking")]
    enable_reranking: Option<bool>,
    #[serde(rename = "HistoryLimit")]
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct VectorStoreSection {
    #[serde(rename = "Endpoint")]
    endpoint: Option<String>,
    #[serde(rename = "CollectionName")]
    collection_name: Option<String>,
    #[serde(rename = "ApiKey")]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderSection {
    #[serde(rename = "Endpoint")]
    endpoint: Option<String>,
    #[serde(rename = "Model")]
    model: Option<String>,
    #[serde(rename = "ApiKey")]
    api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MemNetConfig::default();
        assert_eq!(config.vector_store.collection_name, "memnet_collection");
        assert!((config.duplicate_threshold - 0.6).abs() < f32::EPSILON);
        assert!(config.enable_reranking);
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn test_from_json_full() {
        let raw = r#"{
            "MemNet": {
                "VectorStore": {
                    "Endpoint": "http://localhost:6333",
                    "CollectionName": "chat_memories",
                    "ApiKey": "qd-key"
                },
                "LLM": { "Endpoint": "http://llm", "Model": "gpt-4o-mini", "ApiKey": "sk-a" },
                "Embedder": { "Endpoint": "http://emb", "Model": "text-embedding-3-small" },
                "DuplicateThreshold": 0.9,
                "EnableReranking": false,
                "HistoryLimit": 20
            }
        }"#;
        let config = MemNetConfig::from_json(raw).unwrap();
        assert_eq!(
            config.vector_store.endpoint.as_deref(),
            Some("http://localhost:6333")
        );
        assert_eq!(config.vector_store.collection_name, "chat_memories");
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.embedder.api_key, None);
        assert!((config.duplicate_threshold - 0.9).abs() < f32::EPSILON);
        assert!(!config.enable_reranking);
        assert_eq!(config.history_limit, 20);
    }

    #[test]
    fn test_from_json_partial_keeps_defaults() {
        let raw = r#"{ "MemNet": { "LLM": { "Model": "llama3" } } }"#;
        let config = MemNetConfig::from_json(raw).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("llama3"));
        assert_eq!(config.vector_store.collection_name, "memnet_collection");
        assert!(config.enable_reranking);
    }

    #[test]
    fn test_from_json_malformed() {
        let result = MemNetConfig::from_json("{not json");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_threshold_clamped() {
        let raw = r#"{ "MemNet": { "DuplicateThreshold": 3.5 } }"#;
        let config = MemNetConfig::from_json(raw).unwrap();
        assert!((config.duplicate_threshold - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_missing_endpoint() {
        let config = MemNetConfig::default();
        let result = config.validate();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_complete() {
        let mut config = MemNetConfig::default();
        config.vector_store.endpoint = Some("http://localhost:6333".to_string());
        config.llm.endpoint = Some("http://llm".to_string());
        config.llm.model = Some("gpt-4o-mini".to_string());
        config.embedder.endpoint = Some("http://emb".to_string());
        config.embedder.model = Some("text-embedding-3-small".to_string());
        assert!(config.validate().is_ok());
    }
}
