//! Mishkat Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.mishkat/config.toml`
//! - Local config: `.mishkat/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//! Secrets never live in config files: every credential field names an
//! environment variable instead.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for Mishkat.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MishkatConfig {
    /// Vector store (qdrant) settings
    pub vector: VectorStoreSettings,

    /// BM25 text engine settings
    pub text_engine: TextEngineSettings,

    /// Relational store settings (read-only corpora)
    pub relational: RelationalSettings,

    /// Graph store settings (knowledge graph)
    pub graph: GraphStoreSettings,

    /// Embedding provider configuration
    pub embedding: EmbeddingSettings,

    /// LLM endpoint (expander + reranker)
    pub llm: LlmSettings,

    /// Retrieval and fusion knobs
    pub search: SearchSettings,

    /// Hadith corpus settings
    pub hadith: HadithSettings,

    /// Translation edition defaults
    pub translations: TranslationSettings,

    /// Cache layer settings
    pub cache: CacheSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

impl MishkatConfig {
    /// Validate provider-specific required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        if self.llm.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.base_url is required".to_string(),
            ));
        }
        if self.search.post_rerank_limit == 0 {
            return Err(ConfigError::ValidationError(
                "search.post_rerank_limit must be at least 1".to_string(),
            ));
        }
        if self.search.pre_rerank_limit < self.search.post_rerank_limit {
            return Err(ConfigError::ValidationError(
                "search.pre_rerank_limit must not be below post_rerank_limit".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply CLI overrides in place.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.vector_url {
            self.vector.url = url.clone();
        }
        if let Some(ref url) = overrides.text_engine_url {
            self.text_engine.url = url.clone();
        }
        if let Some(ref url) = overrides.database_url {
            self.relational.database_url = url.clone();
        }
        if let Some(ref url) = overrides.graph_url {
            self.graph.url = url.clone();
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }
}

/// CLI-level configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub vector_url: Option<String>,
    pub text_engine_url: Option<String>,
    pub database_url: Option<String>,
    pub graph_url: Option<String>,
    pub log_level: Option<String>,
}

/// Vector store (qdrant) connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Qdrant gRPC URL
    pub url: String,

    /// Environment variable name containing the API key
    pub api_key_env: Option<String>,

    /// Collection names per corpus; created offline, never by the core
    pub quran_collection: String,
    pub hadith_collection: String,
    pub book_collection: String,

    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key_env: None,
            quran_collection: "quran_verses".to_string(),
            hadith_collection: "hadith_narrations".to_string(),
            book_collection: "book_pages".to_string(),
            timeout_secs: 30,
        }
    }
}

/// BM25 text engine settings (Elasticsearch-compatible `_search` API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextEngineSettings {
    pub url: String,
    pub api_key_env: Option<String>,

    /// Index names per corpus
    pub quran_index: String,
    pub hadith_index: String,
    pub book_index: String,

    pub timeout_secs: u64,
}

impl Default for TextEngineSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            api_key_env: None,
            quran_index: "quran_verses".to_string(),
            hadith_index: "hadith_narrations".to_string(),
            book_index: "book_pages".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Relational store settings. The request path is strictly read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalSettings {
    /// sqlx connection URL (e.g. `sqlite://data/mishkat.db?mode=ro`)
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for RelationalSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/mishkat.db?mode=ro".to_string(),
            max_connections: 16,
        }
    }
}

/// Graph store settings (Cypher-over-HTTP transactional endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStoreSettings {
    pub url: String,
    pub database: String,
    pub user_env: Option<String>,
    pub password_env: Option<String>,
    pub timeout_secs: u64,
    /// Full-text index name over entity name fields
    pub name_index: String,
}

impl Default for GraphStoreSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            user_env: Some("MISHKAT_GRAPH_USER".to_string()),
            password_env: Some("MISHKAT_GRAPH_PASSWORD".to_string()),
            timeout_secs: 5,
            name_index: "entity_names".to_string(),
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Google Generative Language `embedContent` API (default)
    #[default]
    Gemini,
    /// OpenAI-compatible `/v1/embeddings` API
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::Openai),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown embedding provider: '{s}'. Valid values: gemini, openai"
            ))),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Which embedding provider to use
    pub provider: EmbeddingProviderType,

    /// Gemini provider settings
    pub gemini: GeminiSettings,

    /// OpenAI-compatible provider settings
    pub openai: Option<OpenAiEmbeddingSettings>,
}

impl EmbeddingSettings {
    /// Validate that required settings exist for the selected provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderType::Gemini => {
                if self.gemini.model.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.gemini.model is required".to_string(),
                    ));
                }
                Ok(())
            }
            EmbeddingProviderType::Openai => {
                let Some(settings) = &self.openai else {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'openai' but [embedding.openai] section is missing"
                            .to_string(),
                    ));
                };
                if settings.url.is_empty() || settings.model.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.openai.url and embedding.openai.model are required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Gemini embedding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "MISHKAT_GEMINI_API_KEY".to_string(),
            model: "text-embedding-004".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// OpenAI-compatible embedding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiEmbeddingSettings {
    pub url: String,
    pub api_key_env: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OpenAiEmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// LLM chat endpoint settings, shared by the query expander and reranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key_env: Option<String>,

    /// Model used for query expansion
    pub expansion_model: String,
    /// Model used for cross-corpus reranking
    pub reranker_model: String,

    /// Sampling temperature; 0.0 for deterministic output
    pub temperature: f32,
    pub expansion_timeout_secs: u64,
    pub rerank_timeout_secs: u64,

    /// Combined in-flight request cap across expander and reranker
    pub max_concurrency: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key_env: Some("MISHKAT_LLM_API_KEY".to_string()),
            expansion_model: "gpt-oss-120b".to_string(),
            reranker_model: "gpt-oss-120b".to_string(),
            temperature: 0.0,
            expansion_timeout_secs: 8,
            rerank_timeout_secs: 12,
            max_concurrency: 15,
        }
    }
}

/// Retrieval and fusion knobs.
///
/// `norm_k` and `rrf_k` are tuning knobs, not contracts; the BM25 `k1`/`b`
/// parameters by contrast are fixed in the keyword searcher because changing
/// them requires re-indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Upper bound on per-corpus returned hits
    pub limit: usize,

    /// Standard-mode baseline similarity floor
    pub similarity_cutoff: f32,
    /// Refine-mode baseline similarity floor
    pub refine_similarity_cutoff: f32,

    /// Candidates sent to the reranker
    pub pre_rerank_limit: usize,
    /// Final list size after reranking
    pub post_rerank_limit: usize,

    /// Per-corpus candidate budget for the rerank pool
    pub per_query_quran: usize,
    pub per_query_hadith: usize,
    pub per_query_books: usize,

    /// BM25 normalization constant: `s / (s + norm_k)`
    pub norm_k: f32,
    /// Reciprocal rank fusion constant
    pub rrf_k: f32,

    /// RRF weight of the original query
    pub weight_original: f32,
    /// RRF weight of each expanded sub-query
    pub weight_expanded: f32,

    /// Concurrency cap on in-flight (subquery x corpus) searches
    pub fanout_concurrency: usize,

    /// Request deadlines
    pub deadline_standard_secs: u64,
    pub deadline_refine_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: 20,
            similarity_cutoff: 0.60,
            refine_similarity_cutoff: 0.25,
            pre_rerank_limit: 70,
            post_rerank_limit: 10,
            per_query_quran: 30,
            per_query_hadith: 25,
            per_query_books: 15,
            norm_k: 60.0,
            rrf_k: 60.0,
            weight_original: 1.0,
            weight_expanded: 1.0,
            fanout_concurrency: 15,
            deadline_standard_secs: 15,
            deadline_refine_secs: 30,
        }
    }
}

/// Hadith corpus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HadithSettings {
    /// Collections enabled by default; requests may narrow this set
    pub enabled_collections: Vec<String>,
}

impl Default for HadithSettings {
    fn default() -> Self {
        Self {
            enabled_collections: vec![
                "bukhari".to_string(),
                "muslim".to_string(),
                "abu_dawud".to_string(),
                "tirmidhi".to_string(),
                "nasai".to_string(),
                "ibn_majah".to_string(),
            ],
        }
    }
}

/// Translation edition defaults, attached to responses (never searched).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub quran_edition: String,
    pub hadith_edition: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            quran_edition: "eng-khattab".to_string(),
            hadith_edition: "eng-darussalam".to_string(),
        }
    }
}

/// Cache layer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Directory for durable cache files
    pub dir: PathBuf,
    /// In-memory query-embedding LRU capacity
    pub embedding_capacity: usize,
    /// In-memory translation LRU capacity
    pub translation_capacity: usize,
    /// Expansion prompt version; part of the expansion cache key
    pub prompt_version: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".mishkat/cache"),
            embedding_capacity: 10_000,
            translation_capacity: 1_000,
            prompt_version: "v3".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// EnvFilter directive, e.g. `info` or `mishkat=debug`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = MishkatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.norm_k, 60.0);
        assert_eq!(config.search.post_rerank_limit, 10);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Gemini);
    }

    #[test]
    fn test_openai_provider_requires_section() {
        let mut config = MishkatConfig::default();
        config.embedding.provider = EmbeddingProviderType::Openai;
        assert!(config.validate().is_err());

        config.embedding.openai = Some(OpenAiEmbeddingSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rerank_limit_ordering_enforced() {
        let mut config = MishkatConfig::default();
        config.search.pre_rerank_limit = 5;
        config.search.post_rerank_limit = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(
            "gemini".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Gemini
        );
        assert!("candle".parse::<EmbeddingProviderType>().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = MishkatConfig::default();
        config.apply_overrides(&ConfigOverrides {
            vector_url: Some("http://qdrant:6334".into()),
            log_level: Some("debug".into()),
            ..Default::default()
        });
        assert_eq!(config.vector.url, "http://qdrant:6334");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MishkatConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: MishkatConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
