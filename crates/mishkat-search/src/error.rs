//! Error types for mishkat-search
//!
//! Every variant here is recoverable somewhere: the orchestrator converts
//! per-collaborator failures into empty results plus a degraded-feature
//! flag, so none of these ever reach the request boundary directly.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Vector store (qdrant) error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Text engine (BM25) error
    #[error("Text engine error: {0}")]
    TextEngine(String),

    /// Connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Embedding provider error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding provider unavailable
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider authentication failed
    #[error("Provider authentication failed: {0}")]
    Auth(String),

    /// Provider rate limited
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// LLM endpoint error
    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM response did not parse into the expected shape
    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Durable cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        SearchError::VectorStore(err.to_string())
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(err: rusqlite::Error) -> Self {
        SearchError::Cache(err.to_string())
    }
}

/// Result type for mishkat-search operations
pub type Result<T> = std::result::Result<T, SearchError>;
