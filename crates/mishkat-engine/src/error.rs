//! Error types for mishkat-engine
//!
//! Only two failure classes ever reach the request boundary: input errors
//! (the 400 class) and total backend loss (the 5xx class). Everything else
//! degrades inside the pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The query failed validation; the only user-facing 400
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Every enabled corpus and the graph failed; the only 5xx
    #[error("all retrieval backends failed")]
    AllBackendsFailed,

    /// Engine construction failed (bad config, unreachable mandatory store)
    #[error("engine initialization failed: {0}")]
    Init(String),
}

impl From<mishkat_search::SearchError> for EngineError {
    fn from(err: mishkat_search::SearchError) -> Self {
        EngineError::Init(err.to_string())
    }
}

impl From<mishkat_graph::GraphError> for EngineError {
    fn from(err: mishkat_graph::GraphError) -> Self {
        EngineError::Init(err.to_string())
    }
}

impl From<mishkat_config::ConfigError> for EngineError {
    fn from(err: mishkat_config::ConfigError) -> Self {
        EngineError::Init(err.to_string())
    }
}

/// Result type for mishkat-engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
