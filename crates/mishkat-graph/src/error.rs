//! Error types for mishkat-graph

use thiserror::Error;

/// Errors from the graph store and relational resolution.
///
/// The graph is an optional collaborator: callers map these into empty
/// results plus a degraded-feature flag rather than failing requests.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph store unreachable or returned a transport error
    #[error("Graph store error: {0}")]
    Store(String),

    /// The graph store reported query errors
    #[error("Graph query failed: {0}")]
    Query(String),

    /// Relational store error
    #[error("Relational store error: {0}")]
    Relational(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for mishkat-graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
