//! Error types for mishkat-core

use thiserror::Error;

/// Errors raised by the domain model.
///
/// Note that source-ref parsing does NOT go through this type: malformed
/// refs are dropped silently per the data-model contract, so those paths
/// return `Option` instead.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A canonical document ID failed to parse
    #[error("Invalid canonical document ID: {0}")]
    InvalidDocId(String),

    /// The embedded direct-match data file is malformed
    #[error("Direct-match table error: {0}")]
    DirectTable(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn invalid_doc_id(s: &str) -> Self {
        CoreError::InvalidDocId(s.to_string())
    }
}

/// Result type for mishkat-core operations
pub type Result<T> = std::result::Result<T, CoreError>;
