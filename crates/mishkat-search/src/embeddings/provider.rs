//! Embedding provider trait and status types
//!
//! The semantic channel depends on a remote embedding API. Two providers are
//! supported: Google's `embedContent` endpoint (default) and any
//! OpenAI-compatible `/v1/embeddings` endpoint. Both are async, retried,
//! and rate-limited; neither is ever allowed to fail a request — the
//! semantic searcher degrades to an empty channel instead.

use async_trait::async_trait;

use mishkat_config::EmbeddingProviderType;

use crate::error::Result;

/// Status of an embedding provider, for diagnostics and the doctor command.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Type of provider
    pub provider_type: EmbeddingProviderType,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn healthy(provider_type: EmbeddingProviderType) -> Self {
        Self {
            available: true,
            provider_type,
            latency_ms: None,
            error: None,
        }
    }

    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider_type,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Embedding provider abstraction.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one
/// provider across concurrent requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Check provider connectivity.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Stable model identifier; part of the embedding cache key, so it must
    /// change whenever the produced vectors would.
    fn model_id(&self) -> &str;

    /// Provider type tag.
    fn provider_type(&self) -> EmbeddingProviderType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_constructors() {
        let healthy = ProviderStatus::healthy(EmbeddingProviderType::Gemini).with_latency(120);
        assert!(healthy.available);
        assert_eq!(healthy.latency_ms, Some(120));

        let down = ProviderStatus::unavailable(EmbeddingProviderType::Openai, "connection refused");
        assert!(!down.available);
        assert_eq!(down.error.as_deref(), Some("connection refused"));
    }
}
