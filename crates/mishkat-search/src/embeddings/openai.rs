//! OpenAI-compatible embedding provider
//!
//! Works against any `/v1/embeddings`-shaped endpoint (OpenAI, Azure
//! OpenAI, local inference servers). Single model; the Arabic corpora are
//! embedded by the same model as the queries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use mishkat_config::{EmbeddingProviderType, OpenAiEmbeddingSettings};

use super::provider::{EmbeddingProvider, ProviderStatus};
use crate::error::{Result, SearchError};

const RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible embedding provider.
pub struct OpenAiProvider {
    client: Client,
    settings: OpenAiEmbeddingSettings,
    dimension: AtomicUsize,
}

impl OpenAiProvider {
    pub fn new(settings: OpenAiEmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            settings,
            dimension: AtomicUsize::new(0),
        })
    }

    fn embeddings_url(&self) -> String {
        let base = self.settings.url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/embeddings")
        } else {
            format!("{base}/v1/embeddings")
        }
    }

    fn api_key(&self) -> Option<String> {
        self.settings
            .api_key_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())
    }

    async fn request_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            match self.send_request(texts.clone()).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    if matches!(e, SearchError::Auth(_)) {
                        return Err(e);
                    }
                    if attempt < self.settings.max_retries {
                        tokio::time::sleep(retry_delay).await;
                        retry_delay *= 2;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SearchError::ProviderUnavailable("Request failed after retries".into())
        }))
    }

    async fn send_request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest {
            model: self.settings.model.clone(),
            input: texts,
        };

        let mut request = self.client.post(self.embeddings_url()).json(&body);
        if let Some(key) = self.api_key() {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout("embedding request".into())
            } else {
                SearchError::ProviderUnavailable(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let mut parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
                    SearchError::ProviderUnavailable(format!("Invalid response: {e}"))
                })?;

                // The API documents index-aligned output; sort defensively
                // is not needed, but keep input order by index
                parsed.data.sort_by_key(|d| d.index);
                let embeddings: Vec<Vec<f32>> =
                    parsed.data.into_iter().map(|d| d.embedding).collect();

                if let Some(first) = embeddings.first() {
                    let dim = first.len();
                    let cached = self.dimension.load(Ordering::Relaxed);
                    if cached == 0 {
                        self.dimension.store(dim, Ordering::Relaxed);
                    } else if cached != dim {
                        return Err(SearchError::DimensionMismatch {
                            expected: cached,
                            actual: dim,
                        });
                    }
                }

                Ok(embeddings)
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::Auth(format!("authentication failed: {body}")))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(SearchError::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderUnavailable(format!(
                    "Request failed with status {status}: {body}"
                )))
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request_with_retry(texts).await
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = Instant::now();
        match self.send_request(vec!["health check".into()]).await {
            Ok(_) | Err(SearchError::RateLimited { .. }) => {
                Ok(ProviderStatus::healthy(EmbeddingProviderType::Openai)
                    .with_latency(start.elapsed().as_millis() as u64))
            }
            Err(e) => Ok(ProviderStatus::unavailable(
                EmbeddingProviderType::Openai,
                e.to_string(),
            )),
        }
    }

    fn model_id(&self) -> &str {
        &self.settings.model
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("url", &self.settings.url)
            .field("model", &self.settings.model)
            .finish()
    }
}
