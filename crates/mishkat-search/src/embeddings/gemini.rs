//! Gemini embedding provider
//!
//! Calls the Google Generative Language `batchEmbedContents` endpoint:
//!
//! - POST `{base_url}/models/{model}:batchEmbedContents?key={api_key}`
//! - Request: `{"requests": [{"model": "models/...", "content": {"parts": [{"text": ...}]}}]}`
//! - Response: `{"embeddings": [{"values": [...]}, ...]}`
//!
//! Transient failures are retried with exponential backoff; 429 responses
//! surface the server's Retry-After. A token bucket caps outbound request
//! rate when the `rate-limit` feature is enabled (default).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[cfg(feature = "rate-limit")]
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;
#[cfg(feature = "rate-limit")]
use std::sync::Arc;

use mishkat_config::{EmbeddingProviderType, GeminiSettings};

use super::provider::{EmbeddingProvider, ProviderStatus};
use crate::error::{Result, SearchError};

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Default requests per second limit
#[cfg(feature = "rate-limit")]
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

#[cfg(feature = "rate-limit")]
type GeminiRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

/// Gemini embedding provider.
pub struct GeminiProvider {
    client: Client,
    settings: GeminiSettings,
    /// Qualified model id used in cache keys, e.g. `gemini/text-embedding-004`
    model_id: String,
    /// Cached embedding dimension (detected from first response)
    dimension: AtomicUsize,
    #[cfg(feature = "rate-limit")]
    rate_limiter: Arc<GeminiRateLimiter>,
}

impl GeminiProvider {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {e}")))?;

        #[cfg(feature = "rate-limit")]
        let rate_limiter = {
            let rps = NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND).unwrap();
            Arc::new(RateLimiter::direct(Quota::per_second(rps)))
        };

        let model_id = format!("gemini/{}", settings.model);

        Ok(Self {
            client,
            settings,
            model_id,
            dimension: AtomicUsize::new(0),
            #[cfg(feature = "rate-limit")]
            rate_limiter,
        })
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.settings.api_key_env).map_err(|_| {
            SearchError::Auth(format!(
                "environment variable {} is not set",
                self.settings.api_key_env
            ))
        })
    }

    fn endpoint(&self, key: &str) -> String {
        format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            key
        )
    }

    #[cfg(feature = "rate-limit")]
    async fn wait_for_permit(&self) {
        self.rate_limiter.until_ready().await;
    }

    #[cfg(not(feature = "rate-limit"))]
    async fn wait_for_permit(&self) {}

    async fn request_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            self.wait_for_permit().await;

            match self.send_request(texts.clone()).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    // Auth failures will not heal on retry
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
        let key = self.api_key()?;
        let body = BatchEmbedRequest {
            requests: texts
                .into_iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.settings.model),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint(&key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout("embedding request".into())
                } else {
                    SearchError::ProviderUnavailable(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
                    SearchError::ProviderUnavailable(format!("Invalid response: {e}"))
                })?;

                let embeddings: Vec<Vec<f32>> =
                    parsed.embeddings.into_iter().map(|e| e.values).collect();

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
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
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
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request_with_retry(texts).await
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = Instant::now();
        match self.send_request(vec!["health check".into()]).await {
            Ok(_) => Ok(ProviderStatus::healthy(EmbeddingProviderType::Gemini)
                .with_latency(start.elapsed().as_millis() as u64)),
            // A rate-limited endpoint is reachable
            Err(SearchError::RateLimited { .. }) => {
                Ok(ProviderStatus::healthy(EmbeddingProviderType::Gemini)
                    .with_latency(start.elapsed().as_millis() as u64))
            }
            Err(e) => Ok(ProviderStatus::unavailable(
                EmbeddingProviderType::Gemini,
                e.to_string(),
            )),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Gemini
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("timeout_secs", &self.settings.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(server: &MockServer) -> GeminiSettings {
        GeminiSettings {
            base_url: server.uri(),
            api_key_env: "MISHKAT_TEST_GEMINI_KEY".to_string(),
            model: "text-embedding-004".to_string(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    fn mock_response(dim: usize, count: usize) -> serde_json::Value {
        let embeddings: Vec<serde_json::Value> = (0..count)
            .map(|_| serde_json::json!({ "values": vec![0.1_f32; dim] }))
            .collect();
        serde_json::json!({ "embeddings": embeddings })
    }

    #[tokio::test]
    async fn test_embed_batch() {
        std::env::set_var("MISHKAT_TEST_GEMINI_KEY", "k");
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(768, 2)))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new(test_settings(&server)).unwrap();
        let embeddings = provider
            .embed(vec!["بسم الله".into(), "الصبر".into()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 768);
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        std::env::set_var("MISHKAT_TEST_GEMINI_KEY", "k");
        let server = MockServer::start().await;
        let provider = GeminiProvider::new(test_settings(&server)).unwrap();
        assert!(provider.embed(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_retry_after() {
        std::env::set_var("MISHKAT_TEST_GEMINI_KEY", "k");
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "30")
                    .set_body_string("quota exceeded"),
            )
            .mount(&server)
            .await;

        let mut settings = test_settings(&server);
        settings.max_retries = 0;
        let provider = GeminiProvider::new(settings).unwrap();
        match provider.embed(vec!["x".into()]).await {
            Err(SearchError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(30)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_id_is_qualified() {
        std::env::set_var("MISHKAT_TEST_GEMINI_KEY", "k");
        let server = MockServer::start().await;
        let provider = GeminiProvider::new(test_settings(&server)).unwrap();
        assert_eq!(provider.model_id(), "gemini/text-embedding-004");
    }
}
