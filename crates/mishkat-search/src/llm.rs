//! LLM chat-completion client
//!
//! Shared by the query expander and the reranker. Talks to an
//! OpenAI-compatible `/chat/completions` endpoint with a configurable
//! (typically zero) temperature so identical inputs produce identical
//! outputs on deterministic models.
//!
//! A single semaphore caps in-flight requests across both callers; the
//! expander and reranker together never hold more than
//! `llm.max_concurrency` permits.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use mishkat_config::LlmSettings;

use crate::error::{Result, SearchError};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat-completion client with a shared concurrency cap.
pub struct ChatClient {
    client: Client,
    settings: LlmSettings,
    permits: Arc<Semaphore>,
}

impl ChatClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = Client::builder()
            // Per-call timeouts are applied by callers; this is a ceiling
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SearchError::Llm(format!("HTTP client error: {e}")))?;

        let permits = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));

        Ok(Self {
            client,
            settings,
            permits,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn api_key(&self) -> Option<String> {
        self.settings
            .api_key_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())
    }

    /// One completion round-trip under the shared permit and the caller's
    /// deadline.
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        deadline: Duration,
    ) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SearchError::Llm("LLM client shut down".into()))?;

        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: self.settings.temperature,
        };

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = self.api_key() {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let send = async {
            let response = request
                .send()
                .await
                .map_err(|e| SearchError::Llm(format!("request failed: {e}")))?;

            let status = response.status();
            match status {
                StatusCode::OK => {
                    let parsed: ChatResponse = response
                        .json()
                        .await
                        .map_err(|e| SearchError::Llm(format!("invalid response: {e}")))?;
                    parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| SearchError::Llm("empty choices".into()))
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
                    let text = response.text().await.unwrap_or_default();
                    Err(SearchError::Llm(format!(
                        "completion failed with status {status}: {text}"
                    )))
                }
            }
        };

        tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| SearchError::Timeout(format!("LLM call to {model}")))?
    }

    /// Reachability check for the doctor command.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!(
            "{}/models",
            self.settings.base_url.trim_end_matches('/')
        );
        let mut request = self.client.get(&url);
        if let Some(key) = self.api_key() {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Connection(format!("LLM endpoint unreachable: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchError::Llm(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    pub fn expansion_model(&self) -> &str {
        &self.settings.expansion_model
    }

    pub fn reranker_model(&self) -> &str {
        &self.settings.reranker_model
    }

    pub fn expansion_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.expansion_timeout_secs)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.rerank_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> LlmSettings {
        LlmSettings {
            base_url: server.uri(),
            api_key_env: None,
            ..Default::default()
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": content } } ]
        })
    }

    #[tokio::test]
    async fn test_complete_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-oss-120b",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hello")))
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(&server)).unwrap();
        let out = client
            .complete("gpt-oss-120b", "system", "user", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("slow"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(&server)).unwrap();
        let result = client
            .complete("m", "s", "u", Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(SearchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(&server)).unwrap();
        let result = client.complete("m", "s", "u", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SearchError::Llm(_))));
    }
}
