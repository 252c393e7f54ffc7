//! Query expander
//!
//! Generates 3-5 paraphrased sub-queries for refine mode via the LLM,
//! cached durably by `hash(normalized_query, model_id, prompt_version)` so
//! cache hits return byte-identical expansions.
//!
//! Expansion is best-effort and never throws: any timeout or parse failure
//! yields an empty list, and the orchestrator proceeds as if expansion were
//! disabled, flagging the degradation in debug stats.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheLayer;
use crate::error::{Result, SearchError};
use crate::llm::ChatClient;

/// Bounds on the usable expansion count; outside them the output is
/// treated as a parse failure.
const MIN_EXPANSIONS: usize = 3;
const MAX_EXPANSIONS: usize = 5;

const EXPANSION_SYSTEM_PROMPT: &str = "\
You rewrite Arabic-Islamic search queries. Given one query, produce exactly 5 \
alternative formulations that would retrieve the same material: natural-language \
paraphrases, classical Arabic phrasings, and keyword variants. Keep each \
alternative in the query's own language. Respond with ONLY a JSON array of \
objects, each {\"query\": \"...\", \"rationale\": \"...\"}, no other text.";

/// One parsed expansion. The orchestrator assigns weights; the expander
/// only reports the sub-query and the model's rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    #[serde(rename = "query")]
    pub sub_query: String,
    #[serde(rename = "rationale", default)]
    pub source_rationale: String,
}

/// LLM-backed query expander with a durable cache.
pub struct QueryExpander {
    chat: Arc<ChatClient>,
    cache: Arc<CacheLayer>,
    prompt_version: String,
}

impl QueryExpander {
    pub fn new(chat: Arc<ChatClient>, cache: Arc<CacheLayer>, prompt_version: String) -> Self {
        Self {
            chat,
            cache,
            prompt_version,
        }
    }

    /// Expand a normalized query with the configured default model.
    pub async fn expand(&self, normalized_query: &str) -> Vec<Expansion> {
        self.expand_with(normalized_query, None).await
    }

    /// Expand with an optional per-request model override. Returns an
    /// empty list on any failure.
    pub async fn expand_with(
        &self,
        normalized_query: &str,
        model_override: Option<&str>,
    ) -> Vec<Expansion> {
        let model = model_override
            .unwrap_or_else(|| self.chat.expansion_model())
            .to_string();
        let key = CacheLayer::expansion_key(normalized_query, &model, &self.prompt_version);

        let chat = self.chat.clone();
        let query = normalized_query.to_string();
        let result = self
            .cache
            .expansion_read_through(&key, || async move {
                let raw = chat
                    .complete(
                        &model,
                        EXPANSION_SYSTEM_PROMPT,
                        &query,
                        chat.expansion_timeout(),
                    )
                    .await?;
                let expansions = parse_expansions(&raw)?;
                // Cache the canonical serialization, not the model's raw
                // text, so hits replay deterministically
                serde_json::to_string(&expansions).map_err(SearchError::from)
            })
            .await;

        match result {
            Ok(raw) => match serde_json::from_str::<Vec<Expansion>>(&raw) {
                Ok(expansions) => {
                    debug!("{} expansions for query", expansions.len());
                    expansions
                }
                Err(err) => {
                    warn!("cached expansion failed to parse, treating as miss: {err}");
                    Vec::new()
                }
            },
            Err(err) => {
                debug!("expansion degraded: {err}");
                Vec::new()
            }
        }
    }
}

/// Parse the model's output into 3-5 expansions.
///
/// Tolerates code fences and prose around the array; anything that does not
/// contain a valid JSON array of the right shape is a parse failure.
fn parse_expansions(raw: &str) -> Result<Vec<Expansion>> {
    let start = raw
        .find('[')
        .ok_or_else(|| SearchError::LlmParse("no JSON array in expansion output".into()))?;
    let end = raw
        .rfind(']')
        .ok_or_else(|| SearchError::LlmParse("unterminated JSON array".into()))?;
    if end < start {
        return Err(SearchError::LlmParse("malformed JSON array".into()));
    }

    let mut expansions: Vec<Expansion> = serde_json::from_str(&raw[start..=end])
        .map_err(|e| SearchError::LlmParse(format!("expansion JSON: {e}")))?;

    expansions.retain(|e| !e.sub_query.trim().is_empty());
    expansions.truncate(MAX_EXPANSIONS);

    if expansions.len() < MIN_EXPANSIONS {
        return Err(SearchError::LlmParse(format!(
            "only {} usable expansions",
            expansions.len()
        )));
    }
    Ok(expansions)
}
