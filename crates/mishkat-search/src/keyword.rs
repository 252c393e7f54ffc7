//! BM25 keyword searcher
//!
//! Issues lexical queries against the external text engine's
//! Elasticsearch-compatible `_search` API, one index per corpus. The index
//! analyzers apply the same Arabic folding pipeline as
//! [`mishkat_core::normalize`] (diacritic filter, alef folder, teh folder,
//! stopword filter), so the engine is queried with the normalized form.
//!
//! A keyword failure never fails the overall request: the orchestrator maps
//! errors from here into an empty list plus a degraded-feature flag.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use mishkat_config::TextEngineSettings;
use mishkat_core::Corpus;

use crate::error::{Result, SearchError};
use crate::schema::{parse_payload, ScoredDoc};

/// BM25 term-frequency saturation. Part of the index contract: the engine's
/// similarity is configured with the same value at index-build time, and
/// changing it requires re-indexing.
pub const BM25_K1: f32 = 1.2;

/// BM25 length normalization. Same contract as [`BM25_K1`].
pub const BM25_B: f32 = 0.75;


#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<EngineHit>,
}

#[derive(Debug, Deserialize)]
struct EngineHit {
    #[serde(rename = "_score")]
    score: f32,
    #[serde(rename = "_source")]
    source: serde_json::Value,
}

/// HTTP client for the external BM25 text engine.
pub struct KeywordSearcher {
    client: Client,
    settings: TextEngineSettings,
}

impl KeywordSearcher {
    pub fn new(settings: TextEngineSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| SearchError::Connection(format!("HTTP client error: {e}")))?;

        Ok(Self { client, settings })
    }

    /// Index name for a corpus.
    pub fn index(&self, corpus: Corpus) -> &str {
        match corpus {
            Corpus::Quran => &self.settings.quran_index,
            Corpus::Hadith => &self.settings.hadith_index,
            Corpus::Book => &self.settings.book_index,
        }
    }

    /// Run a BM25 query over one corpus.
    ///
    /// `hadith_collections` narrows the hadith corpus to the given
    /// collection slugs; it is ignored for the other corpora. Results come
    /// back in descending raw-score order; ranks are the 1-based positions.
    pub async fn search(
        &self,
        corpus: Corpus,
        normalized_query: &str,
        limit: usize,
        hadith_collections: Option<&[String]>,
    ) -> Result<Vec<ScoredDoc>> {
        let index = self.index(corpus);
        let url = format!("{}/{}/_search", self.settings.url.trim_end_matches('/'), index);

        // Every corpus index exposes the shared normalized-text field
        let mut query = json!({
            "size": limit,
            "query": {
                "bool": {
                    "must": [
                        { "match": { "text_normalized": { "query": normalized_query } } }
                    ]
                }
            }
        });

        if corpus == Corpus::Hadith {
            if let Some(collections) = hadith_collections {
                query["query"]["bool"]["filter"] = json!([
                    { "terms": { "collection_slug": collections } }
                ]);
            }
        }

        let mut request = self.client.post(&url).json(&query);
        if let Some(ref key_env) = self.settings.api_key_env {
            if let Ok(api_key) = std::env::var(key_env) {
                request = request.header("Authorization", format!("ApiKey {api_key}"));
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(format!("text engine query on '{index}'"))
            } else {
                SearchError::Connection(format!("text engine request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchError::TextEngine(format!("index '{index}' not found")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::TextEngine(format!(
                "query on '{index}' failed with status {status}: {body}"
            )));
        }

        let body: SearchResponseBody = response
            .json()
            .await
            .map_err(|e| SearchError::TextEngine(format!("invalid response: {e}")))?;

        let total = body.hits.hits.len();
        let docs: Vec<ScoredDoc> = body
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| {
                let (doc_id, payload) = parse_payload(corpus, &hit.source)?;
                Some(ScoredDoc {
                    doc_id,
                    score: hit.score.max(0.0),
                    payload,
                })
            })
            .collect();

        if docs.len() < total {
            debug!(
                "{} of {} hits dropped from '{}' for unparseable sources",
                total - docs.len(),
                total,
                index
            );
        }

        Ok(docs)
    }

    /// Reachability check used by the doctor command and readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/_cluster/health", self.settings.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Connection(format!("text engine unreachable: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchError::TextEngine(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> TextEngineSettings {
        TextEngineSettings {
            url: server.uri(),
            ..Default::default()
        }
    }

    fn engine_response() -> serde_json::Value {
        json!({
            "took": 3,
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    {
                        "_id": "2:255",
                        "_score": 14.2,
                        "_source": {
                            "surah_number": 2,
                            "ayah_number": 255,
                            "text_uthmani": "اللَّهُ لَا إِلَٰهَ إِلَّا هُوَ"
                        }
                    },
                    {
                        "_id": "3:2",
                        "_score": 9.1,
                        "_source": {
                            "surah_number": 3,
                            "ayah_number": 2,
                            "text_uthmani": "اللَّهُ لَا إِلَٰهَ إِلَّا هُوَ الْحَيُّ الْقَيُّومُ"
                        }
                    }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_search_parses_ranked_hits() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/quran_verses/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(engine_response()))
            .mount(&server)
            .await;

        let searcher = KeywordSearcher::new(settings(&server)).unwrap();
        let docs = searcher
            .search(Corpus::Quran, "الله لا اله الا هو", 20, None)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].score > docs[1].score);
        assert_eq!(
            docs[0].doc_id,
            mishkat_core::DocId::Quran { surah: 2, ayah: 255 }
        );
    }

    #[tokio::test]
    async fn test_hadith_collection_filter_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hadith_narrations/_search"))
            .and(body_partial_json(json!({
                "query": { "bool": { "filter": [
                    { "terms": { "collection_slug": ["bukhari", "muslim"] } }
                ] } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [] }
            })))
            .mount(&server)
            .await;

        let searcher = KeywordSearcher::new(settings(&server)).unwrap();
        let collections = vec!["bukhari".to_string(), "muslim".to_string()];
        let docs = searcher
            .search(Corpus::Hadith, "الاعمال بالنيات", 20, Some(&collections))
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_is_an_error_not_a_panic() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/quran_verses/_search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let searcher = KeywordSearcher::new(settings(&server)).unwrap();
        let result = searcher.search(Corpus::Quran, "الصبر", 20, None).await;
        assert!(matches!(result, Err(SearchError::TextEngine(_))));
    }

    #[tokio::test]
    async fn test_unparseable_sources_are_dropped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/book_pages/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [
                    { "_score": 3.0, "_source": { "book_id": "ihya", "page_number": 5 } },
                    { "_score": 2.0, "_source": { "unexpected": true } }
                ] }
            })))
            .mount(&server)
            .await;

        let searcher = KeywordSearcher::new(settings(&server)).unwrap();
        let docs = searcher.search(Corpus::Book, "الاخلاص", 20, None).await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
