//! Qdrant client wrapper
//!
//! Thin, read-only interface over the external vector store. Collections
//! are created and populated by the offline indexing pipeline; the request
//! path only issues `search_points` queries with a score threshold and
//! parses payloads at this boundary.

use std::collections::HashMap;

use qdrant_client::qdrant::{value::Kind, SearchPointsBuilder, Value};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};

use mishkat_core::Corpus;
use mishkat_config::VectorStoreSettings;

use crate::error::{Result, SearchError};
use crate::schema::{parse_payload, ScoredDoc};

/// Qdrant wrapper scoped to the three corpus collections.
pub struct VectorStore {
    client: Qdrant,
    settings: VectorStoreSettings,
}

impl VectorStore {
    /// Connect to the vector store and verify reachability.
    pub async fn connect(settings: VectorStoreSettings) -> Result<Self> {
        info!("Connecting to vector store at {}", settings.url);

        let mut builder = Qdrant::from_url(&settings.url);

        if let Some(ref key_env) = settings.api_key_env {
            if let Ok(api_key) = std::env::var(key_env) {
                builder = builder.api_key(api_key);
            }
        }

        let client = builder.build().map_err(|e| {
            SearchError::Connection(format!("Failed to build vector store client: {e}"))
        })?;

        // Reachability probe; collection existence is the indexer's concern.
        // An unreachable store degrades the semantic channel at query time
        // rather than refusing to start.
        match client.list_collections().await {
            Ok(_) => info!("Vector store connected"),
            Err(e) => warn!("Vector store unreachable at startup: {e}"),
        }

        Ok(Self { client, settings })
    }

    /// Collection name for a corpus.
    pub fn collection(&self, corpus: Corpus) -> &str {
        match corpus {
            Corpus::Quran => &self.settings.quran_collection,
            Corpus::Hadith => &self.settings.hadith_collection,
            Corpus::Book => &self.settings.book_collection,
        }
    }

    /// ANN search over one corpus with a similarity floor.
    ///
    /// Points whose payload does not parse for the corpus are dropped.
    pub async fn search(
        &self,
        corpus: Corpus,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: f32,
    ) -> Result<Vec<ScoredDoc>> {
        let collection = self.collection(corpus);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector, limit)
                    .score_threshold(score_threshold)
                    .with_payload(true),
            )
            .await?;

        let total = response.result.len();
        let docs: Vec<ScoredDoc> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let value = payload_to_json(&point.payload);
                let (doc_id, payload) = parse_payload(corpus, &value)?;
                Some(ScoredDoc {
                    doc_id,
                    score: point.score,
                    payload,
                })
            })
            .collect();

        if docs.len() < total {
            debug!(
                "{} of {} points dropped from '{}' for unparseable payloads",
                total - docs.len(),
                total,
                collection
            );
        }

        Ok(docs)
    }

    /// Reachability check used by the doctor command and readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .list_collections()
            .await
            .map_err(|e| SearchError::Connection(format!("vector store unreachable: {e}")))?;
        Ok(())
    }
}

/// Convert a qdrant payload map to a JSON object for the shared payload
/// parser.
fn payload_to_json(payload: &HashMap<String, Value>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = payload
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect();
    serde_json::Value::Object(map)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(*d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(obj)) => {
            let map: serde_json::Map<String, serde_json::Value> = obj
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}
