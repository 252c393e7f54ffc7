//! Semantic searcher
//!
//! Embeds the normalized query (through the embedding cache) and runs ANN
//! queries against the vector store with a length-adaptive similarity floor.
//! Quoted queries and queries under 4 non-space characters skip the channel
//! entirely: quotes signal exact-string intent, and near-empty queries
//! produce unreliable embeddings.

use std::sync::Arc;
use tracing::debug;

use mishkat_core::{Corpus, Query};

use crate::cache::CacheLayer;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::schema::ScoredDoc;
use crate::vector::VectorStore;

/// Semantic (dense-vector) retrieval channel.
pub struct SemanticSearcher {
    store: Arc<VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<CacheLayer>,
}

impl SemanticSearcher {
    pub fn new(
        store: Arc<VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
        }
    }

    /// Embed a normalized query through the embedding cache. Identical
    /// queries within the cache's lifetime return byte-identical vectors.
    pub async fn embed_query(&self, normalized_query: &str) -> Result<Vec<f32>> {
        let key = CacheLayer::embedding_key(normalized_query, self.provider.model_id());
        let provider = self.provider.clone();
        let text = normalized_query.to_string();

        self.cache
            .embedding_read_through(&key, || async move {
                let mut vectors = provider.embed(vec![text]).await?;
                vectors
                    .pop()
                    .ok_or_else(|| SearchError::Embedding("no embedding returned".into()))
            })
            .await
    }

    /// Run the semantic channel for one corpus.
    ///
    /// Returns an empty list (not an error) when the query's shape disables
    /// the channel; only infrastructure failures surface as errors.
    pub async fn search(
        &self,
        query: &Query,
        corpus: Corpus,
        limit: usize,
        baseline_floor: f32,
    ) -> Result<Vec<ScoredDoc>> {
        if query.skip_semantic() {
            debug!(
                "semantic channel skipped (quote={}, chars={})",
                query.has_quote(),
                query.char_count
            );
            return Ok(Vec::new());
        }

        let vector = self.embed_query(&query.normalized).await?;
        let floor = query.similarity_floor(baseline_floor);

        self.store
            .search(corpus, vector, limit as u64, floor)
            .await
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }
}
