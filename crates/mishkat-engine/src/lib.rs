//! Mishkat Engine - the request orchestrator
//!
//! Wires every collaborator together and runs the per-request state
//! machine: normalize → direct-match probe → (standard | refine) branch →
//! graph attachment → response assembly. See `orchestrator` for the
//! pipeline itself.
//!
//! The engine is cheap to share: construct once at startup, wrap in an
//! `Arc`, and call [`SearchEngine::search`] concurrently.

pub mod error;
mod orchestrator;
pub mod request;
pub mod translate;

pub use error::{EngineError, Result};
pub use request::{RerankerChoice, SearchRequest};

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use mishkat_config::MishkatConfig;
use mishkat_graph::{GraphClient, GraphResolver, RelationalStore};
use mishkat_search::{
    create_provider, CacheLayer, ChatClient, KeywordSearcher, QueryExpander, Reranker,
    SemanticSearcher, VectorStore,
};

/// One health probe result for the doctor command.
pub struct ProbeResult {
    pub name: &'static str,
    pub ok: bool,
    pub detail: Option<String>,
}

/// The assembled retrieval engine.
pub struct SearchEngine {
    pub(crate) config: MishkatConfig,
    pub(crate) keyword: Arc<KeywordSearcher>,
    pub(crate) semantic: Arc<SemanticSearcher>,
    pub(crate) vector: Arc<VectorStore>,
    pub(crate) expander: Arc<QueryExpander>,
    pub(crate) reranker: Arc<Reranker>,
    pub(crate) resolver: Arc<GraphResolver>,
    pub(crate) store: Arc<RelationalStore>,
    pub(crate) cache: Arc<CacheLayer>,
    pub(crate) chat: Arc<ChatClient>,
    /// Engine-wide cap on in-flight (corpus, subquery) searches
    pub(crate) fanout_permits: Arc<Semaphore>,
}

impl SearchEngine {
    /// Build every collaborator from configuration.
    ///
    /// Optional collaborators (vector store, graph, LLM endpoint) being
    /// unreachable does not fail construction; those channels degrade at
    /// query time. The relational store and cache directory are required.
    pub async fn connect(config: MishkatConfig) -> Result<Self> {
        config.validate()?;
        info!("Assembling search engine");

        let cache = Arc::new(CacheLayer::new(&config.cache)?);
        let vector = Arc::new(VectorStore::connect(config.vector.clone()).await?);
        let provider = create_provider(&config.embedding)?;
        let semantic = Arc::new(SemanticSearcher::new(
            vector.clone(),
            provider,
            cache.clone(),
        ));
        let keyword = Arc::new(KeywordSearcher::new(config.text_engine.clone())?);
        let chat = Arc::new(ChatClient::new(config.llm.clone())?);
        let expander = Arc::new(QueryExpander::new(
            chat.clone(),
            cache.clone(),
            config.cache.prompt_version.clone(),
        ));
        let reranker = Arc::new(Reranker::new(chat.clone()));
        let store = Arc::new(RelationalStore::connect(&config.relational).await?);
        let graph_client = Arc::new(GraphClient::new(config.graph.clone())?);
        let resolver = Arc::new(GraphResolver::new(graph_client, store.clone()));
        let fanout_permits = Arc::new(Semaphore::new(config.search.fanout_concurrency.max(1)));

        Ok(Self {
            config,
            keyword,
            semantic,
            vector,
            expander,
            reranker,
            resolver,
            store,
            cache,
            chat,
            fanout_permits,
        })
    }

    pub fn config(&self) -> &MishkatConfig {
        &self.config
    }

    /// A request pre-filled with this engine's configured defaults.
    pub fn default_request(&self, q: impl Into<String>) -> SearchRequest {
        SearchRequest::new(q, &self.config.search)
    }

    /// Probe every external collaborator. Used by the CLI doctor command
    /// and the server readiness endpoint.
    pub async fn doctor(&self) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(5);

        results.push(probe("vector-store", self.vector.health_check().await));
        results.push(probe("text-engine", self.keyword.health_check().await));
        results.push(probe("relational-store", self.store.health_check().await));
        results.push(probe("llm-endpoint", self.chat.health_check().await));
        let provider_status = self.semantic.provider().check_status().await;
        results.push(match provider_status {
            Ok(status) if status.available => ProbeResult {
                name: "embedding-provider",
                ok: true,
                detail: status.latency_ms.map(|ms| format!("{ms}ms")),
            },
            Ok(status) => ProbeResult {
                name: "embedding-provider",
                ok: false,
                detail: status.error,
            },
            Err(err) => ProbeResult {
                name: "embedding-provider",
                ok: false,
                detail: Some(err.to_string()),
            },
        });

        results
    }
}

fn probe<E: ToString>(name: &'static str, result: std::result::Result<(), E>) -> ProbeResult {
    match result {
        Ok(()) => ProbeResult {
            name,
            ok: true,
            detail: None,
        },
        Err(err) => ProbeResult {
            name,
            ok: false,
            detail: Some(err.to_string()),
        },
    }
}
