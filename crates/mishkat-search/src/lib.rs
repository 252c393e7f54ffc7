//! Mishkat Search - hybrid retrieval over the three corpora
//!
//! This crate owns every retrieval channel and the machinery between them:
//!
//! - **Keyword channel**: BM25 queries against the external text engine
//! - **Semantic channel**: cached query embeddings + ANN queries against
//!   the vector store, with length-adaptive similarity floors
//! - **Fusion**: weighted-linear (standard mode) and reciprocal rank
//!   fusion (refine mode), deduped by canonical ID
//! - **LLM stages**: query expansion and cross-corpus reranking, both
//!   best-effort and cache-backed where durable
//! - **Cache layer**: the four-tier cache with per-fingerprint
//!   single-flight
//!
//! Orchestration across channels lives in `mishkat-engine`; this crate
//! only knows how to run one channel or one fusion step at a time.

pub mod cache;
pub mod embeddings;
pub mod error;
pub mod expander;
pub mod fusion;
pub mod keyword;
pub mod llm;
pub mod rerank;
pub mod schema;
pub mod semantic;
pub mod vector;

// Re-exports for convenience
pub use cache::{CacheLayer, DiskCache, KeyedLocks, ShardedLru};
pub use embeddings::{create_provider, EmbeddingProvider, ProviderStatus};
pub use error::{Result, SearchError};
pub use expander::{Expansion, QueryExpander};
pub use fusion::{fuse_rrf, fuse_standard, keyword_norm, SubQueryList};
pub use keyword::{KeywordSearcher, BM25_B, BM25_K1};
pub use llm::ChatClient;
pub use rerank::Reranker;
pub use schema::{parse_payload, ScoredDoc};
pub use semantic::SemanticSearcher;
pub use vector::VectorStore;
