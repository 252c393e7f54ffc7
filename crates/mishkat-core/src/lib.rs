//! Mishkat Core - domain model for the Arabic-Islamic hybrid search engine
//!
//! This crate holds everything the retrieval pipeline agrees on before any
//! I/O happens:
//!
//! - **Normalization**: the canonical Arabic folding pipeline shared by
//!   indexing, querying, and cache keys
//! - **Canonical IDs**: corpus-namespaced document identifiers and the
//!   dedupe/tie-break rules built on them
//! - **Source grammars**: the bit-exact `{kind, ref}` reference formats
//!   carried by knowledge-graph entities
//! - **Direct-match dictionary**: the init-once famous-verses table
//! - **Knowledge-graph arena**: index-based entity graph, safe for cycles
//! - **Runtime entities**: Query, Hit, RankedList, SearchResponse
//!
//! No I/O, no async: every function here is pure and deterministic, which is
//! what makes the ranking properties of the pipeline testable in isolation.

pub mod corpus;
pub mod direct;
pub mod error;
pub mod hit;
pub mod ids;
pub mod kgraph;
pub mod normalize;
pub mod query;
pub mod response;
pub mod sourceref;

// Re-exports for convenience
pub use error::{CoreError, Result};
pub use hit::{BookPayload, HadithPayload, Hit, HitPayload, QuranPayload, RankedList, ScoreKind};
pub use ids::{Corpus, DocId};
pub use kgraph::{Entity, EntityKind, KnowledgeGraph, Mention, MentionRole, Relationship};
pub use normalize::{normalize, to_arabic_digits, QueryShape, QUOTE_CHARS};
pub use query::{FusionWeights, Lang, Query};
pub use response::{
    AuthorRef, DebugStats, EntityView, ExpandedQuery, GraphContext, MentionView, RelationshipView,
    ResolvedSource, SearchResponse,
};
pub use sourceref::{truncate_chars, ParsedSource, QuranRange, SourceKind, SourceRef};
