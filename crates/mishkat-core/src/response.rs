//! Response assembly types
//!
//! The wire shape of one search response: per-corpus ranked hits, book
//! author metadata, the attached graph context, debug statistics, and (in
//! refine mode) the expanded sub-queries. Assembled exactly once per
//! request by the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hit::Hit;
use crate::kgraph::{EntityKind, MentionRole};

/// A paraphrased sub-query produced by the expander. The weight is assigned
/// by the orchestrator, not the expander.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedQuery {
    pub sub_query: String,
    pub weight: f32,
    pub source_rationale: String,
}

/// Serializable view of one graph entity with its 1-hop neighborhood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub id: String,
    pub kind: EntityKind,
    pub name_ar: String,
    pub name_en: String,
    pub description_ar: String,
    pub description_en: String,
    /// Canonical source keys (`{kind}:{ref}`) cited by this entity
    pub source_keys: Vec<String>,
    pub relationships: Vec<RelationshipView>,
    pub mentions: Vec<MentionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipView {
    pub rel_type: String,
    pub target_id: String,
    pub target_name_ar: String,
    pub target_name_en: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionView {
    pub role: MentionRole,
    pub context: String,
    /// Quran reference in `S:A` or `S:A-B` form
    pub ayahs: String,
}

/// A source reference resolved against the relational store for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub label_ar: String,
    pub label_en: String,
    /// Display text, truncated on a character boundary
    pub text: String,
}

/// Graph augmentation attached to a response. Empty when the graph store is
/// unavailable; the response still succeeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphContext {
    pub entities: Vec<EntityView>,
    /// Resolved sources keyed by `{kind}:{ref}`
    pub resolved_sources: BTreeMap<String, ResolvedSource>,
    pub timing_ms: u64,
}

/// Book metadata for the distinct books appearing in `book_hits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub book_id: String,
    pub book_title_ar: String,
    pub book_title_en: String,
}

/// Per-request diagnostics. Timing fields are written only by their owning
/// stage, so contents are order-independent given the inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugStats {
    /// Wall-clock per pipeline stage, in insertion-stable key order
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub total_ms: u64,
    pub direct_match: bool,
    /// Optional collaborators that failed and were silently degraded
    pub degraded_features: Vec<String>,
    /// Stages cancelled by the request deadline
    pub timed_out: Vec<String>,
    /// Per-corpus raw candidate counts before truncation
    pub candidate_counts: BTreeMap<String, usize>,
    pub expansion_count: usize,
    /// Set when stage timings fail to account for total wall time
    pub timing_attribution_suspect: bool,
}

impl DebugStats {
    pub fn record_stage(&mut self, stage: &str, elapsed_ms: u64) {
        self.stage_timings_ms.insert(stage.to_string(), elapsed_ms);
    }

    pub fn degrade(&mut self, feature: &str) {
        if !self.degraded_features.iter().any(|f| f == feature) {
            self.degraded_features.push(feature.to_string());
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_features.is_empty() || !self.timed_out.is_empty()
    }

    /// Verify stage timings sum to within 5% of total wall time. Joins
    /// overlap stages, so only a large shortfall indicates an attribution
    /// bug.
    pub fn check_attribution(&mut self) {
        if self.total_ms == 0 {
            return;
        }
        let accounted: u64 = self.stage_timings_ms.values().sum();
        if accounted < self.total_ms - self.total_ms / 20 {
            self.timing_attribution_suspect = true;
        }
    }
}

/// The complete response for one search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub quran_hits: Vec<Hit>,
    pub hadith_hits: Vec<Hit>,
    pub book_hits: Vec<Hit>,
    pub authors: Vec<AuthorRef>,
    pub graph_context: GraphContext,
    pub debug_stats: DebugStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_queries: Option<Vec<ExpandedQuery>>,
    pub degraded: bool,
}

impl SearchResponse {
    /// Collect distinct book metadata from the book hits, insertion order.
    pub fn collect_authors(book_hits: &[Hit]) -> Vec<AuthorRef> {
        let mut seen = std::collections::HashSet::new();
        let mut authors = Vec::new();
        for hit in book_hits {
            if let crate::hit::HitPayload::Book(payload) = &hit.payload {
                if seen.insert(payload.book_id.clone()) {
                    authors.push(AuthorRef {
                        book_id: payload.book_id.clone(),
                        book_title_ar: payload.book_title_ar.clone(),
                        book_title_en: payload.book_title_en.clone(),
                    });
                }
            }
        }
        authors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{BookPayload, HitPayload};
    use crate::ids::{Corpus, DocId};

    fn book_hit(book_id: &str, page: u32) -> Hit {
        Hit {
            doc_id: DocId::Book {
                book_id: book_id.into(),
                page,
            },
            corpus: Corpus::Book,
            keyword_score: None,
            semantic_score: None,
            keyword_rank: None,
            semantic_rank: None,
            fused_score: 0.5,
            rank: None,
            payload: HitPayload::Book(BookPayload {
                book_id: book_id.into(),
                page_number: page,
                book_title_ar: format!("كتاب {book_id}"),
                book_title_en: format!("Book {book_id}"),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_collect_authors_dedupes_by_book() {
        let hits = vec![book_hit("ihya", 1), book_hit("ihya", 2), book_hit("riyad", 3)];
        let authors = SearchResponse::collect_authors(&hits);
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].book_id, "ihya");
        assert_eq!(authors[1].book_id, "riyad");
    }

    #[test]
    fn test_degrade_dedupes() {
        let mut stats = DebugStats::default();
        stats.degrade("semantic");
        stats.degrade("semantic");
        assert_eq!(stats.degraded_features, vec!["semantic".to_string()]);
        assert!(stats.is_degraded());
    }

    #[test]
    fn test_attribution_check() {
        let mut stats = DebugStats::default();
        stats.total_ms = 100;
        stats.record_stage("fanout", 50);
        stats.record_stage("fuse", 10);
        stats.check_attribution();
        assert!(stats.timing_attribution_suspect);

        let mut ok = DebugStats::default();
        ok.total_ms = 100;
        ok.record_stage("fanout", 90);
        ok.record_stage("fuse", 8);
        ok.check_attribution();
        assert!(!ok.timing_attribution_suspect);
    }
}
