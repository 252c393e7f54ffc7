//! Fusion engine
//!
//! Combines the keyword and semantic channels into one ranked list per
//! corpus, in one of two score spaces:
//!
//! - **Standard mode**: weighted linear combination of a saturating BM25
//!   normalization (`s / (s + normK)`) and raw cosine similarity, with a
//!   confirmation boost when both channels agree on a document.
//! - **Refine mode**: reciprocal rank fusion across the original query and
//!   all expanded sub-queries, `Σ weight_q / (K + rank_q)`.
//!
//! Both paths key documents by canonical ID, so a document can appear at
//! most once in the output regardless of how many channels or sub-queries
//! surfaced it.

use std::collections::HashMap;

use mishkat_core::{DocId, FusionWeights, Hit, HitPayload, RankedList, ScoreKind};

use crate::schema::ScoredDoc;

/// Confirmation boost applied when a document appears in both channels.
const AGREEMENT_BOOST: f32 = 1.10;

/// Map a raw BM25 score into `[0, 1)` monotonically.
pub fn keyword_norm(raw_bm25: f32, norm_k: f32) -> f32 {
    let s = raw_bm25.max(0.0);
    s / (s + norm_k)
}

/// Standard-mode weighted-linear fusion for one corpus.
///
/// Channel inputs are in descending score order; ranks are their 1-based
/// positions. A document present in only one channel keeps that channel's
/// normalized score (the absent side contributes zero weight and zero
/// score, preserving ordering monotonicity within the side).
pub fn fuse_standard(
    keyword: &[ScoredDoc],
    semantic: &[ScoredDoc],
    weights: FusionWeights,
    norm_k: f32,
) -> RankedList {
    struct Partial {
        payload: HitPayload,
        keyword: Option<(f32, u32)>,
        semantic: Option<(f32, u32)>,
    }

    let mut by_doc: HashMap<DocId, Partial> = HashMap::new();

    for (i, doc) in keyword.iter().enumerate() {
        by_doc
            .entry(doc.doc_id.clone())
            .or_insert_with(|| Partial {
                payload: doc.payload.clone(),
                keyword: None,
                semantic: None,
            })
            .keyword = Some((doc.score, i as u32 + 1));
    }

    for (i, doc) in semantic.iter().enumerate() {
        by_doc
            .entry(doc.doc_id.clone())
            .or_insert_with(|| Partial {
                payload: doc.payload.clone(),
                keyword: None,
                semantic: None,
            })
            .semantic = Some((doc.score, i as u32 + 1));
    }

    let mut list = RankedList::with_capacity(ScoreKind::FusedWeighted, by_doc.len());
    for (doc_id, partial) in by_doc {
        let kw_norm = partial
            .keyword
            .map(|(score, _)| keyword_norm(score, norm_k))
            .unwrap_or(0.0);
        // Cosine is already in [0, 1]; the threshold filtered negatives
        let sem_norm = partial.semantic.map(|(score, _)| score.max(0.0)).unwrap_or(0.0);

        let mut fused = weights.semantic * sem_norm + weights.keyword * kw_norm;
        if partial.keyword.is_some() && partial.semantic.is_some() {
            fused = (fused * AGREEMENT_BOOST).min(1.0);
        }

        let corpus = doc_id.corpus();
        list.insert(Hit {
            doc_id,
            corpus,
            keyword_score: partial.keyword.map(|(s, _)| s),
            semantic_score: partial.semantic.map(|(s, _)| s),
            keyword_rank: partial.keyword.map(|(_, r)| r),
            semantic_rank: partial.semantic.map(|(_, r)| r),
            fused_score: fused,
            rank: None,
            payload: partial.payload,
        });
    }

    list.finish(usize::MAX);
    list
}

/// One sub-query's fused list entering reciprocal rank fusion.
pub struct SubQueryList {
    /// RRF weight of this sub-query
    pub weight: f32,
    /// Whether this is the original user query (wins tie-breaks)
    pub is_original: bool,
    pub hits: Vec<Hit>,
}

/// Refine-mode reciprocal rank fusion across sub-queries for one corpus.
///
/// `rrf(doc) = Σ_q weight_q / (rrf_k + rank_q(doc))` with 1-based ranks;
/// sub-queries that did not surface a document contribute zero. Ties are
/// broken by original-query rank, then by canonical-ID order.
pub fn fuse_rrf(lists: &[SubQueryList], rrf_k: f32) -> RankedList {
    struct Accum {
        hit: Hit,
        rrf: f32,
        original_rank: Option<u32>,
        from_original: bool,
    }

    let mut by_doc: HashMap<DocId, Accum> = HashMap::new();

    for list in lists {
        for (i, hit) in list.hits.iter().enumerate() {
            let rank = i as u32 + 1;
            let contribution = list.weight / (rrf_k + rank as f32);

            match by_doc.get_mut(&hit.doc_id) {
                Some(accum) => {
                    accum.rrf += contribution;
                    if list.is_original {
                        accum.original_rank = Some(rank);
                        // Channel evidence from the original query is the
                        // most representative; swap the carried hit
                        if !accum.from_original {
                            accum.hit = hit.clone();
                            accum.from_original = true;
                        }
                    }
                }
                None => {
                    by_doc.insert(
                        hit.doc_id.clone(),
                        Accum {
                            hit: hit.clone(),
                            rrf: contribution,
                            original_rank: list.is_original.then_some(rank),
                            from_original: list.is_original,
                        },
                    );
                }
            }
        }
    }

    let mut scored: Vec<Accum> = by_doc.into_values().collect();
    scored.sort_by(|a, b| {
        b.rrf
            .partial_cmp(&a.rrf)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| cmp_original_rank(a.original_rank, b.original_rank))
            .then_with(|| a.hit.doc_id.cmp(&b.hit.doc_id))
    });

    let mut list = RankedList::with_capacity(ScoreKind::Rrf, scored.len());
    for accum in scored {
        let mut hit = accum.hit;
        hit.fused_score = accum.rrf;
        list.insert(hit);
    }
    list
}

fn cmp_original_rank(a: Option<u32>, b: Option<u32>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
