//! Request orchestration
//!
//! The per-request state machine:
//!
//! ```text
//! INIT → NORMALIZE → DIRECT_MATCH_PROBE → [BRANCH]
//!   standard: FANOUT_PER_CORPUS → FUSE_PER_CORPUS → MERGE_AND_ORDER
//!             → GRAPH_ATTACH → ASSEMBLE
//!   refine:   EXPAND → FANOUT_PER_SUBQUERY_PER_CORPUS
//!             → CROSS_SUBQUERY_RRF_PER_CORPUS → DEDUPE
//!             → CROSS_CORPUS_RERANK → TRUNCATE → GRAPH_ATTACH → ASSEMBLE
//! ```
//!
//! Transitions are one-way. Optional collaborators (expander, reranker,
//! graph) degrade silently; only input errors and total backend loss reach
//! the caller. Fan-out uses a task-per-(corpus, subquery) model feeding a
//! bounded channel, assembled in index order regardless of completion
//! order, with a deadline that salvages partial results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mishkat_core::{
    direct, Corpus, DebugStats, DocId, ExpandedQuery, GraphContext, Hit, Query, RankedList,
    SearchResponse,
};
use mishkat_graph::GraphResolver;
use mishkat_search::{fuse_rrf, fuse_standard, KeywordSearcher, SemanticSearcher, SubQueryList};

use crate::error::{EngineError, Result};
use crate::request::{RerankerChoice, SearchRequest};
use crate::translate;
use crate::SearchEngine;

/// Per-request deadline with saturating remaining-time reads.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
}

impl Deadline {
    fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// One (corpus, subquery) search outcome.
struct ChannelSearch {
    corpus: Corpus,
    /// 0 is the original query; expansions follow in order
    query_index: usize,
    fused: RankedList,
    keyword_failed: bool,
    semantic_failed: bool,
}

/// Output of either pipeline branch before graph attachment.
struct PipelineOutput {
    per_corpus: Vec<(Corpus, Vec<Hit>)>,
    expanded: Option<Vec<ExpandedQuery>>,
    /// Enabled corpora whose channels both failed
    corpora_failed: usize,
    corpora_enabled: usize,
}

impl SearchEngine {
    /// Run one search request end to end.
    pub async fn search(&self, mut request: SearchRequest) -> Result<SearchResponse> {
        let total_start = Instant::now();
        request.validate()?;

        let budget = if request.refine {
            Duration::from_secs(self.config.search.deadline_refine_secs)
        } else {
            Duration::from_secs(self.config.search.deadline_standard_secs)
        };
        let deadline = Deadline::new(budget);

        let mut stats = DebugStats::default();

        // NORMALIZE
        let stage = Instant::now();
        let query = Arc::new(Query::parse(&request.q));
        stats.record_stage("normalize", stage.elapsed().as_millis() as u64);
        info!(
            "search: {:?} ({} words, refine={})",
            query.normalized, query.word_count, request.refine
        );

        // DIRECT_MATCH_PROBE
        let stage = Instant::now();
        let direct_hits = direct::lookup(&query.normalized);
        stats.direct_match = !direct_hits.is_empty();
        stats.record_stage("direct_match", stage.elapsed().as_millis() as u64);

        // BRANCH
        let output = if request.refine {
            self.refine_pipeline(&request, &query, &direct_hits, &mut stats, deadline)
                .await
        } else {
            self.standard_pipeline(&request, &query, &direct_hits, &mut stats, deadline)
                .await
        };

        // GRAPH_ATTACH
        let stage = Instant::now();
        let graph_context = self.attach_graph(&query.normalized, &mut stats, deadline).await;
        stats.record_stage("graph_attach", stage.elapsed().as_millis() as u64);

        let graph_failed = stats.degraded_features.iter().any(|f| f == "graph");
        if output.corpora_enabled > 0
            && output.corpora_failed == output.corpora_enabled
            && graph_failed
        {
            return Err(EngineError::AllBackendsFailed);
        }

        // ASSEMBLE
        let stage = Instant::now();
        let mut quran_hits = Vec::new();
        let mut hadith_hits = Vec::new();
        let mut book_hits = Vec::new();
        for (corpus, hits) in output.per_corpus {
            match corpus {
                Corpus::Quran => quran_hits = hits,
                Corpus::Hadith => hadith_hits = hits,
                Corpus::Book => book_hits = hits,
            }
        }

        let quran_edition = request
            .quran_translation
            .clone()
            .unwrap_or_else(|| self.config.translations.quran_edition.clone());
        let hadith_edition = request
            .hadith_translation
            .clone()
            .unwrap_or_else(|| self.config.translations.hadith_edition.clone());
        translate::attach_quran_translations(&mut quran_hits, &quran_edition, &self.store, &self.cache)
            .await;
        translate::attach_hadith_translations(
            &mut hadith_hits,
            &hadith_edition,
            &self.store,
            &self.cache,
        )
        .await;

        let authors = SearchResponse::collect_authors(&book_hits);

        if output.corpora_enabled == 0 {
            stats.degrade("no_corpora_enabled");
        }

        stats.record_stage("assemble", stage.elapsed().as_millis() as u64);
        stats.total_ms = total_start.elapsed().as_millis() as u64;
        stats.check_attribution();
        if stats.timing_attribution_suspect {
            warn!(
                "stage timings account for too little of {}ms total",
                stats.total_ms
            );
        }

        let degraded = stats.is_degraded();
        Ok(SearchResponse {
            quran_hits,
            hadith_hits,
            book_hits,
            authors,
            graph_context,
            debug_stats: stats,
            expanded_queries: output.expanded,
            degraded,
        })
    }

    // --- standard branch ----------------------------------------------

    async fn standard_pipeline(
        &self,
        request: &SearchRequest,
        query: &Arc<Query>,
        direct_hits: &[Hit],
        stats: &mut DebugStats,
        deadline: Deadline,
    ) -> PipelineOutput {
        let corpora = request.corpora();
        let collections = self.hadith_collections(request);

        // FANOUT_PER_CORPUS: the three corpora search concurrently; the
        // slowest completes before fusion results are merged
        let stage = Instant::now();
        let pool = std::cmp::max(50, request.limit * 4);
        let searches = self
            .fanout(
                std::iter::repeat(0).zip(corpora.iter().copied()),
                query.clone(),
                pool,
                request.similarity_cutoff,
                collections,
                stats,
                deadline,
            )
            .await;
        stats.record_stage("fanout", stage.elapsed().as_millis() as u64);

        // MERGE_AND_ORDER
        let stage = Instant::now();
        let corpora_failed = count_failed(&searches, stats);
        let mut per_corpus = Vec::with_capacity(corpora.len());
        for corpus in &corpora {
            let fused = searches
                .iter()
                .find(|s| s.corpus == *corpus)
                .map(|s| s.fused.hits().to_vec())
                .unwrap_or_default();
            stats
                .candidate_counts
                .insert(corpus.as_str().to_string(), fused.len());
            let merged = merge_with_direct(direct_hits, fused, *corpus, request.limit);
            per_corpus.push((*corpus, merged));
        }
        stats.record_stage("merge", stage.elapsed().as_millis() as u64);

        PipelineOutput {
            per_corpus,
            expanded: None,
            corpora_failed,
            corpora_enabled: corpora.len(),
        }
    }

    // --- refine branch ------------------------------------------------

    async fn refine_pipeline(
        &self,
        request: &SearchRequest,
        query: &Arc<Query>,
        direct_hits: &[Hit],
        stats: &mut DebugStats,
        deadline: Deadline,
    ) -> PipelineOutput {
        let corpora = request.corpora();
        let collections = self.hadith_collections(request);

        // EXPAND
        let stage = Instant::now();
        let expansions = self
            .expander
            .expand_with(&query.normalized, request.expansion_model.as_deref())
            .await;
        if expansions.is_empty() {
            stats.degrade("expansion");
        }
        stats.expansion_count = expansions.len();
        stats.record_stage("expand", stage.elapsed().as_millis() as u64);

        let expanded: Vec<ExpandedQuery> = expansions
            .iter()
            .map(|e| ExpandedQuery {
                sub_query: e.sub_query.clone(),
                weight: self.config.search.weight_expanded,
                source_rationale: e.source_rationale.clone(),
            })
            .collect();

        // Sub-queries: index 0 is the original
        let mut queries: Vec<Arc<Query>> = Vec::with_capacity(expansions.len() + 1);
        queries.push(query.clone());
        for expansion in &expansions {
            queries.push(Arc::new(Query::parse(&expansion.sub_query)));
        }

        // FANOUT_PER_SUBQUERY_PER_CORPUS
        let stage = Instant::now();
        let pool = std::cmp::max(50, request.limit * 2);
        let tuples: Vec<(usize, Corpus)> = (0..queries.len())
            .flat_map(|qi| corpora.iter().map(move |c| (qi, *c)))
            .collect();
        let searches = self
            .fanout_multi(
                tuples,
                &queries,
                pool,
                request.refine_similarity_cutoff,
                collections,
                stats,
                deadline,
            )
            .await;
        stats.record_stage("fanout", stage.elapsed().as_millis() as u64);

        // CROSS_SUBQUERY_RRF_PER_CORPUS + DEDUPE
        let stage = Instant::now();
        let corpora_failed = count_failed_original(&searches, &corpora, stats);
        let mut per_corpus_fused: Vec<(Corpus, RankedList)> = Vec::with_capacity(corpora.len());
        for corpus in &corpora {
            let mut lists: Vec<(usize, SubQueryList)> = searches
                .iter()
                .filter(|s| s.corpus == *corpus)
                .map(|s| {
                    (
                        s.query_index,
                        SubQueryList {
                            weight: if s.query_index == 0 {
                                self.config.search.weight_original
                            } else {
                                self.config.search.weight_expanded
                            },
                            is_original: s.query_index == 0,
                            hits: s.fused.hits().to_vec(),
                        },
                    )
                })
                .collect();
            // Assemble in the order the indices dictate, not arrival order
            lists.sort_by_key(|(qi, _)| *qi);
            let lists: Vec<SubQueryList> = lists.into_iter().map(|(_, l)| l).collect();
            let fused = fuse_rrf(&lists, self.config.search.rrf_k);
            stats
                .candidate_counts
                .insert(corpus.as_str().to_string(), fused.len());
            per_corpus_fused.push((*corpus, fused));
        }
        stats.record_stage("fuse", stage.elapsed().as_millis() as u64);

        // Rerank pool: per-corpus budgets, quran/hadith/book order
        let mut pool_hits: Vec<Hit> = Vec::new();
        for (corpus, fused) in &per_corpus_fused {
            let budget = match corpus {
                Corpus::Quran => self.config.search.per_query_quran,
                Corpus::Hadith => self.config.search.per_query_hadith,
                Corpus::Book => self.config.search.per_query_books,
            };
            pool_hits.extend(fused.hits().iter().take(budget).cloned());
        }
        pool_hits.truncate(request.pre_rerank_limit);

        // CROSS_CORPUS_RERANK
        let stage = Instant::now();
        let order = match self.resolve_reranker(request) {
            Some(model) if !deadline.expired() => {
                self.reranker.rerank_with(&request.q, &pool_hits, &model).await
            }
            Some(_) => {
                stats.timed_out.push("rerank".into());
                (0..pool_hits.len()).collect()
            }
            None => (0..pool_hits.len()).collect(),
        };
        let reranked: Vec<Hit> = order.into_iter().map(|i| pool_hits[i].clone()).collect();
        stats.record_stage("rerank", stage.elapsed().as_millis() as u64);

        // TRUNCATE: direct hits lead, duplicates suppressed by canonical ID
        let mut final_mixed: Vec<Hit> = Vec::with_capacity(request.post_rerank_limit);
        let direct_ids: Vec<&DocId> = direct_hits.iter().map(|h| &h.doc_id).collect();
        final_mixed.extend(direct_hits.iter().cloned());
        final_mixed.extend(
            reranked
                .into_iter()
                .filter(|h| !direct_ids.contains(&&h.doc_id)),
        );
        final_mixed.truncate(request.post_rerank_limit);

        let mut per_corpus = Vec::with_capacity(corpora.len());
        for corpus in &corpora {
            let mut hits: Vec<Hit> = final_mixed
                .iter()
                .filter(|h| h.corpus == *corpus)
                .cloned()
                .collect();
            for (i, hit) in hits.iter_mut().enumerate() {
                hit.rank = Some(i as u32 + 1);
            }
            per_corpus.push((*corpus, hits));
        }

        PipelineOutput {
            per_corpus,
            expanded: Some(expanded),
            corpora_failed,
            corpora_enabled: corpora.len(),
        }
    }

    // --- fan-out machinery --------------------------------------------

    /// Spawn one search task per (query_index, corpus) tuple for a single
    /// query, collecting on a bounded channel under the deadline.
    async fn fanout(
        &self,
        tuples: impl Iterator<Item = (usize, Corpus)>,
        query: Arc<Query>,
        pool: usize,
        baseline: f32,
        collections: Option<Arc<Vec<String>>>,
        stats: &mut DebugStats,
        deadline: Deadline,
    ) -> Vec<ChannelSearch> {
        let tuples: Vec<(usize, Corpus)> = tuples.collect();
        let queries = vec![query];
        self.fanout_multi(tuples, &queries, pool, baseline, collections, stats, deadline)
            .await
    }

    /// Spawn one search task per (query_index, corpus) tuple, capped by the
    /// engine-wide fan-out semaphore, collecting on a bounded channel.
    /// Results arrive in completion order and are re-assembled by index by
    /// the callers; on deadline the remaining tasks are aborted and the
    /// partial set is returned.
    #[allow(clippy::too_many_arguments)]
    async fn fanout_multi(
        &self,
        tuples: Vec<(usize, Corpus)>,
        queries: &[Arc<Query>],
        pool: usize,
        baseline: f32,
        collections: Option<Arc<Vec<String>>>,
        stats: &mut DebugStats,
        deadline: Deadline,
    ) -> Vec<ChannelSearch> {
        let expected = tuples.len();
        let (tx, mut rx) = mpsc::channel::<ChannelSearch>(expected.max(1));

        let mut handles = Vec::with_capacity(expected);
        for (query_index, corpus) in tuples {
            let Some(query) = queries.get(query_index).cloned() else {
                continue;
            };
            let keyword = self.keyword.clone();
            let semantic = self.semantic.clone();
            let permits = self.fanout_permits.clone();
            let collections = collections.clone();
            let norm_k = self.config.search.norm_k;
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let result = run_channel_search(
                    &keyword, &semantic, &query, query_index, corpus, pool, baseline,
                    collections.as_deref(), norm_k,
                )
                .await;
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match tokio::time::timeout(deadline.remaining(), rx.recv()).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "fan-out deadline hit with {}/{} searches complete",
                        results.len(),
                        expected
                    );
                    stats.timed_out.push("fanout".into());
                    for handle in &handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }
        results
    }

    // --- graph attachment ---------------------------------------------

    async fn attach_graph(
        &self,
        normalized_query: &str,
        stats: &mut DebugStats,
        deadline: Deadline,
    ) -> GraphContext {
        if deadline.expired() {
            stats.degrade("graph");
            stats.timed_out.push("graph_attach".into());
            return GraphContext::default();
        }

        let outcome = match tokio::time::timeout(
            deadline.remaining(),
            self.resolver.search_entities(normalized_query),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                stats.degrade("graph");
                stats.timed_out.push("graph_attach".into());
                return GraphContext::default();
            }
        };

        if outcome.degraded {
            stats.degrade("graph");
            return GraphContext::default();
        }

        let resolve_start = Instant::now();
        let resolved_sources = if outcome.all_source_refs.is_empty() || deadline.expired() {
            Default::default()
        } else {
            match tokio::time::timeout(
                deadline.remaining(),
                self.resolver.resolve_sources(&outcome.all_source_refs),
            )
            .await
            {
                Ok(map) => map,
                Err(_) => {
                    stats.timed_out.push("resolve_sources".into());
                    Default::default()
                }
            }
        };

        GraphContext {
            entities: GraphResolver::context_views(&outcome.graph),
            resolved_sources,
            timing_ms: outcome.timing_ms + resolve_start.elapsed().as_millis() as u64,
        }
    }

    // --- helpers ------------------------------------------------------

    fn hadith_collections(&self, request: &SearchRequest) -> Option<Arc<Vec<String>>> {
        request
            .hadith_collections
            .clone()
            .or_else(|| Some(self.config.hadith.enabled_collections.clone()))
            .filter(|c| !c.is_empty())
            .map(Arc::new)
    }

    fn resolve_reranker(&self, request: &SearchRequest) -> Option<String> {
        match &request.reranker {
            RerankerChoice::None => None,
            RerankerChoice::Default => Some(self.config.llm.reranker_model.clone()),
            RerankerChoice::Model(model) => Some(model.clone()),
        }
    }
}

/// Run both channels for one (query, corpus) pair and fuse them.
#[allow(clippy::too_many_arguments)]
async fn run_channel_search(
    keyword: &KeywordSearcher,
    semantic: &SemanticSearcher,
    query: &Query,
    query_index: usize,
    corpus: Corpus,
    pool: usize,
    baseline: f32,
    collections: Option<&Vec<String>>,
    norm_k: f32,
) -> ChannelSearch {
    let hadith_filter = (corpus == Corpus::Hadith)
        .then(|| collections.map(Vec::as_slice))
        .flatten();

    let (keyword_result, semantic_result) = tokio::join!(
        keyword.search(corpus, &query.normalized, pool, hadith_filter),
        semantic.search(query, corpus, pool, baseline),
    );

    let (keyword_docs, keyword_failed) = match keyword_result {
        Ok(docs) => (docs, false),
        Err(err) => {
            debug!("keyword channel failed for {corpus}: {err}");
            (Vec::new(), true)
        }
    };
    let (semantic_docs, semantic_failed) = match semantic_result {
        Ok(docs) => (docs, false),
        Err(err) => {
            debug!("semantic channel failed for {corpus}: {err}");
            (Vec::new(), true)
        }
    };

    let fused = fuse_standard(&keyword_docs, &semantic_docs, query.fusion_weights(), norm_k);

    ChannelSearch {
        corpus,
        query_index,
        fused,
        keyword_failed,
        semantic_failed,
    }
}

/// Direct hits lead in insertion order; statistical duplicates of a direct
/// hit are suppressed by canonical ID.
fn merge_with_direct(
    direct_hits: &[Hit],
    statistical: Vec<Hit>,
    corpus: Corpus,
    limit: usize,
) -> Vec<Hit> {
    let mut merged: Vec<Hit> = direct_hits
        .iter()
        .filter(|h| h.corpus == corpus)
        .cloned()
        .collect();
    let direct_ids: Vec<DocId> = merged.iter().map(|h| h.doc_id.clone()).collect();

    for hit in statistical {
        if merged.len() >= limit {
            break;
        }
        if direct_ids.contains(&hit.doc_id) {
            continue;
        }
        merged.push(hit);
    }
    merged.truncate(limit);

    for (i, hit) in merged.iter_mut().enumerate() {
        hit.rank = Some(i as u32 + 1);
    }
    merged
}

/// Degradation accounting for standard mode: a corpus counts as failed when
/// both channels failed.
fn count_failed(searches: &[ChannelSearch], stats: &mut DebugStats) -> usize {
    let mut failed = 0;
    for search in searches {
        if search.keyword_failed {
            stats.degrade("keyword");
        }
        if search.semantic_failed {
            stats.degrade("semantic");
        }
        if search.keyword_failed && search.semantic_failed {
            failed += 1;
        }
    }
    failed
}

/// Degradation accounting for refine mode, judged on the original query's
/// searches only (expansion searches are redundant evidence).
fn count_failed_original(
    searches: &[ChannelSearch],
    corpora: &[Corpus],
    stats: &mut DebugStats,
) -> usize {
    let mut failed = 0;
    for corpus in corpora {
        let Some(search) = searches
            .iter()
            .find(|s| s.corpus == *corpus && s.query_index == 0)
        else {
            // Lost to the deadline before completing
            continue;
        };
        if search.keyword_failed {
            stats.degrade("keyword");
        }
        if search.semantic_failed {
            stats.degrade("semantic");
        }
        if search.keyword_failed && search.semantic_failed {
            failed += 1;
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use mishkat_core::{HitPayload, QuranPayload, ScoreKind};

    fn quran_hit(surah: u16, ayah: u16, fused: f32) -> Hit {
        Hit {
            doc_id: DocId::Quran { surah, ayah },
            corpus: Corpus::Quran,
            keyword_score: None,
            semantic_score: None,
            keyword_rank: None,
            semantic_rank: None,
            fused_score: fused,
            rank: None,
            payload: HitPayload::Quran(QuranPayload {
                surah_number: surah,
                ayah_number: ayah,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_merge_direct_leads_and_suppresses_duplicates() {
        let direct = vec![Hit::direct(
            DocId::Quran { surah: 1, ayah: 1 },
            HitPayload::Quran(QuranPayload::default()),
        )];
        let statistical = vec![quran_hit(1, 1, 0.95), quran_hit(2, 255, 0.8)];

        let merged = merge_with_direct(&direct, statistical, Corpus::Quran, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].doc_id, DocId::Quran { surah: 1, ayah: 1 });
        assert_eq!(merged[0].fused_score, 1.0);
        assert_eq!(merged[1].doc_id, DocId::Quran { surah: 2, ayah: 255 });
        assert_eq!(merged[0].rank, Some(1));
        assert_eq!(merged[1].rank, Some(2));
    }

    #[test]
    fn test_merge_respects_limit() {
        let statistical = (1..=30).map(|a| quran_hit(2, a, 0.5)).collect();
        let merged = merge_with_direct(&[], statistical, Corpus::Quran, 5);
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn test_merge_filters_other_corpora_direct_hits() {
        let direct = vec![Hit::direct(
            DocId::Hadith {
                collection: "bukhari".into(),
                number: "1".into(),
            },
            HitPayload::Hadith(Default::default()),
        )];
        let merged = merge_with_direct(&direct, vec![quran_hit(1, 1, 0.5)], Corpus::Quran, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].corpus, Corpus::Quran);
    }

    #[test]
    fn test_count_failed_requires_both_channels_down() {
        let mut stats = DebugStats::default();
        let searches = vec![
            ChannelSearch {
                corpus: Corpus::Quran,
                query_index: 0,
                fused: RankedList::new(ScoreKind::FusedWeighted),
                keyword_failed: false,
                semantic_failed: true,
            },
            ChannelSearch {
                corpus: Corpus::Hadith,
                query_index: 0,
                fused: RankedList::new(ScoreKind::FusedWeighted),
                keyword_failed: true,
                semantic_failed: true,
            },
        ];
        assert_eq!(count_failed(&searches, &mut stats), 1);
        assert!(stats.degraded_features.contains(&"semantic".to_string()));
        assert!(stats.degraded_features.contains(&"keyword".to_string()));
    }

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::new(Duration::from_millis(0));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);

        let live = Deadline::new(Duration::from_secs(10));
        assert!(!live.expired());
    }
}
