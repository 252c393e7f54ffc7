//! Ranked hits and score spaces
//!
//! A [`Hit`] is one document in one corpus with its per-channel scores and
//! the fused score that orders it. A [`RankedList`] is an ordered sequence of
//! hits that carries its [`ScoreKind`] so downstream stages never mix score
//! spaces; it also enforces the at-most-once-per-ID invariant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{Corpus, DocId};

/// Which score space a ranked list's `fused_score` values live in.
///
/// Scores are comparable only within a single list of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Raw BM25 scores straight from the text engine
    RawBm25,
    /// BM25 mapped into [0, 1) via `s / (s + normK)`
    NormalizedKeyword,
    /// Cosine similarity from the vector store
    Cosine,
    /// Standard-mode weighted linear combination
    FusedWeighted,
    /// Refine-mode reciprocal rank fusion
    Rrf,
    /// Direct-match dictionary sentinel (always 1.0)
    Direct,
}

/// Display payload for a hit, tagged per corpus.
///
/// Parsed once at the store boundary; untyped values never flow past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "corpus", rename_all = "lowercase")]
pub enum HitPayload {
    Quran(QuranPayload),
    Hadith(HadithPayload),
    Book(BookPayload),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuranPayload {
    pub surah_number: u16,
    pub ayah_number: u16,
    pub text_uthmani: String,
    pub surah_name_ar: String,
    pub surah_name_en: String,
    pub juz: u8,
    pub page: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HadithPayload {
    pub collection_slug: String,
    pub hadith_number: String,
    pub text_ar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BookPayload {
    pub book_id: String,
    pub page_number: u32,
    pub content_plain: String,
    pub book_title_ar: String,
    pub book_title_en: String,
}

impl HitPayload {
    pub fn corpus(&self) -> Corpus {
        match self {
            HitPayload::Quran(_) => Corpus::Quran,
            HitPayload::Hadith(_) => Corpus::Hadith,
            HitPayload::Book(_) => Corpus::Book,
        }
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub corpus: Corpus,
    /// Raw BM25 score, present when the keyword channel found this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    /// Cosine similarity, present when the semantic channel found this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    /// 1-based rank in the keyword channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_rank: Option<u32>,
    /// 1-based rank in the semantic channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<u32>,
    pub fused_score: f32,
    /// Final 1-based rank, assigned by the orchestrator after all reordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub payload: HitPayload,
}

impl Hit {
    /// A direct-match dictionary hit: sentinel score 1.0, no channel ranks.
    pub fn direct(doc_id: DocId, payload: HitPayload) -> Self {
        let corpus = doc_id.corpus();
        Self {
            doc_id,
            corpus,
            keyword_score: None,
            semantic_score: None,
            keyword_rank: None,
            semantic_rank: None,
            fused_score: 1.0,
            rank: None,
            payload,
        }
    }
}

/// An ordered sequence of hits, descending by `fused_score`, carrying its
/// score space.
///
/// Invariants enforced here:
/// - a canonical ID appears at most once; on duplicate insert the hit with
///   the stronger `fused_score` wins, exact ties going to the lower
///   `semantic_rank`
/// - ordering is strictly by `fused_score` descending, ties broken by lower
///   semantic rank, then by canonical-ID order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedList {
    pub score_kind: ScoreKind,
    hits: Vec<Hit>,
    #[serde(skip)]
    index: HashMap<DocId, usize>,
}

impl RankedList {
    pub fn new(score_kind: ScoreKind) -> Self {
        Self {
            score_kind,
            hits: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_capacity(score_kind: ScoreKind, capacity: usize) -> Self {
        Self {
            score_kind,
            hits: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.index.contains_key(doc_id)
    }

    /// Insert a hit, keeping the stronger of two hits for the same ID.
    pub fn insert(&mut self, hit: Hit) {
        match self.index.get(&hit.doc_id) {
            Some(&pos) => {
                if prefer_incoming(&self.hits[pos], &hit) {
                    self.hits[pos] = hit;
                }
            }
            None => {
                self.index.insert(hit.doc_id.clone(), self.hits.len());
                self.hits.push(hit);
            }
        }
    }

    /// Sort descending by fused score with the documented tie-breakers,
    /// then truncate.
    pub fn finish(&mut self, limit: usize) {
        self.hits.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| cmp_semantic_rank(a, b))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        self.hits.truncate(limit);
        self.reindex();
    }

    /// Assign final 1-based ranks in current order.
    pub fn assign_ranks(&mut self) {
        for (i, hit) in self.hits.iter_mut().enumerate() {
            hit.rank = Some(i as u32 + 1);
        }
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }

    fn reindex(&mut self) {
        self.index = self
            .hits
            .iter()
            .enumerate()
            .map(|(i, h)| (h.doc_id.clone(), i))
            .collect();
    }
}

impl FromIterator<Hit> for RankedList {
    /// Collect into a `FusedWeighted` list; use [`RankedList::new`] when a
    /// different score kind applies.
    fn from_iter<T: IntoIterator<Item = Hit>>(iter: T) -> Self {
        let mut list = RankedList::new(ScoreKind::FusedWeighted);
        for hit in iter {
            list.insert(hit);
        }
        list
    }
}

/// Duplicate policy: stronger fused score wins; exact tie goes to the lower
/// semantic rank.
fn prefer_incoming(existing: &Hit, incoming: &Hit) -> bool {
    if incoming.fused_score > existing.fused_score {
        return true;
    }
    if incoming.fused_score < existing.fused_score {
        return false;
    }
    match (incoming.semantic_rank, existing.semantic_rank) {
        (Some(new_rank), Some(old_rank)) => new_rank < old_rank,
        (Some(_), None) => true,
        _ => false,
    }
}

fn cmp_semantic_rank(a: &Hit, b: &Hit) -> std::cmp::Ordering {
    match (a.semantic_rank, b.semantic_rank) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
