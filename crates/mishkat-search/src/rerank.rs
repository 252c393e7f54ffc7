//! Cross-corpus reranker
//!
//! Refine mode only: the merged candidate pool from all three corpora is
//! serialized with type-tag prefixes (`[QURAN]`, `[HADITH]`, `[BOOK]`) and
//! handed to the LLM, which returns a permutation of the input.
//!
//! Guarantees:
//! - the output is always a permutation — no adds, no drops
//! - any failure (timeout, parse error, non-permutation output) yields the
//!   identity permutation, never an error
//! - deterministic models produce identical orderings for identical inputs

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use mishkat_core::{truncate_chars, Hit, HitPayload};

use crate::llm::ChatClient;

/// Display-text budget per candidate line.
const SNIPPET_CHARS: usize = 160;

const RERANK_SYSTEM_PROMPT: &str = "\
You rank search results for an Arabic-Islamic library. You receive a query and \
a numbered list of candidates from the Quran, hadith collections, and classical \
books. Order the candidates from most to least relevant, applying these rules \
in descending precedence: (1) if the query names a specific verse or hadith, \
that actual source ranks first; (2) documents that directly answer a question \
rank above discussions of its topic; (3) primary sources rank above derivative \
commentary. Respond with ONLY a JSON array of the candidate numbers in your \
chosen order, containing every number exactly once.";

/// LLM-backed reranker over a mixed candidate list.
pub struct Reranker {
    chat: Arc<ChatClient>,
}

impl Reranker {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat }
    }

    /// Rerank candidates with the configured default model.
    pub async fn rerank(&self, query: &str, candidates: &[Hit]) -> Vec<usize> {
        let model = self.chat.reranker_model().to_string();
        self.rerank_with(query, candidates, &model).await
    }

    /// Rerank candidates with an explicit model, returning 0-based indices
    /// into the input slice.
    ///
    /// Always returns a valid permutation; the identity on any failure.
    pub async fn rerank_with(&self, query: &str, candidates: &[Hit], model: &str) -> Vec<usize> {
        let identity: Vec<usize> = (0..candidates.len()).collect();
        if candidates.len() < 2 {
            return identity;
        }

        let user = build_prompt(query, candidates);

        let raw = match self
            .chat
            .complete(model, RERANK_SYSTEM_PROMPT, &user, self.chat.rerank_timeout())
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                debug!("reranker degraded to identity: {err}");
                return identity;
            }
        };

        match parse_permutation(&raw, candidates.len()) {
            Some(order) => order,
            None => {
                warn!("reranker output was not a permutation, using identity");
                identity
            }
        }
    }
}

/// One line per candidate: `N. [TAG] ref — context — snippet`.
fn serialize_candidate(index: usize, hit: &Hit) -> String {
    match &hit.payload {
        HitPayload::Quran(p) => format!(
            "{}. [QURAN] {}:{} — {} — {}",
            index + 1,
            p.surah_number,
            p.ayah_number,
            p.surah_name_en,
            truncate_chars(&p.text_uthmani, SNIPPET_CHARS)
        ),
        HitPayload::Hadith(p) => {
            let chapter = p.chapter_en.as_deref().unwrap_or("");
            format!(
                "{}. [HADITH] {}:{} — {} — {}",
                index + 1,
                p.collection_slug,
                p.hadith_number,
                chapter,
                truncate_chars(&p.text_ar, SNIPPET_CHARS)
            )
        }
        HitPayload::Book(p) => format!(
            "{}. [BOOK] {} p.{} — {} — {}",
            index + 1,
            p.book_id,
            p.page_number,
            p.book_title_en,
            truncate_chars(&p.content_plain, SNIPPET_CHARS)
        ),
    }
}

fn build_prompt(query: &str, candidates: &[Hit]) -> String {
    let mut out = format!("Query: {query}\n\nCandidates:\n");
    for (i, hit) in candidates.iter().enumerate() {
        out.push_str(&serialize_candidate(i, hit));
        out.push('\n');
    }
    out
}

/// Parse a JSON array of 1-based candidate numbers into 0-based indices,
/// accepting it only if it is an exact permutation.
fn parse_permutation(raw: &str, len: usize) -> Option<Vec<usize>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }

    let numbers: Vec<i64> = serde_json::from_str(&raw[start..=end]).ok()?;
    if numbers.len() != len {
        return None;
    }

    let mut seen = HashSet::with_capacity(len);
    let mut order = Vec::with_capacity(len);
    for n in numbers {
        if n < 1 || n as usize > len || !seen.insert(n) {
            return None;
        }
        order.push(n as usize - 1);
    }
    Some(order)
}
