//! Search request parameters
//!
//! Mirrors the public endpoint contract: every field name here corresponds
//! to a query parameter, and the defaults come from configuration. The only
//! hard validation is on `q`; everything else is clamped into sane ranges.

use serde::{Deserialize, Serialize};

use mishkat_config::SearchSettings;

use crate::error::{EngineError, Result};

/// Which model handles cross-corpus reranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RerankerChoice {
    /// Reranking disabled; refine mode keeps post-fusion order
    None,
    /// The configured default model (refine mode only; standard mode never
    /// reranks)
    Default,
    /// An explicit model name
    Model(String),
}

impl RerankerChoice {
    /// Parse the wire form: `none` disables, anything else names a model.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" => Self::Default,
            "none" => Self::None,
            model => Self::Model(model.to_string()),
        }
    }
}

/// One search request with all knobs resolved against configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    /// Refine pipeline: LLM expansion + cross-corpus reranking
    pub refine: bool,

    pub include_quran: bool,
    pub include_hadith: bool,
    pub include_books: bool,

    /// Upper bound on per-corpus returned hits (standard mode)
    pub limit: usize,

    pub reranker: RerankerChoice,

    /// Standard-mode baseline similarity floor
    pub similarity_cutoff: f32,
    /// Refine-mode baseline similarity floor
    pub refine_similarity_cutoff: f32,

    pub pre_rerank_limit: usize,
    pub post_rerank_limit: usize,

    /// Narrow the hadith corpus to these collection slugs
    pub hadith_collections: Option<Vec<String>>,

    /// Per-request expansion model override (refine mode)
    pub expansion_model: Option<String>,

    /// Translation edition codes attached to the response (never searched)
    pub quran_translation: Option<String>,
    pub hadith_translation: Option<String>,
}

impl SearchRequest {
    /// Build a request with configuration defaults.
    pub fn new(q: impl Into<String>, defaults: &SearchSettings) -> Self {
        Self {
            q: q.into(),
            refine: false,
            include_quran: true,
            include_hadith: true,
            include_books: false,
            limit: defaults.limit,
            reranker: RerankerChoice::Default,
            similarity_cutoff: defaults.similarity_cutoff,
            refine_similarity_cutoff: defaults.refine_similarity_cutoff,
            pre_rerank_limit: defaults.pre_rerank_limit,
            post_rerank_limit: defaults.post_rerank_limit,
            hadith_collections: None,
            expansion_model: None,
            quran_translation: None,
            hadith_translation: None,
        }
    }

    /// Validate and normalize in place. Returns the only user-facing input
    /// error; out-of-range numeric knobs are clamped instead.
    pub fn validate(&mut self) -> Result<()> {
        if self.q.trim().chars().count() < 2 {
            return Err(EngineError::InvalidQuery(
                "query must be at least 2 characters after trimming".into(),
            ));
        }
        self.limit = self.limit.clamp(1, 100);
        self.post_rerank_limit = self.post_rerank_limit.clamp(1, 50);
        self.pre_rerank_limit = self.pre_rerank_limit.clamp(self.post_rerank_limit, 200);
        self.similarity_cutoff = self.similarity_cutoff.clamp(0.0, 1.0);
        self.refine_similarity_cutoff = self.refine_similarity_cutoff.clamp(0.0, 1.0);
        Ok(())
    }

    /// Enabled corpora in canonical order.
    pub fn corpora(&self) -> Vec<mishkat_core::Corpus> {
        let mut corpora = Vec::with_capacity(3);
        if self.include_quran {
            corpora.push(mishkat_core::Corpus::Quran);
        }
        if self.include_hadith {
            corpora.push(mishkat_core::Corpus::Hadith);
        }
        if self.include_books {
            corpora.push(mishkat_core::Corpus::Book);
        }
        corpora
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let req = SearchRequest::new("الصبر", &SearchSettings::default());
        assert!(!req.refine);
        assert!(req.include_quran && req.include_hadith && !req.include_books);
        assert_eq!(req.limit, 20);
        assert_eq!(req.similarity_cutoff, 0.60);
        assert_eq!(req.refine_similarity_cutoff, 0.25);
        assert_eq!(req.pre_rerank_limit, 70);
        assert_eq!(req.post_rerank_limit, 10);
    }

    #[test]
    fn test_short_query_rejected() {
        let mut req = SearchRequest::new(" ب ", &SearchSettings::default());
        assert!(matches!(req.validate(), Err(EngineError::InvalidQuery(_))));

        let mut ok = SearchRequest::new("بس", &SearchSettings::default());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_knobs_are_clamped() {
        let mut req = SearchRequest::new("الصبر", &SearchSettings::default());
        req.limit = 0;
        req.pre_rerank_limit = 3;
        req.post_rerank_limit = 9999;
        req.validate().unwrap();
        assert_eq!(req.limit, 1);
        assert_eq!(req.post_rerank_limit, 50);
        assert!(req.pre_rerank_limit >= req.post_rerank_limit);
    }

    #[test]
    fn test_reranker_choice_parse() {
        assert_eq!(RerankerChoice::parse("none"), RerankerChoice::None);
        assert_eq!(RerankerChoice::parse(""), RerankerChoice::Default);
        assert_eq!(
            RerankerChoice::parse("gpt-oss-120b"),
            RerankerChoice::Model("gpt-oss-120b".into())
        );
    }

    #[test]
    fn test_corpora_order_is_canonical() {
        let mut req = SearchRequest::new("الصبر", &SearchSettings::default());
        req.include_books = true;
        assert_eq!(
            req.corpora(),
            vec![
                mishkat_core::Corpus::Quran,
                mishkat_core::Corpus::Hadith,
                mishkat_core::Corpus::Book
            ]
        );
    }
}
