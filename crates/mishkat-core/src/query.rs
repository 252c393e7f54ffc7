//! Runtime query entity and ranking policy selection
//!
//! A [`Query`] is built once per request from the raw user string. Policy
//! selection (fusion weights, semantic floor) is keyed off the normalized
//! shape, never the raw input.

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, QueryShape};

/// Detected query language, a coarse signal used only for display decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Arabic,
    Other,
}

/// One request's parsed query. Lifetime is scoped to the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw: String,
    pub normalized: String,
    pub quoted_phrases: Vec<String>,
    pub char_count: usize,
    pub word_count: usize,
    pub detected_language: Lang,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize(raw);
        let shape = QueryShape::of(&normalized);
        let detected_language = detect_language(&normalized);
        Self {
            raw: raw.to_string(),
            normalized,
            quoted_phrases: shape.quoted_phrases,
            char_count: shape.char_count,
            word_count: shape.word_count,
            detected_language,
        }
    }

    pub fn has_quote(&self) -> bool {
        !self.quoted_phrases.is_empty()
    }

    /// Whether the semantic channel should be skipped entirely: quoted
    /// phrases signal exact-string intent, and very short queries produce
    /// unreliable embeddings.
    pub fn skip_semantic(&self) -> bool {
        self.has_quote() || self.char_count < 4
    }

    /// Adaptive similarity floor for the semantic channel. Degenerate
    /// queries get a stricter floor than the caller-supplied baseline.
    pub fn similarity_floor(&self, baseline: f32) -> f32 {
        if self.char_count <= 3 {
            0.55
        } else if self.char_count <= 6 || self.word_count == 1 {
            0.45
        } else if self.word_count <= 2 {
            0.35
        } else {
            baseline
        }
    }

    /// Standard-mode fusion weights by query shape.
    pub fn fusion_weights(&self) -> FusionWeights {
        if self.has_quote() {
            FusionWeights::QUOTED
        } else if (1..=3).contains(&self.word_count) {
            FusionWeights::SHORT
        } else if self.word_count >= 20 {
            FusionWeights::VERBOSE
        } else {
            FusionWeights::DEFAULT
        }
    }
}

/// Weight pair for standard-mode weighted-linear fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl FusionWeights {
    /// Quoted phrase: the user wants exact strings
    pub const QUOTED: FusionWeights = FusionWeights {
        semantic: 0.15,
        keyword: 0.85,
    };

    /// 1-3 words without quotes: concepts dominate
    pub const SHORT: FusionWeights = FusionWeights {
        semantic: 0.70,
        keyword: 0.30,
    };

    /// Very long queries: keyword evidence regains weight
    pub const VERBOSE: FusionWeights = FusionWeights {
        semantic: 0.45,
        keyword: 0.55,
    };

    pub const DEFAULT: FusionWeights = FusionWeights {
        semantic: 0.40,
        keyword: 0.60,
    };
}

fn detect_language(normalized: &str) -> Lang {
    let arabic = normalized
        .chars()
        .filter(|c| ('\u{0600}'..='\u{06FF}').contains(c))
        .count();
    let letters = normalized.chars().filter(|c| c.is_alphabetic()).count();
    if letters > 0 && arabic * 2 >= letters {
        Lang::Arabic
    } else {
        Lang::Other
    }
}
