//! Corpus row types
//!
//! Read-only entities built by the offline ingestion pipelines. The request
//! path never mutates these; they arrive either from the relational store or
//! as vector-store payloads (see the tagged payload types in mishkat-search).

use serde::{Deserialize, Serialize};

/// A Quranic verse. `(surah_number, ayah_number)` is the canonical ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ayah {
    pub surah_number: u16,
    pub ayah_number: u16,
    /// Full Uthmani script with diacritics, for display
    pub text_uthmani: String,
    /// Canonical normalized form, for matching
    pub text_normalized: String,
    pub surah_name_ar: String,
    pub surah_name_en: String,
    pub juz: u8,
    pub page: u16,
}

/// A hadith narration. `(collection_slug, hadith_number)` is the canonical ID.
///
/// `hadith_number` is a string: collections number with occasional letter
/// suffixes (e.g. "1234b").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hadith {
    pub collection_slug: String,
    pub book_id: u32,
    pub hadith_number: String,
    pub text_ar: String,
    pub text_normalized: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_en: Option<String>,
}

/// One page of a classical book. `(book_id, page_number)` is the canonical ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookPage {
    pub book_id: String,
    pub page_number: u32,
    pub content_plain: String,
    pub book_title_ar: String,
    pub book_title_en: String,
}

/// A stored translation of a corpus row, selected by edition code
/// (e.g. `eng-khattab`). Translations are optional and presented as-stored;
/// generation is an offline pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub canonical_id: String,
    pub target_language: String,
    pub text: String,
    pub translator: String,
}
