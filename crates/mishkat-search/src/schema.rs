//! Store-boundary schema
//!
//! The vector store and text engine both return dynamically typed payloads.
//! They are parsed exactly once, here, into the per-corpus tagged payload
//! types; untyped values never flow past this module. A point whose payload
//! does not parse for its collection is dropped, never propagated.

use serde::Deserialize;

use mishkat_core::{BookPayload, Corpus, DocId, HadithPayload, HitPayload, QuranPayload};

/// One scored document from a single retrieval channel, already typed.
///
/// Rank is implied by position in the channel's result vector (1-based when
/// materialized onto a [`mishkat_core::Hit`]).
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f32,
    pub payload: HitPayload,
}

/// Wire form of a Quran point payload.
#[derive(Debug, Deserialize)]
pub struct QuranSource {
    pub surah_number: u16,
    pub ayah_number: u16,
    #[serde(default)]
    pub text_uthmani: String,
    #[serde(default)]
    pub surah_name_ar: String,
    #[serde(default)]
    pub surah_name_en: String,
    #[serde(default)]
    pub juz: u8,
    #[serde(default)]
    pub page: u16,
}

/// Wire form of a hadith point payload.
#[derive(Debug, Deserialize)]
pub struct HadithSource {
    pub collection_slug: String,
    pub hadith_number: String,
    #[serde(default)]
    pub text_ar: String,
    #[serde(default)]
    pub chapter_ar: Option<String>,
    #[serde(default)]
    pub chapter_en: Option<String>,
}

/// Wire form of a book-page point payload.
#[derive(Debug, Deserialize)]
pub struct BookSource {
    pub book_id: String,
    pub page_number: u32,
    #[serde(default)]
    pub content_plain: String,
    #[serde(default)]
    pub book_title_ar: String,
    #[serde(default)]
    pub book_title_en: String,
}

/// Parse a JSON payload for the given corpus into a typed `(DocId, payload)`
/// pair. Returns `None` when required identifier fields are missing, in
/// which case the caller drops the point.
pub fn parse_payload(corpus: Corpus, value: &serde_json::Value) -> Option<(DocId, HitPayload)> {
    match corpus {
        Corpus::Quran => {
            let src: QuranSource = serde_json::from_value(value.clone()).ok()?;
            let doc_id = DocId::Quran {
                surah: src.surah_number,
                ayah: src.ayah_number,
            };
            Some((
                doc_id,
                HitPayload::Quran(QuranPayload {
                    surah_number: src.surah_number,
                    ayah_number: src.ayah_number,
                    text_uthmani: src.text_uthmani,
                    surah_name_ar: src.surah_name_ar,
                    surah_name_en: src.surah_name_en,
                    juz: src.juz,
                    page: src.page,
                    translation: None,
                }),
            ))
        }
        Corpus::Hadith => {
            let src: HadithSource = serde_json::from_value(value.clone()).ok()?;
            let doc_id = DocId::Hadith {
                collection: src.collection_slug.clone(),
                number: src.hadith_number.clone(),
            };
            Some((
                doc_id,
                HitPayload::Hadith(HadithPayload {
                    collection_slug: src.collection_slug,
                    hadith_number: src.hadith_number,
                    text_ar: src.text_ar,
                    chapter_ar: src.chapter_ar,
                    chapter_en: src.chapter_en,
                    translation: None,
                }),
            ))
        }
        Corpus::Book => {
            let src: BookSource = serde_json::from_value(value.clone()).ok()?;
            let doc_id = DocId::Book {
                book_id: src.book_id.clone(),
                page: src.page_number,
            };
            Some((
                doc_id,
                HitPayload::Book(BookPayload {
                    book_id: src.book_id,
                    page_number: src.page_number,
                    content_plain: src.content_plain,
                    book_title_ar: src.book_title_ar,
                    book_title_en: src.book_title_en,
                }),
            ))
        }
    }
}
