//! Direct-match dictionary
//!
//! A static, process-wide mapping from normalized query strings to famous
//! documents: well-known ayahs (Ayat al-Kursi, the Basmala, the last three
//! surahs), common surah names, and famous hadith. A non-empty lookup is an
//! authoritative top-ranked prefix; the statistical pipeline still runs and
//! duplicates are suppressed downstream by canonical ID.
//!
//! The table is built once from an embedded JSON data file; patterns are
//! re-normalized at load so the data file may be written in natural Arabic.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::hit::{HadithPayload, Hit, HitPayload, QuranPayload};
use crate::ids::DocId;
use crate::normalize::normalize;

const DATA: &str = include_str!("../data/direct_matches.json");

#[derive(Debug, Deserialize)]
struct DirectEntry {
    patterns: Vec<String>,
    corpus: String,
    id: String,
    display_ar: String,
    #[serde(default)]
    surah_name_ar: Option<String>,
    #[serde(default)]
    surah_name_en: Option<String>,
    #[serde(default)]
    collection_slug: Option<String>,
}

/// One resolved dictionary target.
#[derive(Debug, Clone)]
struct DirectTarget {
    doc_id: DocId,
    payload: HitPayload,
}

static TABLE: Lazy<HashMap<String, Vec<DirectTarget>>> = Lazy::new(build_table);

fn build_table() -> HashMap<String, Vec<DirectTarget>> {
    let entries: Vec<DirectEntry> = match serde_json::from_str(DATA) {
        Ok(entries) => entries,
        Err(err) => {
            // An unparseable embedded file is a build defect; degrade to an
            // always-miss table rather than panicking at first lookup.
            warn!("direct-match data file failed to parse: {err}");
            return HashMap::new();
        }
    };

    let mut table: HashMap<String, Vec<DirectTarget>> = HashMap::new();
    for entry in entries {
        let Some(target) = entry_target(&entry) else {
            warn!("skipping direct-match entry with bad id: {}", entry.id);
            continue;
        };
        for pattern in &entry.patterns {
            let key = normalize(pattern);
            if key.is_empty() {
                continue;
            }
            table.entry(key).or_default().push(target.clone());
        }
    }
    table
}

fn entry_target(entry: &DirectEntry) -> Option<DirectTarget> {
    match entry.corpus.as_str() {
        "quran" => {
            let mut parts = entry.id.splitn(2, ':');
            let surah: u16 = parts.next()?.parse().ok()?;
            let ayah: u16 = parts.next()?.parse().ok()?;
            Some(DirectTarget {
                doc_id: DocId::Quran { surah, ayah },
                payload: HitPayload::Quran(QuranPayload {
                    surah_number: surah,
                    ayah_number: ayah,
                    text_uthmani: entry.display_ar.clone(),
                    surah_name_ar: entry.surah_name_ar.clone().unwrap_or_default(),
                    surah_name_en: entry.surah_name_en.clone().unwrap_or_default(),
                    ..Default::default()
                }),
            })
        }
        "hadith" => {
            let mut parts = entry.id.splitn(2, ':');
            let collection = parts.next()?.to_string();
            let number = parts.next()?.to_string();
            Some(DirectTarget {
                doc_id: DocId::Hadith {
                    collection: collection.clone(),
                    number: number.clone(),
                },
                payload: HitPayload::Hadith(HadithPayload {
                    collection_slug: entry
                        .collection_slug
                        .clone()
                        .unwrap_or(collection),
                    hadith_number: number,
                    text_ar: entry.display_ar.clone(),
                    ..Default::default()
                }),
            })
        }
        other => {
            warn!("unknown direct-match corpus: {other}");
            None
        }
    }
}

/// Look up a normalized query. Returns hits with `fused_score = 1.0`, or an
/// empty list on miss.
pub fn lookup(normalized_query: &str) -> Vec<Hit> {
    TABLE
        .get(normalized_query)
        .map(|targets| {
            targets
                .iter()
                .map(|t| Hit::direct(t.doc_id.clone(), t.payload.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Corpus;

    #[test]
    fn test_basmala_hits_fatiha_opening() {
        let hits = lookup(&normalize("بسم الله"));
        assert!(!hits.is_empty());
        assert_eq!(hits[0].doc_id, DocId::Quran { surah: 1, ayah: 1 });
        assert_eq!(hits[0].fused_score, 1.0);
    }

    #[test]
    fn test_ayat_al_kursi_by_text_and_name() {
        for q in ["آية الكرسي", "الله لا إله إلا هو الحي القيوم"] {
            let hits = lookup(&normalize(q));
            assert_eq!(
                hits.first().map(|h| h.doc_id.clone()),
                Some(DocId::Quran { surah: 2, ayah: 255 }),
                "query {q:?} missed"
            );
        }
    }

    #[test]
    fn test_famous_hadith() {
        let hits = lookup(&normalize("إنما الأعمال بالنيات"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].corpus, Corpus::Hadith);
        assert_eq!(
            hits[0].doc_id,
            DocId::Hadith {
                collection: "bukhari".into(),
                number: "1".into()
            }
        );
    }

    #[test]
    fn test_surah_name_lookup() {
        let hits = lookup(&normalize("سورة الكهف"));
        assert_eq!(
            hits.first().map(|h| h.doc_id.clone()),
            Some(DocId::Quran { surah: 18, ayah: 1 })
        );
    }

    #[test]
    fn test_miss_returns_empty() {
        assert!(lookup("هذا استعلام لن يطابق شيئا").is_empty());
        assert!(lookup("").is_empty());
    }

    #[test]
    fn test_direct_hits_have_no_channel_ranks() {
        let hits = lookup(&normalize("قل هو الله أحد"));
        let hit = hits.first().expect("ikhlas should match");
        assert!(hit.keyword_rank.is_none());
        assert!(hit.semantic_rank.is_none());
    }
}
