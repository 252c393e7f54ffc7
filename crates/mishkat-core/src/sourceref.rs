//! Source references for knowledge-graph entities
//!
//! Entities and relationship edges carry `sources` — JSON strings listing the
//! scriptural evidence behind them. Each entry is a tagged `{kind, ref}` pair
//! whose `ref` must parse under its kind's grammar; entries that do not parse
//! are dropped silently, never failing the request.
//!
//! Grammars (bit-exact):
//! - quran:  `S:A` or `S:A-B`, surah 1..114, ayah >= 1
//! - hadith: `collection:number`, number may carry one trailing letter
//! - tafsir: `source:S:A` with source in {ibn_kathir, jalalayn, saadi}
//! - book:   `book:book_id:page`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::to_arabic_digits;

static QURAN_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+):([0-9]+)(?:-([0-9]+))?$").unwrap());
static HADITH_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9_-]+):([0-9]+[A-Za-z]?)$").unwrap());
static TAFSIR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(ibn_kathir|jalalayn|saadi):([0-9]+):([0-9]+)$").unwrap());
static BOOK_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^book:([a-z0-9]+):([0-9]+)$").unwrap());

/// The kind tag of a source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Quran,
    Hadith,
    Tafsir,
    Book,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Quran => "quran",
            SourceKind::Hadith => "hadith",
            SourceKind::Tafsir => "tafsir",
            SourceKind::Book => "book",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Quran reference: a single ayah or an inclusive range within one surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuranRange {
    pub surah: u16,
    pub ayah_start: u16,
    pub ayah_end: u16,
}

impl QuranRange {
    /// Parse `S:A` or `S:A-B`. Returns `None` on grammar or range violations.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = QURAN_REF.captures(s)?;
        let surah: u16 = caps[1].parse().ok()?;
        let ayah_start: u16 = caps[2].parse().ok()?;
        let ayah_end: u16 = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => ayah_start,
        };
        if !(1..=114).contains(&surah) || ayah_start == 0 || ayah_end < ayah_start {
            return None;
        }
        Some(Self {
            surah,
            ayah_start,
            ayah_end,
        })
    }

    pub fn is_single(&self) -> bool {
        self.ayah_start == self.ayah_end
    }
}

impl fmt::Display for QuranRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}:{}", self.surah, self.ayah_start)
        } else {
            write!(f, "{}:{}-{}", self.surah, self.ayah_start, self.ayah_end)
        }
    }
}

/// The structured interpretation of a validated ref string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParsedSource {
    Quran(QuranRange),
    Hadith { collection: String, number: String },
    Tafsir { source: String, surah: u16, ayah: u16 },
    Book { book_id: String, page: u32 },
}

/// A validated source reference: kind tag, raw ref string, and its parse.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub raw: String,
    pub parsed: ParsedSource,
}

/// Wire form of a source entry inside a `sources` JSON string.
#[derive(Debug, Deserialize)]
struct RawSourceEntry {
    kind: String,
    #[serde(rename = "ref")]
    reference: String,
}

impl SourceRef {
    /// Validate a `{kind, ref}` pair. Returns `None` if the ref does not
    /// parse under its kind's grammar.
    ///
    /// The URL form `ibn-kathir` is rewritten to `ibn_kathir` before the
    /// tafsir grammar is applied.
    pub fn parse(kind: SourceKind, reference: &str) -> Option<Self> {
        let parsed = match kind {
            SourceKind::Quran => ParsedSource::Quran(QuranRange::parse(reference)?),
            SourceKind::Hadith => {
                let caps = HADITH_REF.captures(reference)?;
                ParsedSource::Hadith {
                    collection: caps[1].to_string(),
                    number: caps[2].to_string(),
                }
            }
            SourceKind::Tafsir => {
                let rewritten = reference.replacen("ibn-kathir", "ibn_kathir", 1);
                let caps = TAFSIR_REF.captures(&rewritten)?;
                let surah: u16 = caps[2].parse().ok()?;
                let ayah: u16 = caps[3].parse().ok()?;
                if !(1..=114).contains(&surah) || ayah == 0 {
                    return None;
                }
                return Some(Self {
                    kind,
                    raw: rewritten.clone(),
                    parsed: ParsedSource::Tafsir {
                        source: caps[1].to_string(),
                        surah,
                        ayah,
                    },
                });
            }
            SourceKind::Book => {
                let caps = BOOK_REF.captures(reference)?;
                ParsedSource::Book {
                    book_id: caps[1].to_string(),
                    page: caps[2].parse().ok()?,
                }
            }
        };
        Some(Self {
            kind,
            raw: reference.to_string(),
            parsed,
        })
    }

    /// Parse a kind tag string and a ref string together.
    pub fn parse_tagged(kind: &str, reference: &str) -> Option<Self> {
        let kind = match kind {
            "quran" => SourceKind::Quran,
            "hadith" => SourceKind::Hadith,
            "tafsir" => SourceKind::Tafsir,
            "book" => SourceKind::Book,
            _ => return None,
        };
        Self::parse(kind, reference)
    }

    /// Parse a `sources` JSON string (an array of `{kind, ref}` objects).
    ///
    /// Malformed JSON yields an empty list; malformed entries are dropped
    /// silently. Neither ever fails the request.
    pub fn parse_sources_json(json: &str) -> Vec<SourceRef> {
        let entries: Vec<RawSourceEntry> = match serde_json::from_str(json) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("dropping unparseable sources field: {err}");
                return Vec::new();
            }
        };
        entries
            .iter()
            .filter_map(|e| Self::parse_tagged(&e.kind, &e.reference))
            .collect()
    }

    /// Map key form, `{kind}:{ref}`, used to join resolved sources back to
    /// the refs that requested them.
    pub fn canonical_key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.raw)
    }

    /// English-facing display label (Western digits).
    pub fn label_en(&self) -> String {
        match &self.parsed {
            ParsedSource::Quran(range) => format!("Quran {range}"),
            ParsedSource::Hadith { collection, number } => {
                format!("{} {}", title_case(collection), number)
            }
            ParsedSource::Tafsir { source, surah, ayah } => {
                format!("Tafsir {} {surah}:{ayah}", title_case(source))
            }
            ParsedSource::Book { book_id, page } => format!("{book_id}, p. {page}"),
        }
    }

    /// Arabic-facing display label (Arabic-Indic digits).
    pub fn label_ar(&self) -> String {
        let western = match &self.parsed {
            ParsedSource::Quran(range) => format!("القران {range}"),
            ParsedSource::Hadith { collection, number } => format!("{collection} {number}"),
            ParsedSource::Tafsir { source, surah, ayah } => {
                format!("تفسير {source} {surah}:{ayah}")
            }
            ParsedSource::Book { book_id, page } => format!("{book_id} ص {page}"),
        };
        to_arabic_digits(&western)
    }
}

/// Truncate on a character boundary, appending an ellipsis only if the text
/// was actually shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quran_single_and_range() {
        let single = QuranRange::parse("2:255").unwrap();
        assert!(single.is_single());
        assert_eq!(single.surah, 2);

        let range = QuranRange::parse("2:1-5").unwrap();
        assert_eq!((range.ayah_start, range.ayah_end), (1, 5));
        assert_eq!(range.to_string(), "2:1-5");
    }

    #[test]
    fn test_quran_rejects_bad_ranges() {
        assert!(QuranRange::parse("115:1").is_none());
        assert!(QuranRange::parse("2:0").is_none());
        assert!(QuranRange::parse("2:10-5").is_none());
        assert!(QuranRange::parse("2:255:1").is_none());
    }

    #[test]
    fn test_hadith_ref() {
        let r = SourceRef::parse(SourceKind::Hadith, "bukhari:52").unwrap();
        assert_eq!(
            r.parsed,
            ParsedSource::Hadith {
                collection: "bukhari".into(),
                number: "52".into()
            }
        );
        // Trailing letter suffix is allowed
        assert!(SourceRef::parse(SourceKind::Hadith, "abu_dawud:1234b").is_some());
        // But not more than one
        assert!(SourceRef::parse(SourceKind::Hadith, "bukhari:12bb").is_none());
        assert!(SourceRef::parse(SourceKind::Hadith, "Bukhari:12").is_none());
    }

    #[test]
    fn test_tafsir_ref_and_rewrite() {
        let r = SourceRef::parse(SourceKind::Tafsir, "ibn-kathir:2:255").unwrap();
        assert_eq!(r.raw, "ibn_kathir:2:255");
        assert!(SourceRef::parse(SourceKind::Tafsir, "jalalayn:18:10").is_some());
        assert!(SourceRef::parse(SourceKind::Tafsir, "tabari:2:255").is_none());
    }

    #[test]
    fn test_book_ref() {
        let r = SourceRef::parse(SourceKind::Book, "book:ihya:412").unwrap();
        assert_eq!(
            r.parsed,
            ParsedSource::Book {
                book_id: "ihya".into(),
                page: 412
            }
        );
        assert!(SourceRef::parse(SourceKind::Book, "ihya:412").is_none());
    }

    #[test]
    fn test_canonical_key() {
        let r = SourceRef::parse(SourceKind::Quran, "2:255").unwrap();
        assert_eq!(r.canonical_key(), "quran:2:255");
    }

    #[test]
    fn test_sources_json_drops_malformed_silently() {
        let json = r#"[
            {"kind": "quran", "ref": "2:255"},
            {"kind": "quran", "ref": "999:1"},
            {"kind": "hadith", "ref": "bukhari:1"},
            {"kind": "scroll", "ref": "1:1"}
        ]"#;
        let refs = SourceRef::parse_sources_json(json);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].canonical_key(), "quran:2:255");
        assert_eq!(refs[1].canonical_key(), "hadith:bukhari:1");
    }

    #[test]
    fn test_sources_json_garbage_is_empty() {
        assert!(SourceRef::parse_sources_json("not json").is_empty());
        assert!(SourceRef::parse_sources_json("{}").is_empty());
    }

    #[test]
    fn test_labels() {
        let r = SourceRef::parse(SourceKind::Quran, "2:255").unwrap();
        assert_eq!(r.label_en(), "Quran 2:255");
        assert_eq!(r.label_ar(), "القران ٢:٢٥٥");
    }

    #[test]
    fn test_truncate_char_boundary() {
        // Arabic text: must never split a scalar
        let text = "بسم الله الرحمن الرحيم";
        let truncated = truncate_chars(text, 8);
        assert_eq!(truncated, "بسم الله…");
        // No ellipsis when nothing was removed
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }
}
