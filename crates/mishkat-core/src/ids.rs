//! Canonical document identifiers
//!
//! Every document in the system is named by the tuple of its corpus-specific
//! primary keys, namespaced by corpus so cross-corpus collisions cannot occur.
//! A [`DocId`] is stable across indexing runs and is the dedupe key for every
//! ranked list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The three searchable corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    Quran,
    Hadith,
    Book,
}

impl Corpus {
    /// Stable lowercase name, used in IDs, index names, and debug stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            Corpus::Quran => "quran",
            Corpus::Hadith => "hadith",
            Corpus::Book => "book",
        }
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, corpus-namespaced document identifier.
///
/// Renders as `quran:2:255`, `hadith:bukhari:52`, `book:ihya:412`.
/// Ordering is derived (corpus, then fields) and is used as the final
/// deterministic tie-breaker when fused scores and ranks are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "corpus", rename_all = "lowercase")]
pub enum DocId {
    Quran {
        surah: u16,
        ayah: u16,
    },
    Hadith {
        collection: String,
        number: String,
    },
    Book {
        book_id: String,
        page: u32,
    },
}

impl DocId {
    /// The corpus this ID belongs to.
    pub fn corpus(&self) -> Corpus {
        match self {
            DocId::Quran { .. } => Corpus::Quran,
            DocId::Hadith { .. } => Corpus::Hadith,
            DocId::Book { .. } => Corpus::Book,
        }
    }

    /// Canonical string form, `{corpus}:{keys...}`.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Quran { surah, ayah } => write!(f, "quran:{surah}:{ayah}"),
            DocId::Hadith { collection, number } => write!(f, "hadith:{collection}:{number}"),
            DocId::Book { book_id, page } => write!(f, "book:{book_id}:{page}"),
        }
    }
}

impl FromStr for DocId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let corpus = parts.next().unwrap_or_default();
        let a = parts.next();
        let b = parts.next();

        match (corpus, a, b) {
            ("quran", Some(surah), Some(ayah)) => {
                let surah: u16 = surah
                    .parse()
                    .map_err(|_| CoreError::invalid_doc_id(s))?;
                let ayah: u16 = ayah.parse().map_err(|_| CoreError::invalid_doc_id(s))?;
                if !(1..=114).contains(&surah) || ayah == 0 {
                    return Err(CoreError::invalid_doc_id(s));
                }
                Ok(DocId::Quran { surah, ayah })
            }
            ("hadith", Some(collection), Some(number)) => {
                if collection.is_empty() || number.is_empty() {
                    return Err(CoreError::invalid_doc_id(s));
                }
                Ok(DocId::Hadith {
                    collection: collection.to_string(),
                    number: number.to_string(),
                })
            }
            ("book", Some(book_id), Some(page)) => {
                let page: u32 = page.parse().map_err(|_| CoreError::invalid_doc_id(s))?;
                if book_id.is_empty() {
                    return Err(CoreError::invalid_doc_id(s));
                }
                Ok(DocId::Book {
                    book_id: book_id.to_string(),
                    page,
                })
            }
            _ => Err(CoreError::invalid_doc_id(s)),
        }
    }
}
