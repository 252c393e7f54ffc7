//! Arabic text normalization
//!
//! Canonicalizes queries and documents so that indexing and querying share the
//! exact same key space. The pipeline is deterministic, locale-independent,
//! and idempotent:
//!
//! 1. Strip Arabic diacritics (U+064B..U+0652) and tatweel (U+0640)
//! 2. Fold alef variants {آ أ إ ٱ} → ا
//! 3. Fold teh marbuta ة → ه
//! 4. Fold Arabic-Indic digits ٠-٩ → 0-9
//! 5. Collapse consecutive whitespace; trim
//!
//! The output is used verbatim as a BM25 analyzer input and as a cache key,
//! so any change here invalidates every index and cache downstream.

/// Quote characters recognized for exact-phrase intent.
pub const QUOTE_CHARS: [char; 6] = ['"', '«', '»', '„', '\u{201C}', '\u{201D}'];

/// Normalize an Arabic (or mixed) string into its canonical search form.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true; // leading whitespace is dropped

    for ch in input.chars() {
        let folded = match ch {
            // Harakat, sukun, shadda, and friends
            '\u{064B}'..='\u{0652}' => continue,
            // Tatweel (kashida)
            '\u{0640}' => continue,
            // Alef variants
            'آ' | 'أ' | 'إ' | 'ٱ' => 'ا',
            // Teh marbuta
            'ة' => 'ه',
            // Arabic-Indic digits
            '٠'..='٩' => {
                let offset = (ch as u32) - ('٠' as u32);
                char::from_u32('0' as u32 + offset).unwrap_or(ch)
            }
            c if c.is_whitespace() => {
                if last_was_space {
                    continue;
                }
                last_was_space = true;
                out.push(' ');
                continue;
            }
            c => c,
        };
        last_was_space = false;
        out.push(folded);
    }

    // Drop a single trailing space left by the collapse pass
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Shape analysis of a normalized query, used for fusion-policy selection
/// and the adaptive semantic similarity floor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryShape {
    /// Count of non-space characters in the normalized text
    pub char_count: usize,
    /// Whitespace-separated word count
    pub word_count: usize,
    /// Phrases enclosed in any of [`QUOTE_CHARS`], in order of appearance
    pub quoted_phrases: Vec<String>,
}

impl QueryShape {
    /// Analyze a normalized query string.
    pub fn of(normalized: &str) -> Self {
        let char_count = normalized.chars().filter(|c| !c.is_whitespace()).count();
        let word_count = normalized.split_whitespace().count();
        let quoted_phrases = extract_quoted(normalized);

        Self {
            char_count,
            word_count,
            quoted_phrases,
        }
    }

    /// Whether the query carries exact-phrase intent.
    pub fn has_quote(&self) -> bool {
        !self.quoted_phrases.is_empty()
    }
}

/// Extract phrases enclosed between quote characters.
///
/// Quote marks toggle an in-phrase state; an unclosed trailing quote yields
/// no phrase. Empty phrases ("" or «») are discarded.
fn extract_quoted(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Option<String> = None;

    for ch in text.chars() {
        if QUOTE_CHARS.contains(&ch) {
            match current.take() {
                Some(phrase) => {
                    let trimmed = phrase.trim();
                    if !trimmed.is_empty() {
                        phrases.push(trimmed.to_string());
                    }
                }
                None => current = Some(String::new()),
            }
        } else if let Some(ref mut phrase) = current {
            phrase.push(ch);
        }
    }

    phrases
}

/// Convert Western digits in a string to Arabic-Indic digits.
///
/// Used for Arabic-facing display labels; the inverse of normalization
/// step 4, applied only at the presentation edge.
pub fn to_arabic_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '0'..='9' => {
                let offset = (c as u32) - ('0' as u32);
                char::from_u32('٠' as u32 + offset).unwrap_or(c)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize("بِسْمِ اللَّهِ"), "بسم الله");
        assert_eq!(normalize("الرَّحْمَٰنِ"), "الرحمن");
    }

    #[test]
    fn test_strips_tatweel() {
        assert_eq!(normalize("الـلـه"), "الله");
    }

    #[test]
    fn test_folds_alef_variants() {
        assert_eq!(normalize("أحمد"), "احمد");
        assert_eq!(normalize("إيمان"), "ايمان");
        assert_eq!(normalize("آية"), "ايه");
        assert_eq!(normalize("ٱلله"), "الله");
    }

    #[test]
    fn test_folds_teh_marbuta() {
        assert_eq!(normalize("سورة"), "سوره");
    }

    #[test]
    fn test_folds_arabic_indic_digits() {
        assert_eq!(normalize("٢:٢٥٥"), "2:255");
        assert_eq!(normalize("سورة ١٢"), "سوره 12");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  بسم   الله\t\nالرحمن  "), "بسم الله الرحمن");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ",
            "  آية   الكرسي ",
            "patience in hardship",
            "٠١٢٣٤٥٦٧٨٩",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_latin_text_passes_through() {
        assert_eq!(normalize("patience in hardship"), "patience in hardship");
    }

    #[test]
    fn test_query_shape_counts() {
        let shape = QueryShape::of("بسم الله");
        assert_eq!(shape.char_count, 7);
        assert_eq!(shape.word_count, 2);
        assert!(!shape.has_quote());
    }

    #[test]
    fn test_quoted_phrase_extraction() {
        let shape = QueryShape::of("\"والعصر ان الانسان لفي خسر\"");
        assert_eq!(shape.quoted_phrases.len(), 1);
        assert_eq!(shape.quoted_phrases[0], "والعصر ان الانسان لفي خسر");
        assert!(shape.has_quote());
    }

    #[test]
    fn test_guillemet_quotes() {
        let shape = QueryShape::of("قال «الدين النصيحه» ثلاثا");
        assert_eq!(shape.quoted_phrases, vec!["الدين النصيحه".to_string()]);
    }

    #[test]
    fn test_unclosed_quote_yields_no_phrase() {
        let shape = QueryShape::of("\"نصف اقتباس");
        assert!(shape.quoted_phrases.is_empty());
    }

    #[test]
    fn test_to_arabic_digits() {
        assert_eq!(to_arabic_digits("2:255"), "٢:٢٥٥");
        assert_eq!(to_arabic_digits("no digits"), "no digits");
    }
}
