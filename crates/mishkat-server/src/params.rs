//! Search endpoint query parameters
//!
//! The wire names are the contract; they map onto a `SearchRequest` with
//! configuration defaults filling every omitted knob. Parameter validation
//! failures are the 400 class; everything past this module is the engine's
//! concern.

use serde::Deserialize;

use mishkat_engine::{RerankerChoice, SearchEngine, SearchRequest};

/// Raw query parameters for `GET /search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchParams {
    pub q: String,
    /// Pipeline selector; `hybrid` is the only (and implicit) value
    pub mode: Option<String>,
    pub refine: Option<bool>,
    pub include_quran: Option<bool>,
    pub include_hadith: Option<bool>,
    pub include_books: Option<bool>,
    pub limit: Option<usize>,
    pub reranker: Option<String>,
    pub similarity_cutoff: Option<f32>,
    pub refine_similarity_cutoff: Option<f32>,
    pub pre_rerank_limit: Option<usize>,
    pub post_rerank_limit: Option<usize>,
    /// Comma-separated collection slugs
    pub hadith_collections: Option<String>,
    pub embedding_model: Option<String>,
    pub query_expansion_model: Option<String>,
    pub quran_translation: Option<String>,
    pub hadith_translation: Option<String>,
}

impl SearchParams {
    /// Resolve against engine defaults. `Err` carries a user-visible
    /// reason and maps to 400.
    pub fn into_request(self, engine: &SearchEngine) -> Result<SearchRequest, String> {
        if let Some(ref mode) = self.mode {
            if mode != "hybrid" {
                return Err(format!("unknown mode '{mode}'; only 'hybrid' is supported"));
            }
        }

        if let Some(ref model) = self.embedding_model {
            let configured = engine.config().embedding.provider.to_string();
            if *model != configured {
                return Err(format!(
                    "embeddingModel '{model}' is not available; this deployment serves '{configured}'"
                ));
            }
        }

        let mut request = engine.default_request(self.q);
        if let Some(refine) = self.refine {
            request.refine = refine;
        }
        if let Some(v) = self.include_quran {
            request.include_quran = v;
        }
        if let Some(v) = self.include_hadith {
            request.include_hadith = v;
        }
        if let Some(v) = self.include_books {
            request.include_books = v;
        }
        if let Some(v) = self.limit {
            request.limit = v;
        }
        if let Some(ref reranker) = self.reranker {
            request.reranker = RerankerChoice::parse(reranker);
        }
        if let Some(v) = self.similarity_cutoff {
            request.similarity_cutoff = v;
        }
        if let Some(v) = self.refine_similarity_cutoff {
            request.refine_similarity_cutoff = v;
        }
        if let Some(v) = self.pre_rerank_limit {
            request.pre_rerank_limit = v;
        }
        if let Some(v) = self.post_rerank_limit {
            request.post_rerank_limit = v;
        }
        if let Some(ref collections) = self.hadith_collections {
            let slugs: Vec<String> = collections
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !slugs.is_empty() {
                request.hadith_collections = Some(slugs);
            }
        }
        request.expansion_model = self.query_expansion_model;
        request.quran_translation = self.quran_translation;
        request.hadith_translation = self.hadith_translation;

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_deserialize() {
        let params: SearchParams = serde_urlencoded::from_str(
            "q=%D8%A7%D9%84%D8%B5%D8%A8%D8%B1&refine=true&includeBooks=true\
             &limit=5&hadithCollections=bukhari,%20muslim&postRerankLimit=7",
        )
        .unwrap();
        assert_eq!(params.q, "الصبر");
        assert_eq!(params.refine, Some(true));
        assert_eq!(params.include_books, Some(true));
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.post_rerank_limit, Some(7));
        assert_eq!(
            params.hadith_collections.as_deref(),
            Some("bukhari, muslim")
        );
    }

    #[test]
    fn test_unknown_parameter_is_rejected() {
        let result: Result<SearchParams, _> = serde_urlencoded::from_str("q=test&bogus=1");
        assert!(result.is_err());
    }
}
