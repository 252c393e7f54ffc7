//! End-to-end pipeline tests against mocked external stores.
//!
//! The text engine and LLM endpoint are wiremock servers; the vector store,
//! graph store, and embedding provider point at unroutable addresses so
//! their channels exercise the degraded paths.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mishkat_config::{GeminiSettings, MishkatConfig};
use mishkat_core::DocId;
use mishkat_engine::{RerankerChoice, SearchEngine};

/// Engine wired to a mock text engine + LLM, with semantic/graph channels
/// pointing at dead addresses.
async fn engine_with(text_engine: &MockServer, llm: &MockServer, cache_dir: &TempDir) -> SearchEngine {
    let mut config = MishkatConfig::default();
    config.text_engine.url = text_engine.uri();
    config.llm.base_url = llm.uri();
    config.cache.dir = cache_dir.path().to_path_buf();
    config.relational.database_url = "sqlite::memory:".to_string();
    // Dead endpoints: these channels must degrade, not fail the request
    config.vector.url = "http://127.0.0.1:1".to_string();
    config.graph.url = "http://127.0.0.1:1".to_string();
    config.graph.timeout_secs = 1;
    config.embedding.gemini = GeminiSettings {
        base_url: "http://127.0.0.1:1".to_string(),
        api_key_env: "MISHKAT_PIPELINE_TEST_UNSET_KEY".to_string(),
        timeout_secs: 1,
        max_retries: 0,
        ..Default::default()
    };

    SearchEngine::connect(config).await.expect("engine connects")
}

fn quran_engine_hits() -> serde_json::Value {
    json!({
        "hits": { "hits": [
            {
                "_score": 15.0,
                "_source": {
                    "surah_number": 2, "ayah_number": 153,
                    "text_uthmani": "يَا أَيُّهَا الَّذِينَ آمَنُوا اسْتَعِينُوا بِالصَّبْرِ وَالصَّلَاةِ",
                    "surah_name_ar": "البقرة", "surah_name_en": "Al-Baqarah"
                }
            },
            {
                "_score": 11.0,
                "_source": {
                    "surah_number": 2, "ayah_number": 155,
                    "text_uthmani": "وَبَشِّرِ الصَّابِرِينَ",
                    "surah_name_ar": "البقرة", "surah_name_en": "Al-Baqarah"
                }
            }
        ] }
    })
}

fn empty_engine_hits() -> serde_json::Value {
    json!({ "hits": { "hits": [] } })
}

async fn mount_text_engine(server: &MockServer, quran: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/quran_verses/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quran))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hadith_narrations/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_engine_hits()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/book_pages/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_engine_hits()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn standard_search_degrades_to_keyword_only() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_text_engine(&text_engine, quran_engine_hits()).await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let request = engine.default_request("الصبر عند الشدائد والمصائب");
    let response = engine.search(request).await.expect("request succeeds");

    // BM25-only hits, ordered
    assert_eq!(response.quran_hits.len(), 2);
    assert_eq!(
        response.quran_hits[0].doc_id,
        DocId::Quran { surah: 2, ayah: 153 }
    );
    assert!(response.quran_hits[0].fused_score >= response.quran_hits[1].fused_score);
    assert_eq!(response.quran_hits[0].rank, Some(1));

    // Semantic and graph channels flagged, request still 200-shaped
    assert!(response.degraded);
    assert!(response
        .debug_stats
        .degraded_features
        .contains(&"semantic".to_string()));
    assert!(response
        .debug_stats
        .degraded_features
        .contains(&"graph".to_string()));
}

#[tokio::test]
async fn direct_match_leads_with_sentinel_score() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_text_engine(&text_engine, empty_engine_hits()).await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let request = engine.default_request("بسم الله");
    let response = engine.search(request).await.unwrap();

    assert!(response.debug_stats.direct_match);
    let top = response.quran_hits.first().expect("basmala hit");
    assert_eq!(top.doc_id, DocId::Quran { surah: 1, ayah: 1 });
    assert_eq!(top.fused_score, 1.0);
    assert!(top.keyword_rank.is_none() && top.semantic_rank.is_none());
}

#[tokio::test]
async fn direct_match_suppresses_statistical_duplicate() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    // The statistical pipeline also returns 1:1
    mount_text_engine(
        &text_engine,
        json!({ "hits": { "hits": [
            { "_score": 20.0, "_source": { "surah_number": 1, "ayah_number": 1, "text_uthmani": "بسم الله" } },
            { "_score": 10.0, "_source": { "surah_number": 27, "ayah_number": 30, "text_uthmani": "انه من سليمان" } }
        ] } }),
    )
    .await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let response = engine
        .search(engine.default_request("بسم الله"))
        .await
        .unwrap();

    let basmala_count = response
        .quran_hits
        .iter()
        .filter(|h| h.doc_id == DocId::Quran { surah: 1, ayah: 1 })
        .count();
    assert_eq!(basmala_count, 1, "direct hit must not duplicate");
    assert_eq!(response.quran_hits[0].fused_score, 1.0);
    // The non-duplicate statistical hit survives
    assert!(response
        .quran_hits
        .iter()
        .any(|h| h.doc_id == DocId::Quran { surah: 27, ayah: 30 }));
}

#[tokio::test]
async fn short_query_rejected_as_input_error() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let result = engine.search(engine.default_request("ب")).await;
    assert!(matches!(
        result,
        Err(mishkat_engine::EngineError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn all_corpora_disabled_yields_empty_success() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_text_engine(&text_engine, quran_engine_hits()).await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let mut request = engine.default_request("الصبر الجميل");
    request.include_quran = false;
    request.include_hadith = false;
    request.include_books = false;

    let response = engine.search(request).await.expect("still succeeds");
    assert!(response.quran_hits.is_empty());
    assert!(response.hadith_hits.is_empty());
    assert!(response.book_hits.is_empty());
    assert!(response
        .debug_stats
        .degraded_features
        .contains(&"no_corpora_enabled".to_string()));
}

#[tokio::test]
async fn refine_without_reranker_keeps_fused_membership() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_text_engine(&text_engine, quran_engine_hits()).await;

    // Expansion returns three paraphrases
    let expansions = r#"[
        {"query": "حكايات موسى مع فرعون", "rationale": "paraphrase"},
        {"query": "موسى وفرعون في القران", "rationale": "keyword variant"},
        {"query": "خروج بني اسرائيل من مصر", "rationale": "related event"}
    ]"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": expansions } } ]
        })))
        .mount(&llm)
        .await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let mut request = engine.default_request("قصص موسى وفرعون");
    request.refine = true;
    request.reranker = RerankerChoice::None;

    let response = engine.search(request).await.unwrap();

    let expanded = response.expanded_queries.expect("refine reports expansions");
    assert_eq!(expanded.len(), 3);
    assert!(response.debug_stats.expansion_count == 3);

    // With reranker=none the result set is the post-fusion candidates,
    // truncated; both seeded ayahs must be present exactly once
    assert_eq!(response.quran_hits.len(), 2);
    let ids: Vec<&DocId> = response.quran_hits.iter().map(|h| &h.doc_id).collect();
    assert!(ids.contains(&&DocId::Quran { surah: 2, ayah: 153 }));
    assert!(ids.contains(&&DocId::Quran { surah: 2, ayah: 155 }));
    assert_eq!(response.quran_hits[0].rank, Some(1));
}

#[tokio::test]
async fn refine_survives_expander_outage() {
    let text_engine = MockServer::start().await;
    let llm = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_text_engine(&text_engine, quran_engine_hits()).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&llm)
        .await;

    let engine = engine_with(&text_engine, &llm, &cache_dir).await;
    let mut request = engine.default_request("قصص موسى وفرعون");
    request.refine = true;
    request.reranker = RerankerChoice::None;

    let response = engine.search(request).await.expect("degrades, not fails");
    assert!(response
        .debug_stats
        .degraded_features
        .contains(&"expansion".to_string()));
    // The original query still retrieves
    assert!(!response.quran_hits.is_empty());
}
