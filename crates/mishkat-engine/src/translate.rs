//! Translation attachment
//!
//! After ranking, stored translations for the selected edition codes are
//! attached to Quran and hadith hits. Lookups go through the translation
//! LRU tier; all cache misses for a response resolve with one batched
//! relational query per corpus. Translations are presented as-stored —
//! generation and backfill are offline pipelines and never delay the
//! response.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use mishkat_core::{Corpus, DocId, Hit, HitPayload};
use mishkat_graph::RelationalStore;
use mishkat_search::CacheLayer;

/// Attach Quran translations in place. Best-effort: a store failure leaves
/// hits untranslated.
pub async fn attach_quran_translations(
    hits: &mut [Hit],
    edition: &str,
    store: &Arc<RelationalStore>,
    cache: &Arc<CacheLayer>,
) {
    let mut misses: Vec<(u16, u16)> = Vec::new();

    for hit in hits.iter_mut() {
        let DocId::Quran { surah, ayah } = hit.doc_id else {
            continue;
        };
        let key = CacheLayer::translation_key(Corpus::Quran, &hit.doc_id, edition);
        match cache.translation_get(&key) {
            Some(cached) => apply_translation(&mut hit.payload, cached),
            None => misses.push((surah, ayah)),
        }
    }

    if misses.is_empty() {
        return;
    }
    misses.sort_unstable();
    misses.dedup();

    let rows = match store.quran_translations(&misses, edition).await {
        Ok(rows) => rows,
        Err(err) => {
            debug!("quran translation lookup failed: {err}");
            return;
        }
    };
    let fetched: HashMap<(u16, u16), String> = rows
        .into_iter()
        .map(|(surah, ayah, text)| ((surah, ayah), text))
        .collect();

    for (surah, ayah) in &misses {
        let doc_id = DocId::Quran {
            surah: *surah,
            ayah: *ayah,
        };
        let key = CacheLayer::translation_key(Corpus::Quran, &doc_id, edition);
        cache.translation_put(&key, fetched.get(&(*surah, *ayah)).cloned());
    }

    for hit in hits.iter_mut() {
        let DocId::Quran { surah, ayah } = hit.doc_id else {
            continue;
        };
        if let Some(text) = fetched.get(&(surah, ayah)) {
            apply_translation(&mut hit.payload, Some(text.clone()));
        }
    }
}

/// Attach hadith translations in place. Same contract as the Quran path.
pub async fn attach_hadith_translations(
    hits: &mut [Hit],
    edition: &str,
    store: &Arc<RelationalStore>,
    cache: &Arc<CacheLayer>,
) {
    let mut misses: Vec<(String, String)> = Vec::new();

    for hit in hits.iter_mut() {
        let DocId::Hadith {
            ref collection,
            ref number,
        } = hit.doc_id
        else {
            continue;
        };
        let key = CacheLayer::translation_key(Corpus::Hadith, &hit.doc_id, edition);
        match cache.translation_get(&key) {
            Some(cached) => apply_translation(&mut hit.payload, cached),
            None => misses.push((collection.clone(), number.clone())),
        }
    }

    if misses.is_empty() {
        return;
    }
    misses.sort();
    misses.dedup();

    let rows = match store.hadith_translations(&misses, edition).await {
        Ok(rows) => rows,
        Err(err) => {
            debug!("hadith translation lookup failed: {err}");
            return;
        }
    };
    let fetched: HashMap<(String, String), String> = rows
        .into_iter()
        .map(|(collection, number, text)| ((collection, number), text))
        .collect();

    for (collection, number) in &misses {
        let doc_id = DocId::Hadith {
            collection: collection.clone(),
            number: number.clone(),
        };
        let key = CacheLayer::translation_key(Corpus::Hadith, &doc_id, edition);
        cache.translation_put(
            &key,
            fetched.get(&(collection.clone(), number.clone())).cloned(),
        );
    }

    for hit in hits.iter_mut() {
        let DocId::Hadith {
            ref collection,
            ref number,
        } = hit.doc_id
        else {
            continue;
        };
        if let Some(text) = fetched.get(&(collection.clone(), number.clone())) {
            apply_translation(&mut hit.payload, Some(text.clone()));
        }
    }
}

fn apply_translation(payload: &mut HitPayload, translation: Option<String>) {
    match payload {
        HitPayload::Quran(p) => p.translation = translation,
        HitPayload::Hadith(p) => p.translation = translation,
        HitPayload::Book(_) => {}
    }
}
