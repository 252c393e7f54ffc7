//! Graph resolver
//!
//! Two public operations:
//!
//! - [`GraphResolver::search_entities`]: full-text lookup in the entity
//!   graph (top 5, score floor 0.5), 1-hop expansion into the arena, and
//!   collection of every cited source ref for batch resolution. Graph
//!   unavailable → empty result with zero timing; the response still
//!   succeeds.
//! - [`GraphResolver::resolve_sources`]: partition refs by kind and issue
//!   one batched relational query per kind, all partitions concurrently.
//!   A missing referent is omitted, not an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use mishkat_core::{
    truncate_chars, Entity, EntityKind, EntityView, KnowledgeGraph, Mention, MentionRole,
    MentionView, ParsedSource, QuranRange, Relationship, RelationshipView, ResolvedSource,
    SourceRef,
};

use crate::client::GraphClient;
use crate::store::RelationalStore;

/// Entity matches returned per query.
const ENTITY_LIMIT: usize = 5;

/// Full-text score floor below which matches are discarded.
const ENTITY_SCORE_FLOOR: f32 = 0.5;

/// Display truncation budgets, in characters.
const HADITH_TRUNCATE: usize = 300;
const TAFSIR_TRUNCATE: usize = 400;
const BOOK_TRUNCATE: usize = 300;

/// Result of an entity search: the per-request arena plus bookkeeping.
pub struct EntitySearchOutcome {
    pub graph: KnowledgeGraph,
    /// Flattened unique source refs cited by matched entities and their
    /// 1-hop edges
    pub all_source_refs: Vec<SourceRef>,
    pub timing_ms: u64,
    /// True when the graph store was unreachable
    pub degraded: bool,
}

impl EntitySearchOutcome {
    fn empty(degraded: bool) -> Self {
        Self {
            graph: KnowledgeGraph::new(),
            all_source_refs: Vec::new(),
            timing_ms: 0,
            degraded,
        }
    }
}

/// Knowledge-graph augmentation over the graph store and relational store.
pub struct GraphResolver {
    client: Arc<GraphClient>,
    store: Arc<RelationalStore>,
}

impl GraphResolver {
    pub fn new(client: Arc<GraphClient>, store: Arc<RelationalStore>) -> Self {
        Self { client, store }
    }

    /// Look up entities matching the query and expand their 1-hop
    /// neighborhoods into an arena. Never fails: an unreachable graph
    /// yields an empty outcome with zero timing.
    pub async fn search_entities(&self, normalized_query: &str) -> EntitySearchOutcome {
        let start = Instant::now();

        let matches = match self
            .client
            .search_entities(normalized_query, ENTITY_LIMIT, ENTITY_SCORE_FLOOR)
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                debug!("graph unavailable, degrading: {err}");
                return EntitySearchOutcome::empty(true);
            }
        };

        let mut graph = KnowledgeGraph::new();

        for (row, _score) in matches {
            let Some(kind) = EntityKind::parse(&row.kind) else {
                warn!("dropping entity '{}' with unknown kind '{}'", row.id, row.kind);
                continue;
            };
            let sources = SourceRef::parse_sources_json(&row.sources);
            let idx = graph.add_entity(Entity {
                id: row.id.clone(),
                kind,
                name_ar: row.name_ar,
                name_en: row.name_en,
                description_ar: row.description_ar,
                description_en: row.description_en,
                sources,
            });

            // 1-hop expansion is best-effort per entity
            let (relationships, mentions) = match self.client.neighborhood(&row.id).await {
                Ok(neighborhood) => neighborhood,
                Err(err) => {
                    debug!("neighborhood fetch failed for '{}': {err}", row.id);
                    continue;
                }
            };

            for rel in relationships {
                let Some(target_kind) = EntityKind::parse(&rel.target.kind) else {
                    continue;
                };
                let target_sources = SourceRef::parse_sources_json(&rel.target.sources);
                let target_idx = graph.add_entity(Entity {
                    id: rel.target.id,
                    kind: target_kind,
                    name_ar: rel.target.name_ar,
                    name_en: rel.target.name_en,
                    description_ar: rel.target.description_ar,
                    description_en: rel.target.description_en,
                    sources: target_sources,
                });
                graph.add_relationship(
                    idx,
                    target_idx,
                    Relationship {
                        rel_type: rel.rel_type,
                        description: rel.description,
                        sources: SourceRef::parse_sources_json(&rel.sources),
                    },
                );
            }

            for mention in mentions {
                let Some(role) = MentionRole::parse(&mention.role) else {
                    continue;
                };
                let Some(ayahs) = QuranRange::parse(&mention.ayah_group) else {
                    continue;
                };
                graph.add_mention(
                    idx,
                    Mention {
                        role,
                        context: mention.context,
                        ayahs,
                    },
                );
            }
        }

        let all_source_refs = graph.all_source_refs();
        EntitySearchOutcome {
            graph,
            all_source_refs,
            timing_ms: start.elapsed().as_millis() as u64,
            degraded: false,
        }
    }

    /// Batch-resolve source refs against the relational store.
    ///
    /// Refs are partitioned by kind; the four partitions run concurrently
    /// and merge into one map keyed by `{kind}:{ref}`. Partition failures
    /// drop that partition's entries.
    pub async fn resolve_sources(&self, refs: &[SourceRef]) -> BTreeMap<String, ResolvedSource> {
        let mut quran_refs: Vec<(&SourceRef, QuranRange)> = Vec::new();
        let mut hadith_by_collection: HashMap<String, Vec<(&SourceRef, String)>> = HashMap::new();
        let mut tafsir_refs: Vec<(&SourceRef, (String, u16, u16))> = Vec::new();
        let mut book_refs: Vec<(&SourceRef, (String, u32))> = Vec::new();

        for sref in refs {
            match &sref.parsed {
                ParsedSource::Quran(range) => quran_refs.push((sref, *range)),
                ParsedSource::Hadith { collection, number } => hadith_by_collection
                    .entry(collection.clone())
                    .or_default()
                    .push((sref, number.clone())),
                ParsedSource::Tafsir { source, surah, ayah } => {
                    tafsir_refs.push((sref, (source.clone(), *surah, *ayah)))
                }
                ParsedSource::Book { book_id, page } => {
                    book_refs.push((sref, (book_id.clone(), *page)))
                }
            }
        }

        let (quran, hadith, tafsir, book) = tokio::join!(
            self.resolve_quran(&quran_refs),
            self.resolve_hadith(&hadith_by_collection),
            self.resolve_tafsir(&tafsir_refs),
            self.resolve_book(&book_refs),
        );

        let mut resolved = BTreeMap::new();
        for partition in [quran, hadith, tafsir, book] {
            resolved.extend(partition);
        }
        resolved
    }

    async fn resolve_quran(
        &self,
        refs: &[(&SourceRef, QuranRange)],
    ) -> BTreeMap<String, ResolvedSource> {
        let mut keys: Vec<(u16, u16)> = Vec::new();
        for (_, range) in refs {
            for ayah in range.ayah_start..=range.ayah_end {
                keys.push((range.surah, ayah));
            }
        }
        keys.sort_unstable();
        keys.dedup();

        let rows = match self.store.ayahs_in(&keys).await {
            Ok(rows) => rows,
            Err(err) => {
                debug!("quran source resolution failed: {err}");
                return BTreeMap::new();
            }
        };
        let texts: HashMap<(u16, u16), String> = rows
            .into_iter()
            .map(|(surah, ayah, text)| ((surah, ayah), text))
            .collect();

        let mut out = BTreeMap::new();
        for (sref, range) in refs {
            // Reassemble the range in ayah order, single-space separated
            let joined: Vec<&str> = (range.ayah_start..=range.ayah_end)
                .filter_map(|ayah| texts.get(&(range.surah, ayah)).map(String::as_str))
                .collect();
            if joined.is_empty() {
                continue;
            }
            out.insert(sref.canonical_key(), make_resolved(sref, joined.join(" ")));
        }
        out
    }

    async fn resolve_hadith(
        &self,
        by_collection: &HashMap<String, Vec<(&SourceRef, String)>>,
    ) -> BTreeMap<String, ResolvedSource> {
        let mut out = BTreeMap::new();
        // One query per collection; collections run sequentially within
        // this partition while partitions run concurrently
        for (collection, entries) in by_collection {
            let numbers: Vec<String> = entries.iter().map(|(_, n)| n.clone()).collect();
            let rows = match self.store.hadith_texts(collection, &numbers).await {
                Ok(rows) => rows,
                Err(err) => {
                    debug!("hadith source resolution failed for '{collection}': {err}");
                    continue;
                }
            };
            let texts: HashMap<String, String> = rows.into_iter().collect();
            for (sref, number) in entries {
                if let Some(text) = texts.get(number) {
                    out.insert(
                        sref.canonical_key(),
                        make_resolved(sref, truncate_chars(text, HADITH_TRUNCATE)),
                    );
                }
            }
        }
        out
    }

    async fn resolve_tafsir(
        &self,
        refs: &[(&SourceRef, (String, u16, u16))],
    ) -> BTreeMap<String, ResolvedSource> {
        let triples: Vec<(String, u16, u16)> = refs.iter().map(|(_, t)| t.clone()).collect();
        let rows = match self.store.tafsir_texts(&triples).await {
            Ok(rows) => rows,
            Err(err) => {
                debug!("tafsir source resolution failed: {err}");
                return BTreeMap::new();
            }
        };
        let texts: HashMap<(String, u16, u16), String> = rows
            .into_iter()
            .map(|(source, surah, ayah, text)| ((source, surah, ayah), text))
            .collect();

        let mut out = BTreeMap::new();
        for (sref, triple) in refs {
            if let Some(text) = texts.get(triple) {
                out.insert(
                    sref.canonical_key(),
                    make_resolved(sref, truncate_chars(text, TAFSIR_TRUNCATE)),
                );
            }
        }
        out
    }

    async fn resolve_book(
        &self,
        refs: &[(&SourceRef, (String, u32))],
    ) -> BTreeMap<String, ResolvedSource> {
        let keys: Vec<(String, u32)> = refs.iter().map(|(_, k)| k.clone()).collect();
        let rows = match self.store.book_pages(&keys).await {
            Ok(rows) => rows,
            Err(err) => {
                debug!("book source resolution failed: {err}");
                return BTreeMap::new();
            }
        };
        let texts: HashMap<(String, u32), String> = rows
            .into_iter()
            .map(|(book_id, page, text)| ((book_id, page), text))
            .collect();

        let mut out = BTreeMap::new();
        for (sref, key) in refs {
            if let Some(text) = texts.get(key) {
                out.insert(
                    sref.canonical_key(),
                    make_resolved(sref, truncate_chars(text, BOOK_TRUNCATE)),
                );
            }
        }
        out
    }

    /// Serialize the arena into response views.
    pub fn context_views(graph: &KnowledgeGraph) -> Vec<EntityView> {
        graph
            .entities()
            .map(|(idx, entity)| EntityView {
                id: entity.id.clone(),
                kind: entity.kind,
                name_ar: entity.name_ar.clone(),
                name_en: entity.name_en.clone(),
                description_ar: entity.description_ar.clone(),
                description_en: entity.description_en.clone(),
                source_keys: entity.sources.iter().map(|s| s.canonical_key()).collect(),
                relationships: graph
                    .out_relationships(idx)
                    .into_iter()
                    .filter_map(|(target_idx, rel)| {
                        let target = graph.entity(target_idx)?;
                        Some(RelationshipView {
                            rel_type: rel.rel_type.clone(),
                            target_id: target.id.clone(),
                            target_name_ar: target.name_ar.clone(),
                            target_name_en: target.name_en.clone(),
                            description: rel.description.clone(),
                        })
                    })
                    .collect(),
                mentions: graph
                    .mentions(idx)
                    .iter()
                    .map(|m| MentionView {
                        role: m.role,
                        context: m.context.clone(),
                        ayahs: m.ayahs.to_string(),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn store(&self) -> &Arc<RelationalStore> {
        &self.store
    }
}

fn make_resolved(sref: &SourceRef, text: String) -> ResolvedSource {
    ResolvedSource {
        kind: sref.kind.as_str().to_string(),
        reference: sref.raw.clone(),
        label_ar: sref.label_ar(),
        label_en: sref.label_en(),
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mishkat_config::GraphStoreSettings;
    use mishkat_core::SourceKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_resolver() -> GraphResolver {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::raw_sql(
            "CREATE TABLE ayahs (surah_number INTEGER, ayah_number INTEGER, text_uthmani TEXT);
             CREATE TABLE hadiths (collection_slug TEXT, hadith_number TEXT, text_ar TEXT);
             CREATE TABLE tafsirs (source TEXT, surah_number INTEGER, ayah_number INTEGER, text TEXT);
             CREATE TABLE book_pages (book_id TEXT, page_number INTEGER, content_plain TEXT);",
        )
        .execute(&pool)
        .await
        .unwrap();

        for (s, a, t) in [(2, 1, "الم"), (2, 2, "ذلك الكتاب"), (2, 255, "اية الكرسي")] {
            sqlx::query("INSERT INTO ayahs VALUES (?, ?, ?)")
                .bind(s)
                .bind(a)
                .bind(t)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO hadiths VALUES ('bukhari', '1', ?)")
            .bind("نص طويل ".repeat(100))
            .execute(&pool)
            .await
            .unwrap();

        // Unreachable graph store: entity search degrades, resolution works
        let client = GraphClient::new(GraphStoreSettings {
            url: "http://127.0.0.1:1".into(),
            user_env: None,
            password_env: None,
            timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();

        GraphResolver::new(
            Arc::new(client),
            Arc::new(RelationalStore::from_pool(pool)),
        )
    }

    #[tokio::test]
    async fn test_graph_unavailable_degrades_with_zero_timing() {
        let resolver = seeded_resolver().await;
        let outcome = resolver.search_entities("موسى").await;
        assert!(outcome.degraded);
        assert!(outcome.graph.is_empty());
        assert_eq!(outcome.timing_ms, 0);
    }

    #[tokio::test]
    async fn test_resolve_quran_range_concatenates() {
        let resolver = seeded_resolver().await;
        let sref = SourceRef::parse(SourceKind::Quran, "2:1-2").unwrap();
        let resolved = resolver.resolve_sources(&[sref]).await;

        let entry = resolved.get("quran:2:1-2").expect("range resolves");
        assert_eq!(entry.text, "الم ذلك الكتاب");
        assert_eq!(entry.label_en, "Quran 2:1-2");
    }

    #[tokio::test]
    async fn test_resolve_hadith_truncates_on_char_boundary() {
        let resolver = seeded_resolver().await;
        let sref = SourceRef::parse(SourceKind::Hadith, "bukhari:1").unwrap();
        let resolved = resolver.resolve_sources(&[sref]).await;

        let entry = resolved.get("hadith:bukhari:1").expect("hadith resolves");
        assert!(entry.text.ends_with('…'));
        // Ellipsis adds one char past the budget
        assert_eq!(entry.text.chars().count(), HADITH_TRUNCATE + 1);
    }

    #[tokio::test]
    async fn test_missing_referents_are_omitted() {
        let resolver = seeded_resolver().await;
        let present = SourceRef::parse(SourceKind::Quran, "2:255").unwrap();
        let absent = SourceRef::parse(SourceKind::Quran, "99:9").unwrap();
        let resolved = resolver.resolve_sources(&[present, absent]).await;

        assert!(resolved.contains_key("quran:2:255"));
        assert!(!resolved.contains_key("quran:99:9"));
    }

    #[tokio::test]
    async fn test_mixed_kinds_resolve_concurrently() {
        let resolver = seeded_resolver().await;
        let refs = vec![
            SourceRef::parse(SourceKind::Quran, "2:255").unwrap(),
            SourceRef::parse(SourceKind::Hadith, "bukhari:1").unwrap(),
            SourceRef::parse(SourceKind::Book, "book:ihya:1").unwrap(),
        ];
        let resolved = resolver.resolve_sources(&refs).await;
        assert_eq!(resolved.len(), 2); // book page is not seeded
    }
}
