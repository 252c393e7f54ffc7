//! Knowledge-graph arena
//!
//! The entity graph is cyclic (people relate to places relate to events
//! relate back to people), so it is modeled as an arena of entities with
//! integer indices rather than owning references. Relationship edges carry
//! two indices; mentions carry one index plus a parsed Quran reference.
//! Two secondary indices (by normalized name, by source key) give O(1)
//! lookup paths into the arena.
//!
//! Per-request subgraphs returned by the graph resolver are assembled into
//! this structure; the request path treats it as read-only once built.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalize::normalize;
use crate::sourceref::{QuranRange, SourceRef};

/// Closed set of entity kinds in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Prophet,
    Person,
    Place,
    AfterlifePlace,
    DivineAttribute,
    Event,
    Concept,
    Nation,
    Angel,
    Ruling,
    Scripture,
    Object,
    TimeReference,
}

impl EntityKind {
    /// Parse the snake_case wire form used by the graph store.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prophet" => Some(Self::Prophet),
            "person" => Some(Self::Person),
            "place" => Some(Self::Place),
            "afterlife_place" => Some(Self::AfterlifePlace),
            "divine_attribute" => Some(Self::DivineAttribute),
            "event" => Some(Self::Event),
            "concept" => Some(Self::Concept),
            "nation" => Some(Self::Nation),
            "angel" => Some(Self::Angel),
            "ruling" => Some(Self::Ruling),
            "scripture" => Some(Self::Scripture),
            "object" => Some(Self::Object),
            "time_reference" => Some(Self::TimeReference),
            _ => None,
        }
    }
}

/// A named entity node.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub name_ar: String,
    pub name_en: String,
    pub description_ar: String,
    pub description_en: String,
    pub sources: Vec<SourceRef>,
}

/// A typed, directed relationship between two entities.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub rel_type: String,
    pub description: String,
    pub sources: Vec<SourceRef>,
}

/// Where an entity is mentioned in the Quran.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub role: MentionRole,
    pub context: String,
    pub ayahs: QuranRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionRole {
    Primary,
    Secondary,
    Referenced,
}

impl MentionRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "referenced" => Some(Self::Referenced),
            _ => None,
        }
    }
}

/// Arena-backed knowledge graph with secondary lookup indices.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<Entity, Relationship>,
    /// Mentions keyed by the mentioning entity's arena index
    mentions: HashMap<NodeIndex, Vec<Mention>>,
    /// Normalized Arabic/English name -> arena indices
    by_name: HashMap<String, Vec<NodeIndex>>,
    /// Source canonical key -> arena indices of entities citing it
    by_source: HashMap<String, Vec<NodeIndex>>,
    /// Stable entity id -> arena index
    by_id: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Insert an entity, updating all secondary indices. Re-inserting an
    /// existing entity id returns the existing index unchanged.
    pub fn add_entity(&mut self, entity: Entity) -> NodeIndex {
        if let Some(&idx) = self.by_id.get(&entity.id) {
            return idx;
        }

        let name_ar = normalize(&entity.name_ar);
        let name_en = entity.name_en.to_lowercase();
        let source_keys: Vec<String> =
            entity.sources.iter().map(|s| s.canonical_key()).collect();
        let id = entity.id.clone();

        let idx = self.graph.add_node(entity);
        self.by_id.insert(id, idx);
        if !name_ar.is_empty() {
            self.by_name.entry(name_ar).or_default().push(idx);
        }
        if !name_en.is_empty() {
            self.by_name.entry(name_en).or_default().push(idx);
        }
        for key in source_keys {
            self.by_source.entry(key).or_default().push(idx);
        }
        idx
    }

    /// Add a directed relationship edge between two arena indices.
    pub fn add_relationship(&mut self, from: NodeIndex, to: NodeIndex, rel: Relationship) {
        self.graph.add_edge(from, to, rel);
    }

    pub fn add_mention(&mut self, entity: NodeIndex, mention: Mention) {
        self.mentions.entry(entity).or_default().push(mention);
    }

    pub fn entity(&self, idx: NodeIndex) -> Option<&Entity> {
        self.graph.node_weight(idx)
    }

    pub fn entity_by_id(&self, id: &str) -> Option<(NodeIndex, &Entity)> {
        let idx = *self.by_id.get(id)?;
        self.graph.node_weight(idx).map(|e| (idx, e))
    }

    /// Look up entities by name; the key is normalized the same way queries
    /// are, so Arabic lookups are diacritic-insensitive.
    pub fn find_by_name(&self, name: &str) -> Vec<NodeIndex> {
        let key = normalize(name).to_lowercase();
        self.by_name.get(&key).cloned().unwrap_or_default()
    }

    /// Entities whose `sources` cite the given canonical source key.
    pub fn find_by_source(&self, canonical_key: &str) -> Vec<NodeIndex> {
        self.by_source.get(canonical_key).cloned().unwrap_or_default()
    }

    /// Outgoing 1-hop relationships from an entity.
    pub fn out_relationships(&self, idx: NodeIndex) -> Vec<(NodeIndex, &Relationship)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect()
    }

    pub fn mentions(&self, idx: NodeIndex) -> &[Mention] {
        self.mentions.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = (NodeIndex, &Entity)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx).map(|e| (idx, e)))
    }

    /// Every unique source ref cited by any entity or relationship,
    /// flattened for batch resolution.
    pub fn all_source_refs(&self) -> Vec<SourceRef> {
        let mut seen = HashMap::new();
        for (_, entity) in self.entities() {
            for sref in &entity.sources {
                seen.entry(sref.canonical_key()).or_insert_with(|| sref.clone());
            }
        }
        for edge in self.graph.edge_indices() {
            if let Some(rel) = self.graph.edge_weight(edge) {
                for sref in &rel.sources {
                    seen.entry(sref.canonical_key()).or_insert_with(|| sref.clone());
                }
            }
        }
        let mut refs: Vec<SourceRef> = seen.into_values().collect();
        refs.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourceref::SourceKind;

    fn entity(id: &str, kind: EntityKind, name_ar: &str, name_en: &str) -> Entity {
        Entity {
            id: id.to_string(),
            kind,
            name_ar: name_ar.to_string(),
            name_en: name_en.to_string(),
            description_ar: String::new(),
            description_en: String::new(),
            sources: vec![],
        }
    }

    #[test]
    fn test_add_and_find_by_name() {
        let mut kg = KnowledgeGraph::new();
        let idx = kg.add_entity(entity("musa", EntityKind::Prophet, "مُوسَى", "Musa"));

        // Diacritic-insensitive Arabic lookup
        assert_eq!(kg.find_by_name("موسى"), vec![idx]);
        // Case-insensitive English lookup
        assert_eq!(kg.find_by_name("MUSA"), vec![idx]);
        assert!(kg.find_by_name("عيسى").is_empty());
    }

    #[test]
    fn test_reinsert_same_id_is_idempotent() {
        let mut kg = KnowledgeGraph::new();
        let a = kg.add_entity(entity("musa", EntityKind::Prophet, "موسى", "Musa"));
        let b = kg.add_entity(entity("musa", EntityKind::Prophet, "موسى", "Musa"));
        assert_eq!(a, b);
        assert_eq!(kg.len(), 1);
    }

    #[test]
    fn test_cyclic_relationships_are_fine() {
        let mut kg = KnowledgeGraph::new();
        let musa = kg.add_entity(entity("musa", EntityKind::Prophet, "موسى", "Musa"));
        let firaun = kg.add_entity(entity("firaun", EntityKind::Person, "فرعون", "Pharaoh"));

        kg.add_relationship(
            musa,
            firaun,
            Relationship {
                rel_type: "confronted".into(),
                description: String::new(),
                sources: vec![],
            },
        );
        kg.add_relationship(
            firaun,
            musa,
            Relationship {
                rel_type: "pursued".into(),
                description: String::new(),
                sources: vec![],
            },
        );

        assert_eq!(kg.out_relationships(musa).len(), 1);
        assert_eq!(kg.out_relationships(firaun).len(), 1);
        assert_eq!(kg.out_relationships(musa)[0].0, firaun);
    }

    #[test]
    fn test_mentions_carry_parsed_ranges() {
        let mut kg = KnowledgeGraph::new();
        let musa = kg.add_entity(entity("musa", EntityKind::Prophet, "موسى", "Musa"));
        kg.add_mention(
            musa,
            Mention {
                role: MentionRole::Primary,
                context: "the staff and the sea".into(),
                ayahs: QuranRange::parse("26:10-68").unwrap(),
            },
        );
        assert_eq!(kg.mentions(musa).len(), 1);
        assert_eq!(kg.mentions(musa)[0].ayahs.surah, 26);
    }

    #[test]
    fn test_by_source_index_and_flatten() {
        let mut kg = KnowledgeGraph::new();
        let mut e = entity("kursi", EntityKind::DivineAttribute, "الكرسي", "The Kursi");
        e.sources = vec![SourceRef::parse(SourceKind::Quran, "2:255").unwrap()];
        let idx = kg.add_entity(e);

        assert_eq!(kg.find_by_source("quran:2:255"), vec![idx]);
        let refs = kg.all_source_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].canonical_key(), "quran:2:255");
    }

    #[test]
    fn test_entity_kind_parse_closed_set() {
        assert_eq!(EntityKind::parse("prophet"), Some(EntityKind::Prophet));
        assert_eq!(
            EntityKind::parse("afterlife_place"),
            Some(EntityKind::AfterlifePlace)
        );
        assert_eq!(EntityKind::parse("dragon"), None);
    }
}
