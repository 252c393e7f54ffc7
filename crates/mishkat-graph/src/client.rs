//! Graph store client
//!
//! Read-only client for the entity graph's Cypher-over-HTTP transactional
//! endpoint. Two queries are issued per request: a full-text index lookup
//! over the Arabic and English name fields, and a 1-hop traversal pulling
//! typed relationships and ayah-group mentions for each matched entity.
//!
//! Node and edge `sources` arrive as JSON strings and are parsed by the
//! resolver, not here; this module only moves rows.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use mishkat_config::GraphStoreSettings;

use crate::error::{GraphError, Result};

/// Entity node row from the graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRow {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name_ar: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub description_ar: String,
    #[serde(default)]
    pub description_en: String,
    /// JSON string of `[{kind, ref}]` entries
    #[serde(default)]
    pub sources: String,
}

/// Outgoing relationship row: edge payload plus the target node.
#[derive(Debug, Clone)]
pub struct RelationRow {
    pub rel_type: String,
    pub description: String,
    /// JSON string of `[{kind, ref}]` entries
    pub sources: String,
    pub target: EntityRow,
}

/// Ayah-group mention row.
#[derive(Debug, Clone)]
pub struct MentionRow {
    pub role: String,
    pub context: String,
    /// Identifier parseable as a Quran reference (`S:A` or `S:A-B`)
    pub ayah_group: String,
}

#[derive(Debug, Serialize)]
struct TxRequest {
    statements: Vec<Statement>,
}

#[derive(Debug, Serialize)]
struct Statement {
    statement: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// HTTP client for the graph store.
pub struct GraphClient {
    client: Client,
    settings: GraphStoreSettings,
}

impl GraphClient {
    pub fn new(settings: GraphStoreSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| GraphError::Store(format!("HTTP client error: {e}")))?;

        Ok(Self { client, settings })
    }

    fn tx_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.settings.url.trim_end_matches('/'),
            self.settings.database
        )
    }

    fn credentials(&self) -> Option<(String, String)> {
        let user = self
            .settings
            .user_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())?;
        let password = self
            .settings
            .password_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())?;
        Some((user, password))
    }

    async fn run(&self, statement: &str, parameters: serde_json::Value) -> Result<Vec<TxRow>> {
        let body = TxRequest {
            statements: vec![Statement {
                statement: statement.to_string(),
                parameters,
            }],
        };

        let mut request = self.client.post(self.tx_url()).json(&body);
        if let Some((user, password)) = self.credentials() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GraphError::Store(format!("graph store unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphError::Store(format!(
                "transaction endpoint returned {status}: {text}"
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Store(format!("invalid response: {e}")))?;

        if let Some(err) = parsed.errors.first() {
            return Err(GraphError::Query(format!("{}: {}", err.code, err.message)));
        }

        Ok(parsed.results.into_iter().next().map(|r| r.data).unwrap_or_default())
    }

    /// Full-text lookup over entity names, both Arabic and English fields.
    ///
    /// Returns `(entity, score)` pairs in descending score order; rows whose
    /// node shape does not parse are dropped.
    pub async fn search_entities(
        &self,
        query: &str,
        limit: usize,
        score_floor: f32,
    ) -> Result<Vec<(EntityRow, f32)>> {
        let statement = "\
            CALL db.index.fulltext.queryNodes($index, $query) YIELD node, score \
            WHERE score >= $floor \
            RETURN node, score ORDER BY score DESC LIMIT $limit";

        let rows = self
            .run(
                statement,
                json!({
                    "index": self.settings.name_index,
                    "query": query,
                    "floor": score_floor,
                    "limit": limit as i64,
                }),
            )
            .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.row.into_iter();
            let (Some(node), Some(score)) = (cells.next(), cells.next()) else {
                continue;
            };
            let Some(score) = score.as_f64() else { continue };
            match serde_json::from_value::<EntityRow>(node) {
                Ok(entity) => entities.push((entity, score as f32)),
                Err(err) => debug!("dropping malformed entity node: {err}"),
            }
        }
        Ok(entities)
    }

    /// 1-hop out-edges for one entity: typed relationships and mentions.
    pub async fn neighborhood(
        &self,
        entity_id: &str,
    ) -> Result<(Vec<RelationRow>, Vec<MentionRow>)> {
        let rel_statement = "\
            MATCH (e:Entity {id: $id})-[r:RELATES_TO]->(t:Entity) \
            RETURN r.type, coalesce(r.description, ''), coalesce(r.sources, '[]'), t";
        let mention_statement = "\
            MATCH (e:Entity {id: $id})-[m:MENTIONED_IN]->(g:AyahGroup) \
            RETURN coalesce(m.role, 'referenced'), coalesce(m.context, ''), g.id";

        let params = json!({ "id": entity_id });

        let rel_rows = self.run(rel_statement, params.clone()).await?;
        let mention_rows = self.run(mention_statement, params).await?;

        let mut relationships = Vec::with_capacity(rel_rows.len());
        for row in rel_rows {
            let mut cells = row.row.into_iter();
            let (Some(rel_type), Some(description), Some(sources), Some(target)) =
                (cells.next(), cells.next(), cells.next(), cells.next())
            else {
                continue;
            };
            let Ok(target) = serde_json::from_value::<EntityRow>(target) else {
                continue;
            };
            relationships.push(RelationRow {
                rel_type: rel_type.as_str().unwrap_or_default().to_string(),
                description: description.as_str().unwrap_or_default().to_string(),
                sources: sources.as_str().unwrap_or("[]").to_string(),
                target,
            });
        }

        let mut mentions = Vec::with_capacity(mention_rows.len());
        for row in mention_rows {
            let mut cells = row.row.into_iter();
            let (Some(role), Some(context), Some(group)) =
                (cells.next(), cells.next(), cells.next())
            else {
                continue;
            };
            mentions.push(MentionRow {
                role: role.as_str().unwrap_or_default().to_string(),
                context: context.as_str().unwrap_or_default().to_string(),
                ayah_group: group.as_str().unwrap_or_default().to_string(),
            });
        }

        Ok((relationships, mentions))
    }

    /// Reachability check for the doctor command.
    pub async fn health_check(&self) -> Result<()> {
        self.run("RETURN 1", json!({})).await.map(|_| ())
    }
}
