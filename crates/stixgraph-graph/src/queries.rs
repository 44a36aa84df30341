//! Read operations: the canned analytical queries over a loaded store.
//!
//! Every query breaks ties on a secondary ascending key (node id, or the
//! relationship type) so results are stable across runs and stores.

use neo4rs::query;
use serde::{Deserialize, Serialize};

use crate::client::{GraphClient, GraphError};

/// The four read-only reports run after a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticQuery {
    /// Attack patterns by multi-stage commonality, descending.
    TopMultiStageAttackPatterns,
    /// Any node by common impact, descending.
    TopImpactNodes,
    /// Relationship types by edge count, descending.
    TopRelationshipTypes,
    /// Attack patterns by incident edge count, descending.
    MostConnectedAttackPatterns,
}

impl AnalyticQuery {
    pub const ALL: [AnalyticQuery; 4] = [
        AnalyticQuery::TopMultiStageAttackPatterns,
        AnalyticQuery::TopImpactNodes,
        AnalyticQuery::TopRelationshipTypes,
        AnalyticQuery::MostConnectedAttackPatterns,
    ];

    /// Human-readable heading for reports.
    pub fn title(&self) -> &'static str {
        match self {
            Self::TopMultiStageAttackPatterns => "Most common multi-stage attack patterns",
            Self::TopImpactNodes => "Most impactful nodes",
            Self::TopRelationshipTypes => "Most common relationships",
            Self::MostConnectedAttackPatterns => "Attack patterns with highest connectivity",
        }
    }

    /// The Cypher statement. Takes a single `$limit` parameter.
    pub fn cypher(&self) -> &'static str {
        match self {
            Self::TopMultiStageAttackPatterns => {
                "MATCH (n:MitreObject)
                 WHERE n.type = 'attack-pattern'
                 RETURN n.id AS id, n.name AS name, n.type AS type,
                        n.multi_stage_commonality AS value
                 ORDER BY value DESC, id ASC
                 LIMIT $limit"
            }
            Self::TopImpactNodes => {
                "MATCH (n:MitreObject)
                 RETURN n.id AS id, n.name AS name, n.type AS type,
                        n.common_impact AS value
                 ORDER BY value DESC, id ASC
                 LIMIT $limit"
            }
            Self::TopRelationshipTypes => {
                "MATCH (:MitreObject)-[r:RELATES]->(:MitreObject)
                 RETURN r.type AS rel_type, count(*) AS cnt
                 ORDER BY cnt DESC, rel_type ASC
                 LIMIT $limit"
            }
            Self::MostConnectedAttackPatterns => {
                "MATCH (n:MitreObject {type: 'attack-pattern'})-[r:RELATES]-()
                 WITH n, count(DISTINCT r) AS cnt
                 RETURN n.id AS id, n.name AS name, n.type AS type, cnt
                 ORDER BY cnt DESC, id ASC
                 LIMIT $limit"
            }
        }
    }
}

/// One result row of an [`AnalyticQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum QueryRow {
    /// A node with the scored or counted value.
    Node {
        id: String,
        name: String,
        node_type: String,
        value: f64,
    },
    /// A relationship type with its edge count.
    Relationship { relationship_type: String, count: u64 },
}

impl GraphClient {
    /// Execute a canned analytical query.
    pub async fn run_analytic(
        &self,
        analytic: AnalyticQuery,
        limit: usize,
    ) -> Result<Vec<QueryRow>, GraphError> {
        let q = query(analytic.cypher()).param("limit", limit as i64);
        let rows = self.query_rows(q).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let record = match analytic {
                AnalyticQuery::TopRelationshipTypes => QueryRow::Relationship {
                    relationship_type: row.get::<String>("rel_type").unwrap_or_default(),
                    count: row.get::<i64>("cnt").unwrap_or(0).max(0) as u64,
                },
                AnalyticQuery::MostConnectedAttackPatterns => QueryRow::Node {
                    id: row_string(&row, "id")?,
                    name: row.get::<String>("name").unwrap_or_default(),
                    node_type: row.get::<String>("type").unwrap_or_default(),
                    value: row.get::<i64>("cnt").unwrap_or(0) as f64,
                },
                AnalyticQuery::TopMultiStageAttackPatterns | AnalyticQuery::TopImpactNodes => {
                    QueryRow::Node {
                        id: row_string(&row, "id")?,
                        name: row.get::<String>("name").unwrap_or_default(),
                        node_type: row.get::<String>("type").unwrap_or_default(),
                        value: row.get::<f64>("value").unwrap_or(0.0),
                    }
                }
            };
            results.push(record);
        }

        tracing::debug!(query = ?analytic, rows = results.len(), "Ran analytic query");
        Ok(results)
    }

    /// Count persisted threat-object nodes.
    pub async fn count_nodes(&self) -> Result<i64, GraphError> {
        let q = query("MATCH (n:MitreObject) RETURN count(n) AS cnt");
        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Count persisted relationship edges.
    pub async fn count_edges(&self) -> Result<i64, GraphError> {
        let q = query("MATCH (:MitreObject)-[r:RELATES]->(:MitreObject) RETURN count(r) AS cnt");
        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }
}

fn row_string(row: &neo4rs::Row, key: &str) -> Result<String, GraphError> {
    row.get::<String>(key)
        .map_err(|e| GraphError::Serialization(format!("Missing column {key}: {e}")))
}
