//! The sink contract and the records it persists.

use serde::{Deserialize, Serialize};

use crate::client::GraphError;
use crate::queries::{AnalyticQuery, QueryRow};

/// Label shared by every persisted threat object.
pub const NODE_LABEL: &str = "MitreObject";

/// Relationship type shared by every persisted edge; the STIX
/// relationship type lives in the `type` property.
pub const EDGE_LABEL: &str = "RELATES";

/// A threat object with its derived scores, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkNode {
    /// STIX id. The only key the store ever sees.
    pub id: String,
    pub name: String,
    /// STIX type string (`attack-pattern`, `tool`, ...).
    pub node_type: String,
    pub multi_stage_commonality: f64,
    pub common_impact: f64,
}

/// A resolved relationship, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkEdge {
    /// Stable edge key: the relationship's STIX id, or a key derived from
    /// its endpoints and type when the source object had none.
    pub key: String,
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
}

/// An external store that receives the analysed graph.
///
/// Implementations must treat `upsert_*` as idempotent on the record key so a
/// retried export does not duplicate data.
#[allow(async_fn_in_trait)]
pub trait GraphSink {
    /// Remove everything a previous run wrote.
    async fn clear(&self) -> Result<(), GraphError>;

    async fn upsert_node(&self, node: &SinkNode) -> Result<(), GraphError>;

    /// Connect two previously upserted nodes by id.
    async fn upsert_edge(&self, edge: &SinkEdge) -> Result<(), GraphError>;

    /// Upsert a batch of nodes. Stores with transactions override this.
    async fn upsert_nodes(&self, nodes: &[SinkNode]) -> Result<(), GraphError> {
        for node in nodes {
            self.upsert_node(node).await?;
        }
        Ok(())
    }

    /// Upsert a batch of edges.
    async fn upsert_edges(&self, edges: &[SinkEdge]) -> Result<(), GraphError> {
        for edge in edges {
            self.upsert_edge(edge).await?;
        }
        Ok(())
    }

    /// Run one of the canned analytical queries, returning at most `limit` rows.
    async fn query(&self, query: AnalyticQuery, limit: usize) -> Result<Vec<QueryRow>, GraphError>;
}
