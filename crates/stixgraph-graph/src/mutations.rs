//! Write operations for the threat knowledge graph.
//!
//! Nodes are MERGEd on their STIX id and edges on their key, so re-running an
//! export over a store that was not cleared converges instead of duplicating.

use neo4rs::query;

use crate::client::{GraphClient, GraphError};
use crate::queries::{AnalyticQuery, QueryRow};
use crate::sink::{GraphSink, SinkEdge, SinkNode};

const UPSERT_NODE: &str = "MERGE (n:MitreObject {id: $id})
     SET n.name = $name, n.type = $type,
         n.multi_stage_commonality = $multi_stage_commonality,
         n.common_impact = $common_impact";

const UPSERT_EDGE: &str = "MATCH (s:MitreObject {id: $source_id})
     MATCH (t:MitreObject {id: $target_id})
     MERGE (s)-[r:RELATES {key: $key}]->(t)
     SET r.type = $type";

fn node_query(node: &SinkNode) -> neo4rs::Query {
    query(UPSERT_NODE)
        .param("id", node.id.clone())
        .param("name", node.name.clone())
        .param("type", node.node_type.clone())
        .param("multi_stage_commonality", node.multi_stage_commonality)
        .param("common_impact", node.common_impact)
}

fn edge_query(edge: &SinkEdge) -> neo4rs::Query {
    query(UPSERT_EDGE)
        .param("source_id", edge.source_id.clone())
        .param("target_id", edge.target_id.clone())
        .param("key", edge.key.clone())
        .param("type", edge.relationship_type.clone())
}

impl GraphSink for GraphClient {
    async fn clear(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n:MitreObject) DETACH DELETE n")).await?;
        tracing::info!("Cleared previous threat graph");
        Ok(())
    }

    async fn upsert_node(&self, node: &SinkNode) -> Result<(), GraphError> {
        self.run(node_query(node)).await
    }

    async fn upsert_edge(&self, edge: &SinkEdge) -> Result<(), GraphError> {
        self.run(edge_query(edge)).await
    }

    /// Upsert all nodes in a single transaction.
    async fn upsert_nodes(&self, nodes: &[SinkNode]) -> Result<(), GraphError> {
        let mut txn = self.start_txn().await?;
        for node in nodes {
            txn.run(node_query(node)).await?;
        }
        txn.commit().await?;
        tracing::debug!(count = nodes.len(), "Upserted node batch");
        Ok(())
    }

    /// Upsert all edges in a single transaction.
    async fn upsert_edges(&self, edges: &[SinkEdge]) -> Result<(), GraphError> {
        let mut txn = self.start_txn().await?;
        for edge in edges {
            txn.run(edge_query(edge)).await?;
        }
        txn.commit().await?;
        tracing::debug!(count = edges.len(), "Upserted edge batch");
        Ok(())
    }

    async fn query(&self, query: AnalyticQuery, limit: usize) -> Result<Vec<QueryRow>, GraphError> {
        self.run_analytic(query, limit).await
    }
}
