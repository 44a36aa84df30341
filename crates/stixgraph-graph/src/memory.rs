//! In-process sink with the same semantics as the Bolt store.
//!
//! Used for dry runs and tests. Query results follow the Cypher statements in
//! [`AnalyticQuery::cypher`], tie-breaks included.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::client::GraphError;
use crate::queries::{AnalyticQuery, QueryRow};
use crate::sink::{GraphSink, SinkEdge, SinkNode};

#[derive(Debug, Default)]
struct Store {
    nodes: BTreeMap<String, SinkNode>,
    edges: BTreeMap<String, SinkEdge>,
}

/// A [`GraphSink`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    store: Mutex<Store>,
    offline: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every operation, for exercising export failures.
    pub fn offline() -> Self {
        Self {
            store: Mutex::default(),
            offline: true,
        }
    }

    /// Snapshot of stored nodes, ordered by id.
    pub fn nodes(&self) -> Vec<SinkNode> {
        self.lock().nodes.values().cloned().collect()
    }

    /// Snapshot of stored edges, ordered by key.
    pub fn edges(&self) -> Vec<SinkEdge> {
        self.lock().edges.values().cloned().collect()
    }

    pub fn node(&self, id: &str) -> Option<SinkNode> {
        self.lock().nodes.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // A poisoned lock only means a panicking test thread; the data is intact.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<(), GraphError> {
        if self.offline {
            return Err(GraphError::Unavailable("memory sink is offline".to_string()));
        }
        Ok(())
    }
}

impl GraphSink for MemorySink {
    async fn clear(&self) -> Result<(), GraphError> {
        self.check_online()?;
        let mut store = self.lock();
        store.nodes.clear();
        store.edges.clear();
        Ok(())
    }

    async fn upsert_node(&self, node: &SinkNode) -> Result<(), GraphError> {
        self.check_online()?;
        self.lock().nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn upsert_edge(&self, edge: &SinkEdge) -> Result<(), GraphError> {
        self.check_online()?;
        let mut store = self.lock();
        // MATCH semantics: an edge to a node that was never written is a no-op.
        if !store.nodes.contains_key(&edge.source_id) || !store.nodes.contains_key(&edge.target_id) {
            tracing::debug!(key = %edge.key, "Edge endpoint missing from sink, skipped");
            return Ok(());
        }
        store.edges.insert(edge.key.clone(), edge.clone());
        Ok(())
    }

    async fn query(&self, query: AnalyticQuery, limit: usize) -> Result<Vec<QueryRow>, GraphError> {
        self.check_online()?;
        let store = self.lock();

        let rows = match query {
            AnalyticQuery::TopMultiStageAttackPatterns => top_nodes(
                store.nodes.values().filter(|n| n.node_type == "attack-pattern"),
                |n| n.multi_stage_commonality,
                limit,
            ),
            AnalyticQuery::TopImpactNodes => {
                top_nodes(store.nodes.values(), |n| n.common_impact, limit)
            }
            AnalyticQuery::TopRelationshipTypes => {
                let mut counts: HashMap<&str, u64> = HashMap::new();
                for edge in store.edges.values() {
                    *counts.entry(edge.relationship_type.as_str()).or_insert(0) += 1;
                }
                let mut counted: Vec<(&str, u64)> = counts.into_iter().collect();
                counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                counted
                    .into_iter()
                    .take(limit)
                    .map(|(relationship_type, count)| QueryRow::Relationship {
                        relationship_type: relationship_type.to_string(),
                        count,
                    })
                    .collect()
            }
            AnalyticQuery::MostConnectedAttackPatterns => {
                let mut incident: HashMap<&str, u64> = HashMap::new();
                for edge in store.edges.values() {
                    *incident.entry(edge.source_id.as_str()).or_insert(0) += 1;
                    if edge.target_id != edge.source_id {
                        *incident.entry(edge.target_id.as_str()).or_insert(0) += 1;
                    }
                }
                let connected = store
                    .nodes
                    .values()
                    .filter(|n| n.node_type == "attack-pattern")
                    .filter(|n| incident.contains_key(n.id.as_str()));
                top_nodes(
                    connected,
                    |n| incident.get(n.id.as_str()).copied().unwrap_or(0) as f64,
                    limit,
                )
            }
        };

        Ok(rows)
    }
}

/// Sort by value descending then id ascending, keep `limit`.
fn top_nodes<'a>(
    nodes: impl Iterator<Item = &'a SinkNode>,
    value: impl Fn(&SinkNode) -> f64,
    limit: usize,
) -> Vec<QueryRow> {
    let mut scored: Vec<(&SinkNode, f64)> = nodes.map(|n| (n, value(n))).collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored
        .into_iter()
        .take(limit)
        .map(|(n, value)| QueryRow::Node {
            id: n.id.clone(),
            name: n.name.clone(),
            node_type: n.node_type.clone(),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: &str, msc: f64, impact: f64) -> SinkNode {
        SinkNode {
            id: id.to_string(),
            name: format!("name-{id}"),
            node_type: node_type.to_string(),
            multi_stage_commonality: msc,
            common_impact: impact,
        }
    }

    fn edge(key: &str, source: &str, target: &str, rel: &str) -> SinkEdge {
        SinkEdge {
            key: key.to_string(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            relationship_type: rel.to_string(),
        }
    }

    async fn seeded() -> MemorySink {
        let sink = MemorySink::new();
        sink.upsert_nodes(&[
            node("ap--b", "attack-pattern", 0.5, 0.2),
            node("ap--a", "attack-pattern", 0.5, 0.9),
            node("ap--c", "attack-pattern", 1.0, 0.1),
            node("mw--1", "malware", 0.0, 1.0),
        ])
        .await
        .unwrap();
        sink.upsert_edges(&[
            edge("r1", "mw--1", "ap--a", "uses"),
            edge("r2", "mw--1", "ap--b", "uses"),
            edge("r3", "ap--b", "ap--a", "subtechnique-of"),
            edge("r4", "ap--a", "ap--a", "revoked-by"),
        ])
        .await
        .unwrap();
        sink
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_id() {
        let sink = MemorySink::new();
        sink.upsert_node(&node("x", "tool", 0.1, 0.1)).await.unwrap();
        sink.upsert_node(&node("x", "tool", 0.7, 0.1)).await.unwrap();

        assert_eq!(sink.nodes().len(), 1);
        assert_eq!(sink.node("x").unwrap().multi_stage_commonality, 0.7);
    }

    #[tokio::test]
    async fn edge_with_unknown_endpoint_is_skipped() {
        let sink = MemorySink::new();
        sink.upsert_node(&node("x", "tool", 0.0, 0.0)).await.unwrap();
        sink.upsert_edge(&edge("r", "x", "missing", "uses")).await.unwrap();
        assert!(sink.edges().is_empty());
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let sink = seeded().await;
        sink.clear().await.unwrap();
        assert!(sink.nodes().is_empty());
        assert!(sink.edges().is_empty());
    }

    #[tokio::test]
    async fn top_multi_stage_breaks_ties_by_id() {
        let sink = seeded().await;
        let rows = sink
            .query(AnalyticQuery::TopMultiStageAttackPatterns, 5)
            .await
            .unwrap();
        let ids: Vec<&str> = rows
            .iter()
            .map(|r| match r {
                QueryRow::Node { id, .. } => id.as_str(),
                _ => panic!("expected node row"),
            })
            .collect();
        assert_eq!(ids, vec!["ap--c", "ap--a", "ap--b"]);
    }

    #[tokio::test]
    async fn top_impact_includes_all_types_and_limits() {
        let sink = seeded().await;
        let rows = sink.query(AnalyticQuery::TopImpactNodes, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], QueryRow::Node { id, .. } if id == "mw--1"));
        assert!(matches!(&rows[1], QueryRow::Node { id, .. } if id == "ap--a"));
    }

    #[tokio::test]
    async fn relationship_types_by_count() {
        let sink = seeded().await;
        let rows = sink
            .query(AnalyticQuery::TopRelationshipTypes, 5)
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                QueryRow::Relationship {
                    relationship_type: "uses".to_string(),
                    count: 2
                },
                QueryRow::Relationship {
                    relationship_type: "revoked-by".to_string(),
                    count: 1
                },
                QueryRow::Relationship {
                    relationship_type: "subtechnique-of".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn connectivity_counts_incident_edges() {
        let sink = seeded().await;
        let rows = sink
            .query(AnalyticQuery::MostConnectedAttackPatterns, 5)
            .await
            .unwrap();
        // ap--a: r1, r3, r4 (self-loop once). ap--b: r2, r3. ap--c has no edges.
        let expected = vec![("ap--a", 3.0), ("ap--b", 2.0)];
        let got: Vec<(&str, f64)> = rows
            .iter()
            .map(|r| match r {
                QueryRow::Node { id, value, .. } => (id.as_str(), *value),
                _ => panic!("expected node row"),
            })
            .collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn offline_sink_rejects_writes() {
        let sink = MemorySink::offline();
        let err = sink.clear().await.unwrap_err();
        assert!(matches!(err, GraphError::Unavailable(_)));
        assert!(sink.upsert_node(&node("x", "tool", 0.0, 0.0)).await.is_err());
    }
}
