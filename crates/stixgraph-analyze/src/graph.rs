//! In-memory threat graph.
//!
//! Converts classified STIX objects into an undirected multigraph held as an
//! edge list plus a per-node adjacency list. Node indices are dense, assigned
//! in input order, and only meaningful inside one analysis run.

use std::collections::HashMap;

use serde::Serialize;
use stixgraph_core::{ObjectType, ThreatObject};

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Dense index (0..N-1).
    pub index: usize,
    pub object_type: ObjectType,
    /// Original STIX id.
    pub id: String,
    pub name: String,
}

/// Edge payload. Endpoint order follows the relationship's source/target but
/// carries no meaning for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub relationship_type: String,
    /// STIX id of the relationship object, when it had one.
    pub relationship_id: Option<String>,
}

impl GraphEdge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// One edge end as seen from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incidence {
    pub neighbor: usize,
    /// Position in [`ThreatGraph::edges`].
    pub edge: usize,
}

/// Counts from graph construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Relationships whose source or target did not resolve to a node.
    pub dropped_edges: usize,
    /// Entities skipped because their id was already taken.
    pub duplicate_ids: usize,
}

/// The undirected threat multigraph.
#[derive(Debug, Clone, Default)]
pub struct ThreatGraph {
    /// All nodes, indexed by dense index.
    pub nodes: Vec<GraphNode>,
    /// All edges in insertion order.
    pub edges: Vec<GraphEdge>,
    /// `adjacency[i]` = every edge end at node `i`. A self-loop contributes two entries.
    pub adjacency: Vec<Vec<Incidence>>,
    /// STIX id → dense index. Built once during construction.
    pub node_index: HashMap<String, usize>,
}

impl ThreatGraph {
    /// Build the graph from objects in input order.
    ///
    /// Pass one allocates a node per entity; pass two adds an edge per
    /// relationship whose endpoints both resolve. Unresolved relationships are
    /// dropped and counted, never reported as errors.
    pub fn build(objects: &[ThreatObject]) -> (Self, BuildReport) {
        let mut report = BuildReport::default();
        let mut nodes = Vec::new();
        let mut node_index = HashMap::new();

        for obj in objects {
            let ThreatObject::Entity(entity) = obj else {
                continue;
            };
            if node_index.contains_key(&entity.id) {
                tracing::warn!(id = %entity.id, "Duplicate object id, keeping first occurrence");
                report.duplicate_ids += 1;
                continue;
            }
            let index = nodes.len();
            node_index.insert(entity.id.clone(), index);
            nodes.push(GraphNode {
                index,
                object_type: entity.object_type,
                id: entity.id.clone(),
                name: entity.name.clone(),
            });
        }

        let mut graph = Self {
            adjacency: vec![Vec::new(); nodes.len()],
            nodes,
            edges: Vec::new(),
            node_index,
        };

        for obj in objects {
            let ThreatObject::Relationship(rel) = obj else {
                continue;
            };
            match (graph.index_of(&rel.source_ref), graph.index_of(&rel.target_ref)) {
                (Some(source), Some(target)) => {
                    graph.add_edge(source, target, &rel.relationship_type, rel.id.clone());
                }
                _ => {
                    tracing::debug!(
                        source_ref = %rel.source_ref,
                        target_ref = %rel.target_ref,
                        relationship_type = %rel.relationship_type,
                        "Unresolved relationship endpoint, edge dropped"
                    );
                    report.dropped_edges += 1;
                }
            }
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            dropped_edges = report.dropped_edges,
            "Built threat graph"
        );

        (graph, report)
    }

    fn add_edge(
        &mut self,
        source: usize,
        target: usize,
        relationship_type: &str,
        relationship_id: Option<String>,
    ) {
        let edge = self.edges.len();
        self.edges.push(GraphEdge {
            source,
            target,
            relationship_type: relationship_type.to_string(),
            relationship_id,
        });
        self.adjacency[source].push(Incidence {
            neighbor: target,
            edge,
        });
        self.adjacency[target].push(Incidence {
            neighbor: source,
            edge,
        });
    }

    /// Dense index for a STIX id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    /// Number of edge ends at a node; self-loops count twice.
    pub fn degree(&self, index: usize) -> usize {
        self.adjacency[index].len()
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges in the graph, parallel edges and self-loops included.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use stixgraph_core::{Entity, Relationship};

    pub(crate) fn entity(object_type: ObjectType, id: &str) -> ThreatObject {
        ThreatObject::Entity(Entity {
            object_type,
            id: id.to_string(),
            name: format!("name of {id}"),
            retired: false,
        })
    }

    pub(crate) fn rel(rel_type: &str, source: &str, target: &str) -> ThreatObject {
        ThreatObject::Relationship(Relationship {
            id: None,
            relationship_type: rel_type.to_string(),
            source_ref: source.to_string(),
            target_ref: target.to_string(),
            retired: false,
        })
    }

    /// Build a graph of attack patterns named by `ids`, connected by `uses` edges.
    pub(crate) fn graph_from(ids: &[&str], edges: &[(&str, &str)]) -> ThreatGraph {
        let mut objects: Vec<ThreatObject> = ids
            .iter()
            .map(|id| entity(ObjectType::AttackPattern, id))
            .collect();
        objects.extend(edges.iter().map(|(s, t)| rel("uses", s, t)));
        ThreatGraph::build(&objects).0
    }

    #[test]
    fn test_build_basic() {
        let objects = vec![
            entity(ObjectType::IntrusionSet, "g1"),
            entity(ObjectType::AttackPattern, "t1"),
            entity(ObjectType::CourseOfAction, "m1"),
            rel("uses", "g1", "t1"),
            rel("mitigates", "m1", "t1"),
        ];

        let (graph, report) = ThreatGraph::build(&objects);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(report, BuildReport::default());
        assert_eq!(graph.degree(0), 1);
        assert_eq!(graph.degree(1), 2);
        assert_eq!(graph.edges[1].relationship_type, "mitigates");
    }

    #[test]
    fn test_indices_follow_input_order() {
        let objects = vec![
            rel("uses", "b", "a"),
            entity(ObjectType::Tool, "b"),
            entity(ObjectType::Malware, "a"),
        ];

        let (graph, _) = ThreatGraph::build(&objects);
        assert_eq!(graph.index_of("b"), Some(0));
        assert_eq!(graph.index_of("a"), Some(1));
        assert_eq!(graph.index_of("c"), None);
        // Relationships listed before their endpoints still resolve.
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_edge_with_missing_node_dropped() {
        let objects = vec![
            entity(ObjectType::AttackPattern, "t1"),
            rel("uses", "missing", "t1"),
            rel("uses", "t1", "also-missing"),
        ];

        let (graph, report) = ThreatGraph::build(&objects);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(report.dropped_edges, 2);
    }

    #[test]
    fn test_self_loop_counts_twice() {
        let graph = graph_from(&["a"], &[("a", "a")]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.degree(0), 2);
        assert!(graph.edges[0].is_self_loop());
    }

    #[test]
    fn test_parallel_edges_kept() {
        let objects = vec![
            entity(ObjectType::Malware, "m"),
            entity(ObjectType::AttackPattern, "t"),
            rel("uses", "m", "t"),
            rel("revoked-by", "m", "t"),
            rel("uses", "t", "m"),
        ];

        let (graph, _) = ThreatGraph::build(&objects);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.degree(0), 3);
        assert_eq!(graph.degree(1), 3);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let objects = vec![
            entity(ObjectType::Tool, "x"),
            entity(ObjectType::Malware, "x"),
        ];

        let (graph, report) = ThreatGraph::build(&objects);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.nodes[0].object_type, ObjectType::Tool);
        assert_eq!(report.duplicate_ids, 1);
    }

    #[test]
    fn test_empty_input() {
        let (graph, report) = ThreatGraph::build(&[]);
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(report, BuildReport::default());
    }

    #[test]
    fn test_degree_sum_is_twice_edge_count() {
        let graph = graph_from(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "b"), ("b", "c"), ("c", "c"), ("d", "a")],
        );
        let total: usize = (0..graph.node_count()).map(|i| graph.degree(i)).sum();
        assert_eq!(total, 2 * graph.edge_count());
    }
}
