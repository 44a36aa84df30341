//! Export stage: push an analysed graph into a sink and read reports back.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use stixgraph_graph::{AnalyticQuery, GraphSink, SinkEdge, SinkNode};

use crate::error::Result;
use crate::types::{AnalysisBundle, AnalysisReport, ExportSummary, NodeReport, QueryReport};

/// Sink records for every node, in node index order.
pub fn sink_nodes(bundle: &AnalysisBundle) -> Vec<SinkNode> {
    bundle
        .graph
        .nodes
        .iter()
        .map(|node| SinkNode {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.object_type.as_str().to_string(),
            multi_stage_commonality: bundle.scores.multi_stage_commonality[node.index],
            common_impact: bundle.scores.common_impact[node.index],
        })
        .collect()
}

/// Sink records for every edge, in insertion order.
///
/// Each edge is keyed by its relationship's STIX id. Edges without one, or
/// whose id was already used, get `source|type|target` with a `#n` suffix
/// when needed to stay unique.
pub fn sink_edges(bundle: &AnalysisBundle) -> Vec<SinkEdge> {
    let graph = &bundle.graph;
    let mut used: HashSet<String> = HashSet::with_capacity(graph.edge_count());

    graph
        .edges
        .iter()
        .map(|edge| {
            let source_id = &graph.nodes[edge.source].id;
            let target_id = &graph.nodes[edge.target].id;

            let key = match &edge.relationship_id {
                Some(id) if !used.contains(id) => id.clone(),
                _ => {
                    let base = format!("{source_id}|{}|{target_id}", edge.relationship_type);
                    let mut candidate = base.clone();
                    let mut n = 1;
                    while used.contains(&candidate) {
                        candidate = format!("{base}#{n}");
                        n += 1;
                    }
                    candidate
                }
            };
            used.insert(key.clone());

            SinkEdge {
                key,
                source_id: source_id.clone(),
                target_id: target_id.clone(),
                relationship_type: edge.relationship_type.clone(),
            }
        })
        .collect()
}

/// Replace the sink's contents with the bundle: clear, then all nodes, then all edges.
pub async fn export_bundle<S: GraphSink>(bundle: &AnalysisBundle, sink: &S) -> Result<ExportSummary> {
    let nodes = sink_nodes(bundle);
    let edges = sink_edges(bundle);

    sink.clear().await?;
    sink.upsert_nodes(&nodes).await?;
    sink.upsert_edges(&edges).await?;

    tracing::info!(nodes = nodes.len(), edges = edges.len(), "Exported threat graph");
    Ok(ExportSummary {
        nodes_written: nodes.len(),
        edges_written: edges.len(),
    })
}

/// Run every canned analytical query against the sink.
pub async fn run_queries<S: GraphSink>(sink: &S, limit: usize) -> Result<Vec<QueryReport>> {
    let mut reports = Vec::with_capacity(AnalyticQuery::ALL.len());
    for query in AnalyticQuery::ALL {
        let rows = sink.query(query, limit).await?;
        reports.push(QueryReport {
            query,
            title: query.title().to_string(),
            rows,
        });
    }
    Ok(reports)
}

/// Per-node report rows, in node index order.
pub fn node_reports(bundle: &AnalysisBundle) -> Vec<NodeReport> {
    let metrics = &bundle.metrics;
    let scores = &bundle.scores;
    bundle
        .graph
        .nodes
        .iter()
        .map(|node| {
            let i = node.index;
            NodeReport {
                id: node.id.clone(),
                name: node.name.clone(),
                node_type: node.object_type.as_str().to_string(),
                degree: metrics.degrees[i],
                community: metrics.communities[i],
                clustering: metrics.clustering[i],
                betweenness: metrics.betweenness[i],
                multi_stage_commonality: scores.multi_stage_commonality[i],
                common_impact: scores.common_impact[i],
            }
        })
        .collect()
}

/// Write the report as pretty-printed JSON.
pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    tracing::info!(path = %path.display(), "Wrote analysis report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{entity, rel};
    use crate::AnalysisEngine;
    use stixgraph_core::{config::AnalysisConfig, ObjectType, Relationship, ThreatObject};

    fn rel_with_id(id: &str, source: &str, target: &str) -> ThreatObject {
        ThreatObject::Relationship(Relationship {
            id: Some(id.to_string()),
            relationship_type: "uses".to_string(),
            source_ref: source.to_string(),
            target_ref: target.to_string(),
            retired: false,
        })
    }

    #[test]
    fn test_edge_keys_unique() {
        let objects = vec![
            entity(ObjectType::Malware, "m"),
            entity(ObjectType::AttackPattern, "t"),
            rel_with_id("relationship--1", "m", "t"),
            rel_with_id("relationship--1", "m", "t"),
            rel("uses", "m", "t"),
            rel("uses", "m", "t"),
        ];
        let bundle = AnalysisEngine::new(AnalysisConfig::default()).analyze(&objects);
        let keys: Vec<String> = sink_edges(&bundle).into_iter().map(|e| e.key).collect();

        assert_eq!(
            keys,
            vec![
                "relationship--1".to_string(),
                "m|uses|t".to_string(),
                "m|uses|t#1".to_string(),
                "m|uses|t#2".to_string(),
            ]
        );
    }

    #[test]
    fn test_sink_nodes_use_stix_ids() {
        let objects = vec![
            entity(ObjectType::Tool, "tool--1"),
            entity(ObjectType::IntrusionSet, "intrusion-set--1"),
            rel("uses", "intrusion-set--1", "tool--1"),
        ];
        let bundle = AnalysisEngine::new(AnalysisConfig::default()).analyze(&objects);
        let nodes = sink_nodes(&bundle);

        assert_eq!(nodes[0].id, "tool--1");
        assert_eq!(nodes[0].node_type, "tool");
        assert_eq!(nodes[1].id, "intrusion-set--1");
        assert_eq!(nodes[1].node_type, "intrusion-set");
    }

    #[test]
    fn test_write_report_creates_parent_dirs() {
        let bundle = AnalysisEngine::new(AnalysisConfig::default()).analyze(&[]);
        let report = AnalysisEngine::new(AnalysisConfig::default()).report(
            &bundle,
            Default::default(),
            None,
            Vec::new(),
            0,
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        write_report(&report, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(written["stats"]["total_nodes"], 0);
        assert!(written["nodes"].as_array().unwrap().is_empty());
    }
}
