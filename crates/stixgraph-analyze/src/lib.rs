//! stixgraph-analyze: structural analysis of a STIX threat knowledge graph.
//!
//! Builds an undirected multigraph from classified STIX objects, computes
//! degree, Louvain communities, clustering and betweenness, derives the
//! multi-stage commonality and common impact scores, and exports the result
//! to a graph store. Data flows one way: objects → graph → metrics → scores → sink.
//!
//! The whole pipeline is single-threaded and batch-oriented. Each call to
//! [`AnalysisEngine::analyze`] rebuilds everything from scratch.

pub mod algorithms;
pub mod community;
pub mod error;
pub mod export;
pub mod graph;
pub mod scoring;
pub mod types;

pub use error::AnalyzeError;
pub use graph::{BuildReport, ThreatGraph};
pub use types::{AnalysisBundle, AnalysisReport, DerivedScores, GraphStats, StructuralMetrics};

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use stixgraph_core::config::AnalysisConfig;
use stixgraph_core::{LoadSummary, ThreatObject};
use stixgraph_graph::GraphSink;
use uuid::Uuid;

use crate::types::{ExportSummary, QueryReport};

/// Structural analysis of a graph: degree, communities, clustering, betweenness.
///
/// An empty graph yields four empty vectors.
pub fn analyze_structure(graph: &ThreatGraph, louvain_seed: u64) -> StructuralMetrics {
    StructuralMetrics {
        degrees: algorithms::degrees(graph),
        communities: community::louvain(graph, louvain_seed),
        clustering: algorithms::clustering_coefficients(graph),
        betweenness: algorithms::betweenness_centrality(graph),
    }
}

/// Multi-stage commonality and common impact for every node.
pub fn derive_scores(graph: &ThreatGraph, metrics: &StructuralMetrics) -> DerivedScores {
    DerivedScores {
        multi_stage_commonality: scoring::multi_stage_commonality(graph),
        common_impact: scoring::common_impact(graph, &metrics.betweenness),
    }
}

/// Summary statistics over a graph and its metrics.
pub fn graph_stats(graph: &ThreatGraph, build: &BuildReport, metrics: &StructuralMetrics) -> GraphStats {
    let mut node_types = BTreeMap::new();
    for node in &graph.nodes {
        *node_types.entry(node.object_type.as_str().to_string()).or_insert(0) += 1;
    }
    let mut relationship_types = BTreeMap::new();
    for edge in &graph.edges {
        *relationship_types.entry(edge.relationship_type.clone()).or_insert(0) += 1;
    }

    let components: HashSet<usize> = algorithms::connected_components(graph).into_iter().collect();
    let communities: HashSet<usize> = metrics.communities.iter().copied().collect();
    let average_clustering = if metrics.clustering.is_empty() {
        0.0
    } else {
        metrics.clustering.iter().sum::<f64>() / metrics.clustering.len() as f64
    };

    GraphStats {
        total_nodes: graph.node_count(),
        total_edges: graph.edge_count(),
        dropped_edges: build.dropped_edges,
        connected_components: components.len(),
        community_count: communities.len(),
        modularity: community::modularity(graph, &metrics.communities),
        average_clustering,
        node_types,
        relationship_types,
    }
}

/// The analysis pipeline.
pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Override the Louvain seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.louvain_seed = seed;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the in-memory pipeline: build → structure → scores → stats.
    ///
    /// Never fails: unresolved relationships are dropped and degenerate graphs
    /// score zero. Repeatable for a fixed seed.
    pub fn analyze(&self, objects: &[ThreatObject]) -> AnalysisBundle {
        let (graph, build) = ThreatGraph::build(objects);
        let metrics = analyze_structure(&graph, self.config.louvain_seed);
        let scores = derive_scores(&graph, &metrics);
        let stats = graph_stats(&graph, &build, &metrics);

        tracing::info!(
            nodes = stats.total_nodes,
            edges = stats.total_edges,
            components = stats.connected_components,
            communities = stats.community_count,
            modularity = stats.modularity,
            "Analysed threat graph"
        );

        AnalysisBundle {
            graph,
            build,
            metrics,
            scores,
            stats,
        }
    }

    /// Replace the sink's contents with the bundle.
    ///
    /// A failure here leaves the in-memory bundle untouched; the caller still
    /// owns it and may write the JSON report.
    pub async fn export<S: GraphSink>(&self, bundle: &AnalysisBundle, sink: &S) -> error::Result<ExportSummary> {
        export::export_bundle(bundle, sink).await
    }

    /// Run the canned analytical queries with the configured row limit.
    pub async fn run_queries<S: GraphSink>(&self, sink: &S) -> error::Result<Vec<QueryReport>> {
        export::run_queries(sink, self.config.report_limit).await
    }

    /// Assemble the JSON report for a run.
    pub fn report(
        &self,
        bundle: &AnalysisBundle,
        load: LoadSummary,
        exported: Option<ExportSummary>,
        queries: Vec<QueryReport>,
        computation_ms: u64,
    ) -> AnalysisReport {
        AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            louvain_seed: self.config.louvain_seed,
            computation_ms,
            load,
            stats: bundle.stats.clone(),
            export: exported,
            queries,
            nodes: export::node_reports(bundle),
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
