//! Result types for analysis runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stixgraph_core::LoadSummary;
use stixgraph_graph::{AnalyticQuery, QueryRow};

use crate::graph::{BuildReport, ThreatGraph};

/// Structural metrics, indexed by node index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub degrees: Vec<usize>,
    /// Louvain community label per node (contiguous from 0).
    pub communities: Vec<usize>,
    pub clustering: Vec<f64>,
    pub betweenness: Vec<f64>,
}

/// Derived scores, indexed by node index. Both in `[0.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedScores {
    pub multi_stage_commonality: Vec<f64>,
    pub common_impact: Vec<f64>,
}

/// Summary statistics about the threat graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub dropped_edges: usize,
    pub connected_components: usize,
    pub community_count: usize,
    pub modularity: f64,
    pub average_clustering: f64,
    /// Node count per STIX type.
    pub node_types: BTreeMap<String, usize>,
    /// Edge count per relationship type.
    pub relationship_types: BTreeMap<String, usize>,
}

/// Everything one run computes in memory.
#[derive(Debug, Clone)]
pub struct AnalysisBundle {
    pub graph: ThreatGraph,
    pub build: BuildReport,
    pub metrics: StructuralMetrics,
    pub scores: DerivedScores,
    pub stats: GraphStats,
}

/// Per-node row of the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub name: String,
    pub node_type: String,
    pub degree: usize,
    pub community: usize,
    pub clustering: f64,
    pub betweenness: f64,
    pub multi_stage_commonality: f64,
    pub common_impact: f64,
}

/// Result of one canned analytical query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub query: AnalyticQuery,
    pub title: String,
    pub rows: Vec<QueryRow>,
}

/// Counts from the export stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub nodes_written: usize,
    pub edges_written: usize,
}

/// The complete report written by `--output`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub louvain_seed: u64,
    pub computation_ms: u64,
    pub load: LoadSummary,
    pub stats: GraphStats,
    pub export: Option<ExportSummary>,
    pub queries: Vec<QueryReport>,
    pub nodes: Vec<NodeReport>,
}
