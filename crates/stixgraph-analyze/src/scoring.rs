//! Derived per-node scores.
//!
//! - Multi-stage commonality: how often a node is one end of a shortest path
//!   of two or more hops, normalized by the busiest node.
//! - Common impact: mean of max-normalized betweenness and max-normalized degree.
//!
//! Both land in `[0.0, 1.0]`. Every normalization goes through
//! [`normalize_by_max`], which maps all values to 0 when the maximum is 0.

use crate::algorithms::{bfs_distances, degrees};
use crate::graph::ThreatGraph;

/// Divide every value by the maximum.
///
/// Returns all zeros when the slice is empty or the maximum is not positive
/// (no node has anything to normalize against).
pub fn normalize_by_max(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v / max).clamp(0.0, 1.0)).collect()
}

/// Raw multi-stage participation per node.
///
/// For every unordered pair `{s, t}` whose shortest path is finite and longer
/// than one hop, both `s` and `t` gain 1. Adjacent pairs, a node paired with
/// itself, and unreachable pairs contribute nothing.
pub fn multi_stage_counts(graph: &ThreatGraph) -> Vec<u64> {
    let n = graph.node_count();
    let mut counts = vec![0u64; n];

    for source in 0..n {
        let dist = bfs_distances(graph, source);
        for (target, d) in dist.iter().enumerate().skip(source + 1) {
            if matches!(d, Some(hops) if *hops > 1) {
                counts[source] += 1;
                counts[target] += 1;
            }
        }
    }

    counts
}

/// Multi-stage attack commonality in `[0.0, 1.0]`.
///
/// The node(s) with the highest raw count score 1.0. A graph in which no pair
/// is two or more hops apart scores all zeros.
pub fn multi_stage_commonality(graph: &ThreatGraph) -> Vec<f64> {
    let counts: Vec<f64> = multi_stage_counts(graph)
        .into_iter()
        .map(|c| c as f64)
        .collect();
    normalize_by_max(&counts)
}

/// Blend normalized betweenness and normalized degree.
pub fn blend_impact(betweenness: &[f64], degrees: &[usize]) -> Vec<f64> {
    let degrees: Vec<f64> = degrees.iter().map(|&d| d as f64).collect();
    normalize_by_max(betweenness)
        .into_iter()
        .zip(normalize_by_max(&degrees))
        .map(|(b, d)| (b + d) / 2.0)
        .collect()
}

/// Common impact in `[0.0, 1.0]`, using the graph's own degree sequence.
pub fn common_impact(graph: &ThreatGraph, betweenness: &[f64]) -> Vec<f64> {
    blend_impact(betweenness, &degrees(graph))
}
