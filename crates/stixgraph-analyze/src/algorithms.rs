//! Structural graph algorithms: degree, BFS distances, betweenness centrality,
//! local clustering, connected components.
//!
//! All traversals are unweighted. Parallel edges are distinct shortest paths;
//! self-loops never lie on a shortest path.

use std::collections::{HashSet, VecDeque};

use crate::graph::ThreatGraph;

/// Degree of every node (self-loops count twice).
pub fn degrees(graph: &ThreatGraph) -> Vec<usize> {
    (0..graph.node_count()).map(|i| graph.degree(i)).collect()
}

/// Hop distance from `source` to every node; `None` when unreachable.
pub fn bfs_distances(graph: &ThreatGraph, source: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.node_count()];
    dist[source] = Some(0);

    let mut queue = VecDeque::new();
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        let next = dist[node].map(|d| d + 1);
        for inc in &graph.adjacency[node] {
            if dist[inc.neighbor].is_none() {
                dist[inc.neighbor] = next;
                queue.push_back(inc.neighbor);
            }
        }
    }

    dist
}

/// Shortest-path betweenness centrality (Brandes).
///
/// Endpoints are excluded. Dependencies are accumulated from every source, so
/// each unordered pair is seen twice; for `n > 2` the result is scaled by
/// `1 / ((n - 1)(n - 2))`, which maps the centre of a star to 1.0.
pub fn betweenness_centrality(graph: &ThreatGraph) -> Vec<f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut delta = vec![0.0_f64; n];
    let mut queue = VecDeque::new();

    for source in 0..n {
        stack.clear();
        for i in 0..n {
            preds[i].clear();
            sigma[i] = 0.0;
            dist[i] = None;
            delta[i] = 0.0;
        }
        sigma[source] = 1.0;
        dist[source] = Some(0);
        queue.push_back(source);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = dist[v].unwrap_or(0);
            for inc in &graph.adjacency[v] {
                let w = inc.neighbor;
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for c in &mut centrality {
            *c *= scale;
        }
    }

    centrality
}

/// Distinct neighbours of every node, self excluded.
fn neighbor_sets(graph: &ThreatGraph) -> Vec<HashSet<usize>> {
    graph
        .adjacency
        .iter()
        .enumerate()
        .map(|(i, incs)| {
            incs.iter()
                .map(|inc| inc.neighbor)
                .filter(|&j| j != i)
                .collect()
        })
        .collect()
}

/// Local clustering coefficient of every node.
///
/// Computed on the simple graph underneath the multigraph: parallel edges
/// collapse and self-loops are ignored. Nodes with fewer than two distinct
/// neighbours score 0.
pub fn clustering_coefficients(graph: &ThreatGraph) -> Vec<f64> {
    let neighbors = neighbor_sets(graph);

    neighbors
        .iter()
        .map(|set| {
            let k = set.len();
            if k < 2 {
                return 0.0;
            }
            let mut sorted: Vec<usize> = set.iter().copied().collect();
            sorted.sort_unstable();

            let mut links = 0usize;
            for (a, &u) in sorted.iter().enumerate() {
                for &w in &sorted[a + 1..] {
                    if neighbors[u].contains(&w) {
                        links += 1;
                    }
                }
            }
            (2 * links) as f64 / (k * (k - 1)) as f64
        })
        .collect()
}

/// Connected component label for every node, numbered in order of the lowest
/// node index they contain.
pub fn connected_components(graph: &ThreatGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;

    for start in 0..n {
        if label[start].is_some() {
            continue;
        }
        label[start] = Some(next);
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for inc in &graph.adjacency[v] {
                if label[inc.neighbor].is_none() {
                    label[inc.neighbor] = Some(next);
                    queue.push_back(inc.neighbor);
                }
            }
        }
        next += 1;
    }

    label.into_iter().map(|l| l.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_from;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_bfs_distances_path() {
        let graph = graph_from(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c")]);
        let dist = bfs_distances(&graph, 0);
        assert_eq!(dist, vec![Some(0), Some(1), Some(2), None]);
    }

    #[test]
    fn test_betweenness_path() {
        // a - b - c
        let graph = graph_from(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let bc = betweenness_centrality(&graph);

        assert!(bc[1] > bc[0]);
        assert!(approx(bc[0], bc[2]));
        assert!(approx(bc[0], 0.0));
        assert!(approx(bc[1], 1.0));
    }

    #[test]
    fn test_betweenness_star_and_path() {
        // Star: centre 0 with three leaves.
        let star = graph_from(
            &["c", "x", "y", "z"],
            &[("c", "x"), ("c", "y"), ("c", "z")],
        );
        let bc = betweenness_centrality(&star);
        assert!(approx(bc[0], 1.0));
        assert!(bc[1..].iter().all(|&v| approx(v, 0.0)));

        // Path of five: interior values 3/6, 4/6, 3/6 after scaling by 1/12.
        let path = graph_from(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")],
        );
        let bc = betweenness_centrality(&path);
        assert!(approx(bc[1], 0.5));
        assert!(approx(bc[2], 4.0 / 6.0));
        assert!(approx(bc[3], 0.5));
    }

    #[test]
    fn test_betweenness_parallel_paths_split() {
        // Square a-b-d, a-c-d: b and c each carry half of the a/d paths.
        let graph = graph_from(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let bc = betweenness_centrality(&graph);
        assert!(approx(bc[1], bc[2]));
        assert!(approx(bc[0], bc[3]));
        // Raw: b gets 0.5 for (a,d) in each direction = 1.0, scaled by 1/6.
        assert!(approx(bc[1], 1.0 / 6.0));
    }

    #[test]
    fn test_betweenness_ignores_self_loops() {
        let plain = graph_from(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let looped = graph_from(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("b", "b")]);
        assert_eq!(betweenness_centrality(&plain), betweenness_centrality(&looped));
    }

    #[test]
    fn test_betweenness_small_graphs() {
        assert!(betweenness_centrality(&graph_from(&[], &[])).is_empty());
        assert_eq!(betweenness_centrality(&graph_from(&["a"], &[])), vec![0.0]);
        assert_eq!(
            betweenness_centrality(&graph_from(&["a", "b"], &[("a", "b")])),
            vec![0.0, 0.0]
        );
    }

    #[test]
    fn test_clustering_triangle_with_tail() {
        // Triangle a-b-c plus c-d.
        let graph = graph_from(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d")],
        );
        let cc = clustering_coefficients(&graph);
        assert!(approx(cc[0], 1.0));
        assert!(approx(cc[1], 1.0));
        assert!(approx(cc[2], 1.0 / 3.0));
        assert!(approx(cc[3], 0.0));
    }

    #[test]
    fn test_clustering_collapses_multi_edges() {
        // Parallel edges and a self-loop do not create triangles.
        let graph = graph_from(
            &["a", "b", "c"],
            &[("a", "b"), ("a", "b"), ("a", "a"), ("a", "c")],
        );
        let cc = clustering_coefficients(&graph);
        assert!(cc.iter().all(|&v| approx(v, 0.0)));
        assert!(cc.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_connected_components() {
        let graph = graph_from(
            &["a", "b", "c", "d", "e"],
            &[("a", "c"), ("d", "e")],
        );
        assert_eq!(connected_components(&graph), vec![0, 1, 0, 2, 2]);
    }

    #[test]
    fn test_degrees_match_edge_count() {
        let graph = graph_from(&["a", "b"], &[("a", "b"), ("b", "b")]);
        let deg = degrees(&graph);
        assert_eq!(deg, vec![1, 3]);
        assert_eq!(deg.iter().sum::<usize>(), 2 * graph.edge_count());
    }
}
