//! Louvain community detection.
//!
//! Greedy modularity maximisation in two repeated phases: local moving of
//! single nodes between neighbouring communities, then aggregation of each
//! community into one node. The visiting order in every local-moving pass is
//! shuffled by a seeded RNG; the same seed on the same graph always yields the
//! same partition, while different seeds may yield different (equally valid)
//! partitions.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::graph::ThreatGraph;

/// Minimum modularity gain for a pass or level to count as progress.
const MIN_GAIN: f64 = 1e-7;

/// Weighted undirected graph used between aggregation levels.
#[derive(Debug, Clone)]
struct WeightedGraph {
    /// `adj[i]` = (neighbour, weight) for neighbours other than `i`, each once.
    adj: Vec<Vec<(usize, f64)>>,
    /// Self-loop weight per node.
    loops: Vec<f64>,
    /// Weighted degree: neighbour weights plus twice the loop weight.
    strength: Vec<f64>,
    /// Total edge weight `m`.
    total: f64,
}

impl WeightedGraph {
    fn from_threat_graph(graph: &ThreatGraph) -> Self {
        let n = graph.node_count();
        let mut weights: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
        let mut loops = vec![0.0; n];

        for edge in &graph.edges {
            if edge.is_self_loop() {
                loops[edge.source] += 1.0;
            } else {
                *weights[edge.source].entry(edge.target).or_insert(0.0) += 1.0;
                *weights[edge.target].entry(edge.source).or_insert(0.0) += 1.0;
            }
        }

        Self::from_parts(weights, loops)
    }

    fn from_parts(weights: Vec<BTreeMap<usize, f64>>, loops: Vec<f64>) -> Self {
        let adj: Vec<Vec<(usize, f64)>> = weights
            .into_iter()
            .map(|m| m.into_iter().collect())
            .collect();
        let strength: Vec<f64> = adj
            .iter()
            .zip(&loops)
            .map(|(ns, l)| ns.iter().map(|(_, w)| w).sum::<f64>() + 2.0 * l)
            .collect();
        let total = strength.iter().sum::<f64>() / 2.0;

        Self {
            adj,
            loops,
            strength,
            total,
        }
    }

    fn node_count(&self) -> usize {
        self.adj.len()
    }

    /// Collapse each community into a single node.
    fn aggregate(&self, community: &[usize], count: usize) -> Self {
        let mut weights: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut loops = vec![0.0; count];

        for (i, neighbors) in self.adj.iter().enumerate() {
            let ci = community[i];
            loops[ci] += self.loops[i];
            for &(j, w) in neighbors {
                let cj = community[j];
                if ci == cj {
                    // Visited from both ends.
                    loops[ci] += w / 2.0;
                } else {
                    *weights[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }

        Self::from_parts(weights, loops)
    }
}

/// Running community totals for one level.
struct Level {
    community: Vec<usize>,
    /// Sum of member strengths per community.
    tot: Vec<f64>,
    /// Internal edge weight per community, each edge once.
    inside: Vec<f64>,
}

impl Level {
    fn singletons(graph: &WeightedGraph) -> Self {
        Self {
            community: (0..graph.node_count()).collect(),
            tot: graph.strength.clone(),
            inside: graph.loops.clone(),
        }
    }

    fn modularity(&self, total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        self.inside
            .iter()
            .zip(&self.tot)
            .map(|(&inside, &tot)| inside / total - (tot / (2.0 * total)).powi(2))
            .sum()
    }
}

/// Weight from `node` to each neighbouring community, ordered by community id.
fn neighbor_communities(graph: &WeightedGraph, level: &Level, node: usize) -> BTreeMap<usize, f64> {
    let mut out = BTreeMap::new();
    for &(j, w) in &graph.adj[node] {
        *out.entry(level.community[j]).or_insert(0.0) += w;
    }
    out
}

/// Phase one: move single nodes while modularity improves. Returns whether
/// at least one pass raised modularity by more than [`MIN_GAIN`].
fn local_moving(graph: &WeightedGraph, level: &mut Level, rng: &mut StdRng) -> bool {
    let m2 = 2.0 * graph.total;
    let mut order: Vec<usize> = (0..graph.node_count()).collect();
    let mut improved = false;
    let mut current = level.modularity(graph.total);

    loop {
        order.shuffle(rng);
        let mut moved = false;

        for &node in &order {
            let home = level.community[node];
            let k = graph.strength[node];
            let links = neighbor_communities(graph, level, node);
            let to_home = links.get(&home).copied().unwrap_or(0.0);

            level.tot[home] -= k;
            level.inside[home] -= to_home + graph.loops[node];

            let mut best = home;
            let mut best_gain = to_home - level.tot[home] * k / m2;
            for (&candidate, &w) in &links {
                let gain = w - level.tot[candidate] * k / m2;
                if gain > best_gain {
                    best = candidate;
                    best_gain = gain;
                }
            }

            let to_best = links.get(&best).copied().unwrap_or(0.0);
            level.tot[best] += k;
            level.inside[best] += to_best + graph.loops[node];
            level.community[node] = best;

            if best != home {
                moved = true;
            }
        }

        let next = level.modularity(graph.total);
        if !moved || next - current < MIN_GAIN {
            break;
        }
        improved = true;
        current = next;
    }

    improved
}

/// Relabel to contiguous ids in order of first appearance. Returns the count.
fn renumber(labels: &mut [usize]) -> usize {
    let mut map: HashMap<usize, usize> = HashMap::new();
    for label in labels.iter_mut() {
        let next = map.len();
        *label = *map.entry(*label).or_insert(next);
    }
    map.len()
}

/// Partition nodes into communities with the Louvain method.
///
/// Returns one label per node; labels are contiguous from 0 and numbered in
/// order of each community's lowest node index. A graph without edges puts
/// every node in its own community.
pub fn louvain(graph: &ThreatGraph, seed: u64) -> Vec<usize> {
    let n = graph.node_count();
    let mut partition: Vec<usize> = (0..n).collect();
    if n == 0 {
        return partition;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut level_graph = WeightedGraph::from_threat_graph(graph);
    if level_graph.total <= 0.0 {
        return partition;
    }

    let mut modularity = Level::singletons(&level_graph).modularity(level_graph.total);

    loop {
        let mut level = Level::singletons(&level_graph);
        if !local_moving(&level_graph, &mut level, &mut rng) {
            break;
        }
        let next = level.modularity(level_graph.total);
        if next - modularity < MIN_GAIN {
            break;
        }
        modularity = next;

        let mut community = level.community;
        let count = renumber(&mut community);
        for label in partition.iter_mut() {
            *label = community[*label];
        }
        if count == level_graph.node_count() {
            break;
        }
        level_graph = level_graph.aggregate(&community, count);
    }

    renumber(&mut partition);
    tracing::debug!(
        communities = partition.iter().max().map(|m| m + 1).unwrap_or(0),
        modularity,
        seed,
        "Louvain partition"
    );
    partition
}

/// Newman modularity of a partition over the multigraph.
pub fn modularity(graph: &ThreatGraph, partition: &[usize]) -> f64 {
    let weighted = WeightedGraph::from_threat_graph(graph);
    if weighted.total <= 0.0 {
        return 0.0;
    }
    let count = partition.iter().max().map(|m| m + 1).unwrap_or(0);
    let mut tot = vec![0.0; count];
    let mut inside = vec![0.0; count];

    for (i, neighbors) in weighted.adj.iter().enumerate() {
        let ci = partition[i];
        tot[ci] += weighted.strength[i];
        inside[ci] += weighted.loops[i];
        for &(j, w) in neighbors {
            if partition[j] == ci {
                inside[ci] += w / 2.0;
            }
        }
    }

    let level = Level {
        community: partition.to_vec(),
        tot,
        inside,
    };
    level.modularity(weighted.total)
}
