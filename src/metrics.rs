//! Node centrality metrics reported alongside community membership.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rayon::prelude::*;
use serde::Serialize;

use crate::detect::Partition;
use crate::graph::{NodeId, WeightedGraph};

/// Sources handled per parallel task in [`betweenness`].
const SOURCE_CHUNK: usize = 32;

/// One row of the node metrics export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    pub node: String,
    pub degree: usize,
    pub betweenness: Option<f64>,
    pub community: Option<usize>,
    pub label: String,
    pub weighted_degree: f64,
}

/// Normalized betweenness centrality (Brandes, hop-count shortest paths).
///
/// Uses the undirected normalization `2 / ((n - 1)(n - 2))`; graphs with
/// fewer than three nodes report 0 for every node.
#[must_use]
pub fn betweenness<N: NodeId>(graph: &WeightedGraph<N>) -> HashMap<N, f64> {
    let (nodes, adjacency) = graph.adjacency();
    let n = nodes.len();

    // Fixed-size chunks summed in source order keep the result independent
    // of the thread schedule.
    let sources: Vec<usize> = (0..n).collect();
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(SOURCE_CHUNK)
        .map(|chunk| {
            let mut sum = vec![0.0; n];
            for &source in chunk {
                add_into(&mut sum, single_source_dependencies(&adjacency, source));
            }
            sum
        })
        .collect();
    let mut raw = vec![0.0; n];
    for partial in partials {
        add_into(&mut raw, partial);
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = if n > 2 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        0.0
    };
    // Each pair was counted from both endpoints, which the factor 2 of the
    // undirected normalization cancels.
    nodes
        .into_iter()
        .zip(raw)
        .map(|(node, value)| (node, value * scale))
        .collect()
}

fn add_into(total: &mut [f64], values: Vec<f64>) {
    for (total, value) in total.iter_mut().zip(values) {
        *total += value;
    }
}

fn single_source_dependencies(adjacency: &[Vec<(usize, f64)>], source: usize) -> Vec<f64> {
    let n = adjacency.len();
    let mut stack = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut distance: Vec<Option<usize>> = vec![None; n];
    sigma[source] = 1.0;
    distance[source] = Some(0);

    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        stack.push(v);
        let Some(dv) = distance[v] else { continue };
        for &(w, _) in &adjacency[v] {
            if distance[w].is_none() {
                distance[w] = Some(dv + 1);
                queue.push_back(w);
            }
            if distance[w] == Some(dv + 1) {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0; n];
    while let Some(w) = stack.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
    }
    delta[source] = 0.0;
    delta
}

/// Histogram of node degree → number of nodes, for a log-log
/// scale-free check.
#[must_use]
pub fn degree_distribution<N: NodeId>(graph: &WeightedGraph<N>) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for node in graph.nodes() {
        *histogram.entry(graph.degree(node)).or_insert(0) += 1;
    }
    histogram
}

/// Builds one metrics row per node, in graph node order.
pub fn node_metrics<N, L>(
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    betweenness: Option<&HashMap<N, f64>>,
    label: L,
) -> Vec<NodeMetrics>
where
    N: NodeId,
    L: Fn(&N) -> String,
{
    graph
        .nodes()
        .map(|node| NodeMetrics {
            node: node.to_string(),
            degree: graph.degree(node),
            betweenness: betweenness.and_then(|b| b.get(node).copied()),
            community: partition.community_of(node),
            label: label(node),
            weighted_degree: graph.weighted_degree(node),
        })
        .collect()
}
