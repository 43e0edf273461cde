//! Weighted undirected simple graph keyed by node id.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// Trait alias for anything usable as a node id (area names, record rows).
pub trait NodeId: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync {}

impl<T: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync> NodeId for T {}

/// Undirected graph without self-loops whose parallel insertions accumulate
/// into a single weighted edge.
///
/// Node indices follow insertion order, so callers that insert in a sorted
/// order get a reproducible graph.
#[derive(Debug, Clone)]
pub struct WeightedGraph<N: NodeId> {
    graph: UnGraph<N, f64>,
    indices: HashMap<N, NodeIndex>,
}

impl<N: NodeId> Default for WeightedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NodeId> WeightedGraph<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
            indices: HashMap::new(),
        }
    }

    /// Declares a node, returning its index. Existing nodes are left alone.
    pub fn add_node(&mut self, node: N) -> NodeIndex {
        if let Some(&index) = self.indices.get(&node) {
            return index;
        }
        let index = self.graph.add_node(node.clone());
        self.indices.insert(node, index);
        index
    }

    /// Adds `weight` to the edge between `a` and `b`, creating both endpoints
    /// and the edge if needed. Self-loops are ignored.
    pub fn add_edge(&mut self, a: N, b: N, weight: f64) {
        if a == b {
            return;
        }
        let a = self.add_node(a);
        let b = self.add_node(b);
        if let Some(edge) = self.graph.find_edge(a, b) {
            self.graph[edge] += weight;
        } else {
            self.graph.add_edge(a, b, weight);
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &N> + '_ {
        self.graph.node_indices().map(move |index| &self.graph[index])
    }

    /// Every edge once, as `(a, b, weight)`.
    pub fn edges(&self) -> impl Iterator<Item = (&N, &N, f64)> + '_ {
        self.graph.edge_references().map(move |edge| {
            (
                &self.graph[edge.source()],
                &self.graph[edge.target()],
                *edge.weight(),
            )
        })
    }

    /// Weight of the edge between `a` and `b`, if any.
    #[must_use]
    pub fn weight(&self, a: &N, b: &N) -> Option<f64> {
        let a = *self.indices.get(a)?;
        let b = *self.indices.get(b)?;
        self.graph.find_edge(a, b).map(|edge| self.graph[edge])
    }

    /// Sum of incident edge weights; 0 for isolated or unknown nodes.
    #[must_use]
    pub fn weighted_degree(&self, node: &N) -> f64 {
        self.indices.get(node).map_or(0.0, |&index| {
            self.graph.edges(index).map(|edge| *edge.weight()).sum()
        })
    }

    /// Number of distinct neighbours.
    #[must_use]
    pub fn degree(&self, node: &N) -> usize {
        self.indices
            .get(node)
            .map_or(0, |&index| self.graph.neighbors(index).count())
    }

    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.graph.edge_weights().sum()
    }

    /// Dense adjacency view: `(nodes, neighbour lists by position)`.
    ///
    /// Positions match [`WeightedGraph::nodes`] order.
    #[must_use]
    pub fn adjacency(&self) -> (Vec<N>, Vec<Vec<(usize, f64)>>) {
        let nodes: Vec<N> = self.nodes().cloned().collect();
        let adjacency = self
            .graph
            .node_indices()
            .map(|index| {
                self.graph
                    .edges(index)
                    .map(|edge| {
                        let other = if edge.source() == index {
                            edge.target()
                        } else {
                            edge.source()
                        };
                        (other.index(), *edge.weight())
                    })
                    .collect()
            })
            .collect();
        (nodes, adjacency)
    }

    /// The underlying petgraph graph, for export.
    #[must_use]
    pub const fn inner(&self) -> &UnGraph<N, f64> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_pairs_accumulate_in_either_order() {
        let mut graph = WeightedGraph::new();
        graph.add_edge("a", "b", 1.0);
        graph.add_edge("b", "a", 2.0);
        graph.add_edge("a", "c", 1.0);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.weight(&"a", &"b"), Some(3.0));
        assert_eq!(graph.weight(&"b", &"a"), Some(3.0));
        assert!((graph.weighted_degree(&"a") - 4.0).abs() < f64::EPSILON);
        assert_eq!(graph.degree(&"a"), 2);
        assert!((graph.total_weight() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn self_loops_are_dropped() {
        let mut graph = WeightedGraph::new();
        graph.add_edge("a", "a", 5.0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn isolated_nodes_have_zero_degree() {
        let mut graph = WeightedGraph::new();
        graph.add_node("lonely");
        assert_eq!(graph.node_count(), 1);
        assert!(graph.weighted_degree(&"lonely").abs() < f64::EPSILON);
        assert!(graph.weighted_degree(&"absent").abs() < f64::EPSILON);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mut graph = WeightedGraph::new();
        graph.add_edge("x", "y", 2.0);
        graph.add_node("z");
        let (nodes, adjacency) = graph.adjacency();
        assert_eq!(nodes, vec!["x", "y", "z"]);
        assert_eq!(adjacency[0], vec![(1, 2.0)]);
        assert_eq!(adjacency[1], vec![(0, 2.0)]);
        assert!(adjacency[2].is_empty());
    }
}
