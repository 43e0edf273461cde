//! Per-community aggregates over a detected partition.

use std::collections::{BTreeMap, HashMap};

use crate::detect::Partition;
use crate::graph::{NodeId, WeightedGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStats {
    pub record_count: u64,
    pub weighted_degree: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommunityStats<N: NodeId> {
    /// Sum of weights of edges with both endpoints in the community.
    pub internal_weight: f64,
    pub total_records: u64,
    /// `internal_weight / total_records`, or 0 when there are no records.
    pub ratio: f64,
    pub members: BTreeMap<N, NodeStats>,
}

/// Computes statistics for every community in `partition`, singletons
/// included.
///
/// Nodes absent from `record_counts` count as zero records. Nodes of the
/// partition that are missing from `graph` get a weighted degree of 0.
#[must_use]
pub fn analyze<N: NodeId>(
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    record_counts: &HashMap<N, u64>,
) -> BTreeMap<usize, CommunityStats<N>> {
    let mut stats: BTreeMap<usize, CommunityStats<N>> = BTreeMap::new();

    for (node, community) in partition.assignments() {
        let record_count = record_counts.get(node).copied().unwrap_or(0);
        let entry = stats.entry(community).or_insert_with(|| CommunityStats {
            internal_weight: 0.0,
            total_records: 0,
            ratio: 0.0,
            members: BTreeMap::new(),
        });
        entry.total_records += record_count;
        entry.members.insert(
            node.clone(),
            NodeStats {
                record_count,
                weighted_degree: graph.weighted_degree(node),
            },
        );
    }

    for (a, b, weight) in graph.edges() {
        if let (Some(ca), Some(cb)) = (partition.community_of(a), partition.community_of(b))
            && ca == cb
            && let Some(entry) = stats.get_mut(&ca)
        {
            entry.internal_weight += weight;
        }
    }

    for entry in stats.values_mut() {
        entry.ratio = if entry.total_records == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let records = entry.total_records as f64;
            entry.internal_weight / records
        };
    }

    stats
}

/// Sum of internal weights over all communities.
#[must_use]
pub fn total_internal_weight<N: NodeId>(stats: &BTreeMap<usize, CommunityStats<N>>) -> f64 {
    stats.values().map(|s| s.internal_weight).sum()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::detect::{DetectionConfig, detect_communities};

    fn graph() -> WeightedGraph<String> {
        let mut graph = WeightedGraph::new();
        graph.add_edge("A".to_string(), "B".to_string(), 3.0);
        graph.add_edge("B".to_string(), "C".to_string(), 2.0);
        graph.add_edge("A".to_string(), "C".to_string(), 2.0);
        graph.add_edge("X".to_string(), "Y".to_string(), 4.0);
        graph.add_edge("C".to_string(), "X".to_string(), 0.5);
        graph.add_node("Z".to_string());
        graph
    }

    fn counts(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn internal_weight_and_ratio() {
        let graph = graph();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let stats = analyze(
            &graph,
            &partition,
            &counts(&[("A", 10), ("B", 5), ("C", 5), ("X", 2), ("Y", 2), ("Z", 0)]),
        );

        let abc = &stats[&partition.community_of(&"A".to_string()).unwrap()];
        assert!((abc.internal_weight - 7.0).abs() < 1e-9);
        assert_eq!(abc.total_records, 20);
        assert!((abc.ratio - 0.35).abs() < 1e-9);

        let xy = &stats[&partition.community_of(&"X".to_string()).unwrap()];
        assert!((xy.internal_weight - 4.0).abs() < 1e-9);
        assert_eq!(xy.members.keys().cloned().collect::<Vec<_>>(), vec!["X", "Y"]);
        assert!((xy.members["X"].weighted_degree - 4.5).abs() < 1e-9);
    }

    #[test]
    fn singleton_without_records_reports_zero_ratio() {
        let graph = graph();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let stats = analyze(&graph, &partition, &HashMap::new());

        let z = &stats[&partition.community_of(&"Z".to_string()).unwrap()];
        assert_eq!(z.total_records, 0);
        assert!(z.internal_weight.abs() < f64::EPSILON);
        assert!(z.ratio.abs() < f64::EPSILON);
        assert_eq!(z.members["Z"], NodeStats { record_count: 0, weighted_degree: 0.0 });
        assert_eq!(stats.len(), partition.num_communities());
    }

    #[test]
    fn internal_weight_bounded_by_total() {
        let graph = graph();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let stats = analyze(&graph, &partition, &HashMap::new());
        let internal = total_internal_weight(&stats);
        assert!(internal <= graph.total_weight() + 1e-9);
        // Only the 0.5 bridge crosses communities.
        assert!((graph.total_weight() - internal - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_partition_yields_no_stats() {
        let graph: WeightedGraph<String> = WeightedGraph::new();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        assert!(analyze(&graph, &partition, &HashMap::new()).is_empty());
    }
}
