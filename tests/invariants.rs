use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use crime_communities::{
    DetectionConfig, IncidentRecord, Objective, PartitionKey, WeightedGraph, analyze,
    build_area_graphs, detect_communities,
};
use crime_communities::analyze::total_internal_weight;
use proptest::prelude::*;

fn graph_from(edges: &[(u8, u8, u8)], isolated: &[u8]) -> WeightedGraph<u8> {
    let mut graph = WeightedGraph::new();
    for &node in isolated {
        graph.add_node(node);
    }
    for &(a, b, w) in edges {
        graph.add_edge(a, b, f64::from(w) + 1.0);
    }
    graph
}

fn edge_strategy() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    prop::collection::vec((0u8..24, 0u8..24, 0u8..10), 0..80)
}

proptest! {
    #[test]
    fn every_node_in_exactly_one_community(
        edges in edge_strategy(),
        isolated in prop::collection::vec(0u8..30, 0..5),
        seed in any::<u64>(),
        resolution in 0.1f64..3.0,
    ) {
        let graph = graph_from(&edges, &isolated);
        let config = DetectionConfig {
            seed,
            resolution,
            objective: Objective::RbConfiguration,
            ..DetectionConfig::default()
        };
        let partition = detect_communities(&graph, &config).unwrap();

        prop_assert_eq!(partition.len(), graph.node_count());
        for node in graph.nodes() {
            let community = partition.community_of(node);
            prop_assert!(community.is_some());
            prop_assert!(community.unwrap() < partition.num_communities());
        }
        let members: usize = partition.communities().values().map(Vec::len).sum();
        prop_assert_eq!(members, graph.node_count());
    }

    #[test]
    fn internal_weight_never_exceeds_total(edges in edge_strategy(), seed in any::<u64>()) {
        let graph = graph_from(&edges, &[]);
        let config = DetectionConfig { seed, ..DetectionConfig::default() };
        let partition = detect_communities(&graph, &config).unwrap();
        let stats = analyze(&graph, &partition, &HashMap::new());

        let internal = total_internal_weight(&stats);
        prop_assert!(internal <= graph.total_weight() + 1e-9);
        prop_assert_eq!(stats.len(), partition.num_communities());
    }

    #[test]
    fn detection_is_deterministic(edges in edge_strategy(), seed in any::<u64>()) {
        let graph = graph_from(&edges, &[]);
        let config = DetectionConfig { seed, ..DetectionConfig::default() };
        let first = detect_communities(&graph, &config).unwrap();
        let second = detect_communities(&graph, &config).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn aggregation_is_idempotent(
        rows in prop::collection::vec((0i32..3, 1u32..5, 0usize..6, 0usize..3, 0usize..3), 0..60),
        by_day in any::<bool>(),
    ) {
        let areas = ["A", "B", "C", "D", "E", "F"];
        let records: Vec<_> = rows
            .iter()
            .enumerate()
            .map(|(row, &(year, day, area, crime, mo))| IncidentRecord {
                row,
                occurred_on: NaiveDate::from_ymd_opt(2019 + year, 1, day).unwrap(),
                area: areas[area].to_string(),
                crime_type: format!("crime {crime}"),
                mo_codes: format!("{mo:04}"),
                latitude: None,
                longitude: None,
            })
            .collect();

        let weights = |key: PartitionKey| {
            build_area_graphs(&records, key, by_day)
                .graphs
                .into_iter()
                .map(|(bucket, graph)| {
                    let edges: BTreeMap<(String, String), u64> = graph
                        .edges()
                        .map(|(a, b, w)| ((a.clone(), b.clone()), w.to_bits()))
                        .collect();
                    (bucket, edges)
                })
                .collect::<BTreeMap<_, _>>()
        };
        prop_assert_eq!(weights(PartitionKey::Year), weights(PartitionKey::Year));
        prop_assert_eq!(weights(PartitionKey::None), weights(PartitionKey::None));
    }
}
