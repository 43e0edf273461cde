//! Area co-occurrence graphs.
//!
//! Incidents sharing a modus-operandi code and crime type (and optionally
//! the calendar day) form a group. Each group links every pair of distinct
//! areas in it once, so an edge weight counts shared groups.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Deserialize;

use crate::graph::WeightedGraph;
use crate::record::IncidentRecord;

/// How incidents are split into separate graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKey {
    /// A single graph over the whole dataset.
    None,
    /// One graph per calendar year plus the whole-dataset graph.
    #[default]
    Year,
}

/// Identifies one produced graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Year(i32),
    Total,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Total => write!(f, "total"),
        }
    }
}

/// Incident counts per bucket and area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordCountIndex {
    counts: BTreeMap<Bucket, HashMap<String, u64>>,
}

impl RecordCountIndex {
    fn increment(&mut self, bucket: Bucket, area: &str) {
        *self
            .counts
            .entry(bucket)
            .or_default()
            .entry(area.to_string())
            .or_insert(0) += 1;
    }

    /// Count for `area` in `bucket`; 0 when never seen.
    #[must_use]
    pub fn count(&self, bucket: Bucket, area: &str) -> u64 {
        self.counts
            .get(&bucket)
            .and_then(|areas| areas.get(area))
            .copied()
            .unwrap_or(0)
    }

    /// All area counts for a bucket, for the analyzer.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> HashMap<String, u64> {
        self.counts.get(&bucket).cloned().unwrap_or_default()
    }
}

/// Output of [`build_area_graphs`].
#[derive(Debug, Clone)]
pub struct AreaGraphs {
    pub graphs: BTreeMap<Bucket, WeightedGraph<String>>,
    pub counts: RecordCountIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey<'a> {
    mo_codes: &'a str,
    crime_type: &'a str,
    day: Option<NaiveDate>,
}

/// Builds one area graph per bucket and the record-count index.
///
/// With [`PartitionKey::Year`] the result holds one graph per calendar year
/// present plus [`Bucket::Total`]; with [`PartitionKey::None`] only the
/// total graph. Every area seen in a bucket is a node of that bucket's
/// graph, linked or not.
#[must_use]
pub fn build_area_graphs(
    records: &[IncidentRecord],
    partition: PartitionKey,
    group_by_day: bool,
) -> AreaGraphs {
    let mut counts = RecordCountIndex::default();
    let mut buckets: BTreeMap<Bucket, Vec<&IncidentRecord>> = BTreeMap::new();

    for record in records {
        counts.increment(Bucket::Total, &record.area);
        buckets.entry(Bucket::Total).or_default().push(record);
        if partition == PartitionKey::Year {
            let year = Bucket::Year(record.occurred_on.year());
            counts.increment(year, &record.area);
            buckets.entry(year).or_default().push(record);
        }
    }

    let graphs = buckets
        .into_iter()
        .map(|(bucket, records)| {
            let graph = build_bucket_graph(&records, group_by_day);
            log::info!(
                "Area graph {bucket}: {} records, {} areas, {} edges",
                records.len(),
                graph.node_count(),
                graph.edge_count()
            );
            (bucket, graph)
        })
        .collect();

    AreaGraphs { graphs, counts }
}

fn build_bucket_graph(records: &[&IncidentRecord], group_by_day: bool) -> WeightedGraph<String> {
    let mut groups: HashMap<GroupKey<'_>, BTreeSet<&str>> = HashMap::new();
    for record in records {
        let key = GroupKey {
            mo_codes: &record.mo_codes,
            crime_type: &record.crime_type,
            day: group_by_day.then_some(record.occurred_on),
        };
        groups.entry(key).or_default().insert(&record.area);
    }
    log::debug!("{} co-occurrence groups", groups.len());

    // Pair counts per group are independent; sum them in parallel.
    let pair_weights = groups
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<(&str, &str), u64>, (_, areas)| {
            let areas: Vec<&str> = areas.iter().copied().collect();
            for (i, a) in areas.iter().enumerate() {
                for b in &areas[i + 1..] {
                    *acc.entry((*a, *b)).or_insert(0) += 1;
                }
            }
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (pair, weight) in right {
                *left.entry(pair).or_insert(0) += weight;
            }
            left
        });

    let mut graph = WeightedGraph::new();
    let areas: BTreeSet<&str> = records.iter().map(|r| r.area.as_str()).collect();
    for area in areas {
        graph.add_node(area.to_string());
    }
    let mut pairs: Vec<_> = pair_weights.into_iter().collect();
    pairs.sort_unstable();
    for ((a, b), weight) in pairs {
        #[allow(clippy::cast_precision_loss)]
        graph.add_edge(a.to_string(), b.to_string(), weight as f64);
    }
    graph
}
