//! Pairwise incident similarity graph.
//!
//! All-pairs comparison is quadratic, so it only ever runs over a bounded
//! sample of the loaded records.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;
use serde::Deserialize;

use crate::config::validate_threshold;
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use crate::record::IncidentRecord;

/// Scores how alike two incidents are. Higher is more similar.
pub trait PairScore: Sync {
    fn score(&self, a: &IncidentRecord, b: &IncidentRecord) -> f64;
}

impl<F> PairScore for F
where
    F: Fn(&IncidentRecord, &IncidentRecord) -> f64 + Sync,
{
    fn score(&self, a: &IncidentRecord, b: &IncidentRecord) -> f64 {
        self(a, b)
    }
}

/// Additive rule: each matching predicate contributes its coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityWeights {
    pub crime_type: f64,
    pub area: f64,
    pub date: f64,
    pub mo_codes: f64,
    /// Largest gap in days still counted as "close in time".
    pub day_tolerance: i64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            crime_type: 2.0,
            area: 1.0,
            date: 1.0,
            mo_codes: 2.0,
            day_tolerance: 3,
        }
    }
}

impl SimilarityWeights {
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("crime_type", self.crime_type),
            ("area", self.area),
            ("date", self.date),
            ("mo_codes", self.mo_codes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(format!(
                    "similarity weight `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        if self.day_tolerance < 0 {
            return Err(Error::config("day_tolerance must not be negative"));
        }
        Ok(())
    }
}

impl PairScore for SimilarityWeights {
    fn score(&self, a: &IncidentRecord, b: &IncidentRecord) -> f64 {
        let mut score = 0.0;
        if a.crime_type == b.crime_type {
            score += self.crime_type;
        }
        if a.area == b.area {
            score += self.area;
        }
        if (a.occurred_on - b.occurred_on).num_days().abs() <= self.day_tolerance {
            score += self.date;
        }
        if a.mo_codes == b.mo_codes {
            score += self.mo_codes;
        }
        score
    }
}

/// Which records enter the pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SamplePolicy {
    /// The first `size` records in file order.
    First { size: usize },
    /// `size` records drawn uniformly with a fixed seed, kept in file order.
    Random { size: usize, seed: u64 },
}

impl Default for SamplePolicy {
    fn default() -> Self {
        Self::First { size: 2000 }
    }
}

impl SamplePolicy {
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::First { size } | Self::Random { size, .. } => *size,
        }
    }

    /// Applies the policy. Returns every record when there are fewer than
    /// `size`.
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [IncidentRecord]) -> Vec<&'a IncidentRecord> {
        if records.len() <= self.size() {
            return records.iter().collect();
        }
        match *self {
            Self::First { size } => records.iter().take(size).collect(),
            Self::Random { size, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut picked = index::sample(&mut rng, records.len(), size).into_vec();
                picked.sort_unstable();
                picked.into_iter().map(|i| &records[i]).collect()
            }
        }
    }
}

/// Builds the similarity graph over `records`, one node per record keyed by
/// [`IncidentRecord::row`].
///
/// Pairs scoring below `threshold` are not linked; every record is still a
/// node.
///
/// # Errors
///
/// * [`Error::Config`] if `threshold` is not a positive number
pub fn build_similarity_graph<S: PairScore + ?Sized>(
    records: &[&IncidentRecord],
    scorer: &S,
    threshold: f64,
) -> Result<WeightedGraph<usize>> {
    validate_threshold(threshold)?;

    let edges: Vec<(usize, usize, f64)> = (0..records.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let a = records[i];
            records[i + 1..].iter().filter_map(move |b| {
                let score = scorer.score(a, b);
                (score >= threshold).then_some((a.row, b.row, score))
            })
        })
        .collect();

    let mut graph = WeightedGraph::new();
    for record in records {
        graph.add_node(record.row);
    }
    for (a, b, weight) in edges {
        graph.add_edge(a, b, weight);
    }

    log::info!(
        "Similarity graph: {} records, {} edges at threshold {threshold}",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(row: usize, day: u32, area: &str, crime: &str, mo: &str) -> IncidentRecord {
        IncidentRecord {
            row,
            occurred_on: NaiveDate::from_ymd_opt(2020, 6, day).unwrap(),
            area: area.to_string(),
            crime_type: crime.to_string(),
            mo_codes: mo.to_string(),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn identical_records_two_days_apart_score_six() {
        let a = record(0, 1, "Central", "BURGLARY", "0344");
        let b = record(1, 3, "Central", "BURGLARY", "0344");
        let weights = SimilarityWeights::default();
        assert!((weights.score(&a, &b) - 6.0).abs() < f64::EPSILON);

        let graph = build_similarity_graph(&[&a, &b], &weights, 3.0).unwrap();
        assert_eq!(graph.weight(&0, &1), Some(6.0));
    }

    #[test]
    fn sharing_only_area_is_below_threshold() {
        let a = record(0, 1, "Central", "BURGLARY", "0344");
        let b = record(1, 20, "Central", "VANDALISM", "0329");
        let weights = SimilarityWeights::default();
        assert!((weights.score(&a, &b) - 1.0).abs() < f64::EPSILON);

        let graph = build_similarity_graph(&[&a, &b], &weights, 3.0).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn score_equal_to_threshold_links() {
        let a = record(0, 1, "Central", "BURGLARY", "0344");
        let b = record(1, 2, "Rampart", "BURGLARY", "0329");
        let c = record(2, 20, "Harbor", "BURGLARY", "1822");
        let weights = SimilarityWeights::default();
        assert!((weights.score(&a, &b) - 3.0).abs() < f64::EPSILON);
        assert!((weights.score(&a, &c) - 2.0).abs() < f64::EPSILON);

        let graph = build_similarity_graph(&[&a, &b, &c], &weights, 3.0).unwrap();
        assert_eq!(graph.weight(&0, &1), Some(3.0));
        assert_eq!(graph.weight(&0, &2), None);
    }

    #[test]
    fn day_tolerance_is_inclusive() {
        let a = record(0, 1, "A", "X", "1");
        let b = record(1, 4, "B", "Y", "2");
        let c = record(2, 5, "B", "Y", "2");
        let weights = SimilarityWeights::default();
        assert!((weights.score(&a, &b) - 1.0).abs() < f64::EPSILON);
        assert!(weights.score(&a, &c).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let a = record(0, 1, "A", "X", "1");
        let weights = SimilarityWeights::default();
        assert!(build_similarity_graph(&[&a], &weights, 0.0).is_err());
        assert!(build_similarity_graph(&[&a], &weights, -2.0).is_err());
    }

    #[test]
    fn closures_can_score() {
        let a = record(0, 1, "A", "X", "1");
        let b = record(1, 1, "B", "X", "1");
        let same_mo = |x: &IncidentRecord, y: &IncidentRecord| {
            if x.mo_codes == y.mo_codes { 10.0 } else { 0.0 }
        };
        let graph = build_similarity_graph(&[&a, &b], &same_mo, 5.0).unwrap();
        assert_eq!(graph.weight(&0, &1), Some(10.0));
    }

    #[test]
    fn nodes_are_keyed_by_row() {
        let a = record(7, 1, "A", "X", "1");
        let b = record(42, 1, "A", "X", "1");
        let graph = build_similarity_graph(&[&a, &b], &SimilarityWeights::default(), 3.0).unwrap();
        assert_eq!(graph.nodes().copied().collect::<Vec<_>>(), vec![7, 42]);
        assert_eq!(graph.weight(&7, &42), Some(6.0));
    }

    #[test]
    fn first_policy_truncates_in_order() {
        let records: Vec<_> = (0..10).map(|i| record(i, 1, "A", "X", "1")).collect();
        let sample = SamplePolicy::First { size: 3 }.apply(&records);
        assert_eq!(sample.iter().map(|r| r.row).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn random_policy_is_seeded_and_ordered() {
        let records: Vec<_> = (0..100).map(|i| record(i, 1, "A", "X", "1")).collect();
        let policy = SamplePolicy::Random { size: 10, seed: 42 };
        let first: Vec<_> = policy.apply(&records).iter().map(|r| r.row).collect();
        let second: Vec<_> = policy.apply(&records).iter().map(|r| r.row).collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn small_inputs_are_not_sampled() {
        let records: Vec<_> = (0..3).map(|i| record(i, 1, "A", "X", "1")).collect();
        let sample = SamplePolicy::Random { size: 10, seed: 1 }.apply(&records);
        assert_eq!(sample.len(), 3);
    }
}
