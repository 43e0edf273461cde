//! Seeded Louvain community detection.
//!
//! Optimizes the Reichardt–Bornholdt configuration objective
//!
//! ```text
//! Q = Σ_c [ L_c / m − γ · (K_c / 2m)² ]
//! ```
//!
//! where `L_c` is the weight inside community `c`, `K_c` the summed
//! weighted degree of its members and `m` the total edge weight. Plain
//! modularity is the `γ = 1` case.

use std::collections::{BTreeMap, HashMap};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};

/// Objective maximized by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Newman modularity; the configured resolution is ignored.
    #[default]
    Modularity,
    /// Resolution-parameterized configuration model.
    RbConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    pub resolution: f64,
    pub seed: u64,
    pub objective: Objective,
    /// Minimum gain for a move to count as an improvement.
    pub tolerance: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            seed: 42,
            objective: Objective::Modularity,
            tolerance: 1e-7,
        }
    }
}

impl DetectionConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(Error::config(format!(
                "resolution must be a positive number, got {}",
                self.resolution
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Resolution actually used by the objective.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        match self.objective {
            Objective::Modularity => 1.0,
            Objective::RbConfiguration => self.resolution,
        }
    }
}

/// Node → community assignment. Community ids are `0..num_communities`,
/// numbered by first appearance in graph node order.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<N: NodeId> {
    assignment: HashMap<N, usize>,
    num_communities: usize,
    quality: f64,
}

impl<N: NodeId> Partition<N> {
    #[must_use]
    pub fn community_of(&self, node: &N) -> Option<usize> {
        self.assignment.get(node).copied()
    }

    #[must_use]
    pub const fn num_communities(&self) -> usize {
        self.num_communities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Objective value of this partition at the resolution it was found with.
    #[must_use]
    pub const fn quality(&self) -> f64 {
        self.quality
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&N, usize)> + '_ {
        self.assignment.iter().map(|(node, &community)| (node, community))
    }

    /// Members of each community, sorted.
    #[must_use]
    pub fn communities(&self) -> BTreeMap<usize, Vec<N>> {
        let mut communities: BTreeMap<usize, Vec<N>> = BTreeMap::new();
        for (node, &community) in &self.assignment {
            communities.entry(community).or_default().push(node.clone());
        }
        for members in communities.values_mut() {
            members.sort();
        }
        communities
    }
}

/// Partitions `graph` into communities.
///
/// Deterministic for a given graph, configuration and seed. Isolated nodes
/// end up as singleton communities.
///
/// # Errors
///
/// * [`Error::Config`] if the resolution or tolerance is invalid
pub fn detect_communities<N: NodeId>(
    graph: &WeightedGraph<N>,
    config: &DetectionConfig,
) -> Result<Partition<N>> {
    config.validate()?;
    let gamma = config.gamma();
    let (nodes, adjacency) = graph.adjacency();

    let mut level = Level::new(adjacency);
    let mut membership: Vec<usize> = (0..nodes.len()).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);

    if level.m2 > 0.0 {
        let mut depth = 0;
        loop {
            let moved = level.local_moving(gamma, config.tolerance, &mut rng);
            if !moved {
                break;
            }
            let (next, node_to_next) = level.aggregate();
            for node in &mut membership {
                *node = node_to_next[*node];
            }
            depth += 1;
            log::debug!("Louvain level {depth}: {} communities", next.len());
            level = next;
        }
    }

    let quality = quality(graph, &nodes, &membership, gamma);
    let mut renumber = HashMap::new();
    let assignment: HashMap<N, usize> = nodes
        .into_iter()
        .zip(membership)
        .map(|(node, community)| {
            let next = renumber.len();
            (node, *renumber.entry(community).or_insert(next))
        })
        .collect();

    log::info!(
        "Detected {} communities over {} nodes (quality {quality:.4})",
        renumber.len(),
        assignment.len()
    );
    Ok(Partition {
        assignment,
        num_communities: renumber.len(),
        quality,
    })
}

/// Evaluates the objective for an arbitrary assignment given by position.
fn quality<N: NodeId>(
    graph: &WeightedGraph<N>,
    nodes: &[N],
    membership: &[usize],
    gamma: f64,
) -> f64 {
    let m = graph.total_weight();
    if m <= 0.0 {
        return 0.0;
    }
    let position: HashMap<&N, usize> = nodes.iter().enumerate().map(|(i, n)| (n, i)).collect();
    // Indexed by community so the sums run in a fixed order.
    let mut internal = vec![0.0; nodes.len()];
    let mut degree = vec![0.0; nodes.len()];
    for (a, b, weight) in graph.edges() {
        let ca = membership[position[a]];
        let cb = membership[position[b]];
        if ca == cb {
            internal[ca] += weight;
        }
        degree[ca] += weight;
        degree[cb] += weight;
    }
    let internal: f64 = internal.iter().sum();
    let expected: f64 = degree.iter().map(|k| (k / (2.0 * m)).powi(2)).sum();
    internal / m - gamma * expected
}

/// One coarsening level: a weighted graph whose nodes are the communities
/// of the level below.
struct Level {
    /// Neighbours by position, excluding self-loops.
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Weighted degree including collapsed internal weight.
    k: Vec<f64>,
    community: Vec<usize>,
    k_community: Vec<f64>,
    m2: f64,
}

impl Level {
    fn new(adjacency: Vec<Vec<(usize, f64)>>) -> Self {
        let k: Vec<f64> = adjacency
            .iter()
            .map(|neighbours| neighbours.iter().map(|(_, w)| w).sum())
            .collect();
        Self::with_degrees(adjacency, k)
    }

    fn with_degrees(adjacency: Vec<Vec<(usize, f64)>>, k: Vec<f64>) -> Self {
        let m2 = k.iter().sum();
        Self {
            community: (0..k.len()).collect(),
            k_community: k.clone(),
            adjacency,
            k,
            m2,
        }
    }

    fn len(&self) -> usize {
        self.k.len()
    }

    /// Greedily moves nodes to the neighbouring community with the best
    /// gain until a full sweep changes nothing. Returns whether any node
    /// moved.
    fn local_moving(&mut self, gamma: f64, tolerance: f64, rng: &mut StdRng) -> bool {
        let mut order: Vec<usize> = (0..self.len()).collect();
        let mut moved_any = false;
        loop {
            order.shuffle(rng);
            let mut moved = false;
            for &node in &order {
                let current = self.community[node];
                let k_node = self.k[node];

                // BTreeMap keeps tie-breaking independent of hash order.
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(other, weight) in &self.adjacency[node] {
                    *links.entry(self.community[other]).or_insert(0.0) += weight;
                }

                self.k_community[current] -= k_node;
                let gain = |community: usize, link: f64, k_community: &[f64]| {
                    link - gamma * k_node * k_community[community] / self.m2
                };

                let mut best = current;
                let mut best_gain = gain(
                    current,
                    links.get(&current).copied().unwrap_or(0.0),
                    &self.k_community,
                );
                for (&community, &link) in &links {
                    let candidate = gain(community, link, &self.k_community);
                    if candidate > best_gain + tolerance {
                        best = community;
                        best_gain = candidate;
                    }
                }

                self.k_community[best] += k_node;
                if best != current {
                    self.community[node] = best;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
            moved_any = true;
        }
        moved_any
    }

    /// Collapses each community into a single node. Returns the coarser
    /// level and, for every node of this level, its node in the next.
    fn aggregate(&self) -> (Self, Vec<usize>) {
        let mut relabel = vec![usize::MAX; self.len()];
        let mut count = 0;
        for &community in &self.community {
            if relabel[community] == usize::MAX {
                relabel[community] = count;
                count += 1;
            }
        }

        let mut k = vec![0.0; count];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        for node in 0..self.len() {
            let from = relabel[self.community[node]];
            k[from] += self.k[node];
            for &(other, weight) in &self.adjacency[node] {
                let to = relabel[self.community[other]];
                if from != to {
                    *links[from].entry(to).or_insert(0.0) += weight;
                }
            }
        }
        let adjacency = links.into_iter().map(|l| l.into_iter().collect()).collect();
        let node_to_next = self.community.iter().map(|&c| relabel[c]).collect();
        (Self::with_degrees(adjacency, k), node_to_next)
    }
}
