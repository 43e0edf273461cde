//! Two-level community layout for plotting.
//!
//! Communities are first placed by a spring layout of the community
//! meta-graph; each community's members are then laid out locally and
//! shifted onto their community's anchor.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::Partition;
use crate::graph::{NodeId, WeightedGraph};

/// Spread of community anchors.
const META_SCALE: f64 = 10.0;
/// Spread of members around their anchor.
const LOCAL_SCALE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Fruchterman–Reingold layout of `n` nodes given weighted edges by
/// position. Output coordinates lie within `[-scale, scale]`.
#[must_use]
pub fn spring_layout(
    n: usize,
    edges: &[(usize, usize, f64)],
    iterations: usize,
    scale: f64,
    rng: &mut StdRng,
) -> Vec<Position> {
    match n {
        0 => return Vec::new(),
        1 => return vec![Position { x: 0.0, y: 0.0 }],
        _ => {}
    }

    let mut positions: Vec<Position> = (0..n)
        .map(|_| Position {
            x: rng.gen_range(0.0..1.0),
            y: rng.gen_range(0.0..1.0),
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let k = (1.0 / n as f64).sqrt();
    let mut temperature = 0.1;
    #[allow(clippy::cast_precision_loss)]
    let cooling = temperature / (iterations.max(1) as f64 + 1.0);

    for _ in 0..iterations {
        let mut displacement = vec![(0.0, 0.0); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = positions[i].x - positions[j].x;
                let dy = positions[i].y - positions[j].y;
                let distance = dx.hypot(dy).max(0.01);
                let force = k * k / distance;
                displacement[i].0 += dx / distance * force;
                displacement[i].1 += dy / distance * force;
                displacement[j].0 -= dx / distance * force;
                displacement[j].1 -= dy / distance * force;
            }
        }
        for &(a, b, weight) in edges {
            let dx = positions[a].x - positions[b].x;
            let dy = positions[a].y - positions[b].y;
            let distance = dx.hypot(dy).max(0.01);
            let force = weight * distance * distance / k;
            displacement[a].0 -= dx / distance * force;
            displacement[a].1 -= dy / distance * force;
            displacement[b].0 += dx / distance * force;
            displacement[b].1 += dy / distance * force;
        }
        for (position, (dx, dy)) in positions.iter_mut().zip(displacement) {
            let length = f64::hypot(dx, dy).max(0.01);
            let step = length.min(temperature);
            position.x += dx / length * step;
            position.y += dy / length * step;
        }
        temperature -= cooling;
    }

    rescale(&mut positions, scale);
    positions
}

/// Centers positions on the origin and scales the largest extent to `scale`.
fn rescale(positions: &mut [Position], scale: f64) {
    #[allow(clippy::cast_precision_loss)]
    let count = positions.len() as f64;
    let cx = positions.iter().map(|p| p.x).sum::<f64>() / count;
    let cy = positions.iter().map(|p| p.y).sum::<f64>() / count;
    let extent = positions
        .iter()
        .map(|p| (p.x - cx).abs().max((p.y - cy).abs()))
        .fold(0.0, f64::max);
    let factor = if extent > 0.0 { scale / extent } else { 0.0 };
    for p in positions.iter_mut() {
        p.x = (p.x - cx) * factor;
        p.y = (p.y - cy) * factor;
    }
}

/// Lays out `graph` so members of a community cluster around a shared
/// anchor. Deterministic for a given seed.
#[must_use]
pub fn community_layout<N: NodeId>(
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    seed: u64,
    iterations: usize,
) -> HashMap<N, Position> {
    let mut rng = StdRng::seed_from_u64(seed);
    let communities = partition.communities();
    let slot: HashMap<usize, usize> = communities
        .keys()
        .enumerate()
        .map(|(slot, &community)| (community, slot))
        .collect();

    let mut meta_edges: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (a, b, weight) in graph.edges() {
        if let (Some(ca), Some(cb)) = (partition.community_of(a), partition.community_of(b))
            && ca != cb
        {
            let (sa, sb) = (slot[&ca], slot[&cb]);
            *meta_edges.entry((sa.min(sb), sa.max(sb))).or_insert(0.0) += weight;
        }
    }
    let meta_edges: Vec<_> = meta_edges.into_iter().map(|((a, b), w)| (a, b, w)).collect();
    let anchors = spring_layout(communities.len(), &meta_edges, iterations, META_SCALE, &mut rng);

    let mut layout = HashMap::with_capacity(partition.len());
    for ((_, members), anchor) in communities.iter().zip(&anchors) {
        let local_index: HashMap<&N, usize> =
            members.iter().enumerate().map(|(i, n)| (n, i)).collect();
        let local_edges: Vec<_> = graph
            .edges()
            .filter_map(|(a, b, w)| Some((*local_index.get(a)?, *local_index.get(b)?, w)))
            .collect();
        let local = spring_layout(members.len(), &local_edges, iterations, LOCAL_SCALE, &mut rng);
        for (member, position) in members.iter().zip(local) {
            layout.insert(
                member.clone(),
                Position {
                    x: anchor.x + position.x,
                    y: anchor.y + position.y,
                },
            );
        }
    }
    layout
}
