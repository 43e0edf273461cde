//! End-to-end batch run: load, build both graph kinds, detect, analyze,
//! export.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::aggregate::build_area_graphs;
use crate::analyze::{CommunityStats, analyze};
use crate::config::PipelineConfig;
use crate::detect::{Partition, detect_communities};
use crate::error::Result;
use crate::export;
use crate::graph::{NodeId, WeightedGraph};
use crate::layout::community_layout;
use crate::metrics::{betweenness, degree_distribution, node_metrics};
use crate::record::{IncidentRecord, load_records};
use crate::similarity::build_similarity_graph;

/// What one analyzed graph produced.
#[derive(Debug, Clone)]
pub struct GraphReport {
    pub name: String,
    pub nodes: usize,
    pub edges: usize,
    pub communities: usize,
    pub quality: f64,
    /// Export targets that failed; the rest were written.
    pub failed_exports: Vec<String>,
}

/// Runs the whole pipeline with `config`.
///
/// # Errors
///
/// * If the configuration is invalid
/// * If the input cannot be loaded
/// * If community detection rejects its configuration
pub fn run(config: &PipelineConfig) -> Result<Vec<GraphReport>> {
    config.validate()?;
    let records = load_records(&config.input)?;
    std::fs::create_dir_all(&config.output.directory)?;
    run_on_records(&records, config)
}

/// Runs every stage after loading.
///
/// # Errors
///
/// * If community detection rejects its configuration
/// * If the similarity threshold is invalid
pub fn run_on_records(
    records: &[IncidentRecord],
    config: &PipelineConfig,
) -> Result<Vec<GraphReport>> {
    let mut reports = Vec::new();

    log::info!("Building area co-occurrence graphs");
    let areas = build_area_graphs(records, config.areas.partition, config.areas.group_by_day);
    for (bucket, graph) in &areas.graphs {
        let counts = areas.counts.bucket(*bucket);
        let name = format!("areas_{bucket}");
        let report = analyze_graph(&name, graph, &counts, config, |area: &String| {
            format!("{area} ({} incidents)", counts.get(area).copied().unwrap_or(0))
        })?;
        reports.push(report);
    }

    log::info!("Building incident similarity graph");
    let sample = config.similarity.sample.apply(records);
    let graph = build_similarity_graph(
        &sample,
        &config.similarity.weights,
        config.similarity.threshold,
    )?;
    let by_row: HashMap<usize, &IncidentRecord> = sample.iter().map(|r| (r.row, *r)).collect();
    let counts: HashMap<usize, u64> = by_row.keys().map(|&row| (row, 1)).collect();
    let report = analyze_graph("crimes", &graph, &counts, config, |row: &usize| {
        by_row.get(row).map(|r| r.label()).unwrap_or_default()
    })?;
    reports.push(report);

    Ok(reports)
}

fn analyze_graph<N, L>(
    name: &str,
    graph: &WeightedGraph<N>,
    counts: &HashMap<N, u64>,
    config: &PipelineConfig,
    label: L,
) -> Result<GraphReport>
where
    N: NodeId,
    L: Fn(&N) -> String,
{
    let partition = detect_communities(graph, &config.detection)?;
    let stats = analyze(graph, &partition, counts);
    for (community, entry) in &stats {
        log::debug!(
            "{name} community {community}: {} members, internal weight {}, {} records, ratio {:.4}",
            entry.members.len(),
            entry.internal_weight,
            entry.total_records,
            entry.ratio
        );
    }

    let failed_exports = export_graph(name, graph, &partition, &stats, config, &label);
    for target in &failed_exports {
        log::warn!("{name}: export to {target} skipped");
    }

    Ok(GraphReport {
        name: name.to_string(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        communities: partition.num_communities(),
        quality: partition.quality(),
        failed_exports,
    })
}

/// Writes every export target for one graph, returning the ones that
/// failed.
fn export_graph<N, L>(
    name: &str,
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    stats: &BTreeMap<usize, CommunityStats<N>>,
    config: &PipelineConfig,
    label: &L,
) -> Vec<String>
where
    N: NodeId,
    L: Fn(&N) -> String,
{
    let output = &config.output;
    let path = |suffix: &str| -> PathBuf { output.directory.join(format!("{name}{suffix}")) };
    let mut failed = Vec::new();
    let mut attempt = |target: PathBuf, result: Result<()>| match result {
        Ok(()) => log::debug!("Wrote {}", target.display()),
        Err(e) => {
            log::error!("Failed to export {}: {e}", target.display());
            failed.push(target.display().to_string());
        }
    };

    let edges = path("_edges.csv");
    attempt(edges.clone(), export::write_edge_list(graph, &edges));

    let gexf = path(".gexf");
    attempt(gexf.clone(), export::write_gexf(graph, partition, label, &gexf));

    let scores = output.betweenness.then(|| betweenness(graph));
    let rows = node_metrics(graph, partition, scores.as_ref(), label);
    let metrics = path("_metrics.csv");
    attempt(metrics.clone(), export::write_node_metrics(&rows, &metrics));

    let summary = path("_communities.csv");
    let members = path("_community_members.csv");
    attempt(
        summary.clone(),
        export::write_community_stats(stats, &summary, &members),
    );

    let degrees = path("_degree_distribution.csv");
    attempt(
        degrees.clone(),
        export::write_degree_distribution(&degree_distribution(graph), &degrees),
    );

    let layout = community_layout(
        graph,
        partition,
        config.detection.seed,
        output.layout_iterations,
    );
    let dot = path(".dot");
    let dot_written = export::write_dot(graph, partition, &layout, &dot);
    let dot_ok = dot_written.is_ok();
    attempt(dot.clone(), dot_written);
    if output.render_images && dot_ok {
        let png = path(".png");
        attempt(png.clone(), export::render_png(&dot, &png));
    }

    failed
}
