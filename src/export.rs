//! File exports: edge lists, GEXF, DOT/PNG and CSV summaries.
//!
//! Each writer is an independent target; callers log failures and move on.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{EdgeReference, NodeIndex, UnGraph};
use serde::Serialize;

use crate::analyze::CommunityStats;
use crate::detect::Partition;
use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};
use crate::layout::Position;
use crate::metrics::NodeMetrics;

/// Points per layout unit in rendered images.
const DOT_SCALE: f64 = 40.0;

#[derive(Serialize)]
struct EdgeRow {
    source: String,
    target: String,
    weight: f64,
}

/// Writes `source,target,weight` rows, one per edge.
///
/// # Errors
///
/// * If the file cannot be created or written
pub fn write_edge_list<N: NodeId>(graph: &WeightedGraph<N>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (a, b, weight) in graph.edges() {
        writer.serialize(EdgeRow {
            source: a.to_string(),
            target: b.to_string(),
            weight,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a GEXF 1.3 document. Node attributes are stringified.
///
/// # Errors
///
/// * If the file cannot be written
pub fn write_gexf<N, L>(
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    label: L,
    path: &Path,
) -> Result<()>
where
    N: NodeId,
    L: Fn(&N) -> String,
{
    std::fs::write(path, render_gexf(graph, partition, label))?;
    Ok(())
}

fn render_gexf<N, L>(graph: &WeightedGraph<N>, partition: &Partition<N>, label: L) -> String
where
    N: NodeId,
    L: Fn(&N) -> String,
{
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<gexf xmlns="http://gexf.net/1.3" version="1.3">
  <graph mode="static" defaultedgetype="undirected">
    <attributes class="node">
      <attribute id="0" title="community" type="string"/>
    </attributes>
    <nodes>"#
    );
    for node in graph.nodes() {
        let community = partition
            .community_of(node)
            .map(|c| c.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            r#"      <node id="{}" label="{}"><attvalues><attvalue for="0" value="{}"/></attvalues></node>"#,
            escape_xml(&node.to_string()),
            escape_xml(&label(node)),
            community
        );
    }
    let _ = writeln!(out, "    </nodes>\n    <edges>");
    for (id, (a, b, weight)) in graph.edges().enumerate() {
        let _ = writeln!(
            out,
            r#"      <edge id="{id}" source="{}" target="{}" weight="{weight}"/>"#,
            escape_xml(&a.to_string()),
            escape_xml(&b.to_string()),
        );
    }
    let _ = writeln!(out, "    </edges>\n  </graph>\n</gexf>");
    out
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Writes a DOT file with community colors and fixed positions.
///
/// # Errors
///
/// * If the file cannot be written
pub fn write_dot<N: NodeId>(
    graph: &WeightedGraph<N>,
    partition: &Partition<N>,
    layout: &HashMap<N, Position>,
    path: &Path,
) -> Result<()> {
    let edge_attributes =
        |_: &UnGraph<N, f64>, edge: EdgeReference<'_, f64>| format!("label=\"{}\"", edge.weight());
    let node_attributes = |_: &UnGraph<N, f64>, (_, node): (NodeIndex, &N)| {
        let community = partition.community_of(node).unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let hue = ((community * 60) % 360) as f32 / 360.0;
        let position = layout
            .get(node)
            .map(|p| format!(", pos=\"{:.1},{:.1}!\"", p.x * DOT_SCALE, p.y * DOT_SCALE))
            .unwrap_or_default();
        format!(
            "label=\"{}\", style=filled, fillcolor=\"{hue:.3} 0.5 0.9\"{position}",
            escape_dot(&node.to_string())
        )
    };
    let dot = Dot::with_attr_getters(
        graph.inner(),
        &[Config::EdgeNoLabel, Config::NodeNoLabel],
        &edge_attributes,
        &node_attributes,
    );
    std::fs::write(path, format!("{dot:?}"))?;
    Ok(())
}

/// Escapes a DOT quoted string.
fn escape_dot(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders a DOT file with pinned positions to PNG using Graphviz `neato`.
///
/// # Errors
///
/// * [`Error::Export`] if `neato` is missing or exits unsuccessfully
pub fn render_png(dot_file: &Path, output_image: &Path) -> Result<()> {
    let status = Command::new("neato")
        .arg("-n2")
        .arg("-Tpng")
        .arg(dot_file)
        .arg("-o")
        .arg(output_image)
        .status()
        .map_err(|e| Error::Export {
            target: output_image.display().to_string(),
            message: format!("could not run neato: {e}"),
        })?;
    if !status.success() {
        return Err(Error::Export {
            target: output_image.display().to_string(),
            message: format!("neato exited with {status}"),
        });
    }
    Ok(())
}

/// Writes node metrics rows.
///
/// # Errors
///
/// * If the file cannot be created or written
pub fn write_node_metrics(rows: &[NodeMetrics], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct CommunityRow {
    community: usize,
    members: usize,
    internal_weight: f64,
    total_records: u64,
    ratio: f64,
}

#[derive(Serialize)]
struct MemberRow {
    node: String,
    community: usize,
    record_count: u64,
    weighted_degree: f64,
}

/// Writes one row per community to `summary_path` and one row per member
/// node to `members_path`.
///
/// # Errors
///
/// * If either file cannot be created or written
pub fn write_community_stats<N: NodeId>(
    stats: &BTreeMap<usize, CommunityStats<N>>,
    summary_path: &Path,
    members_path: &Path,
) -> Result<()> {
    let mut summary = csv::Writer::from_path(summary_path)?;
    let mut members = csv::Writer::from_path(members_path)?;
    for (&community, entry) in stats {
        summary.serialize(CommunityRow {
            community,
            members: entry.members.len(),
            internal_weight: entry.internal_weight,
            total_records: entry.total_records,
            ratio: entry.ratio,
        })?;
        for (node, node_stats) in &entry.members {
            members.serialize(MemberRow {
                node: node.to_string(),
                community,
                record_count: node_stats.record_count,
                weighted_degree: node_stats.weighted_degree,
            })?;
        }
    }
    summary.flush()?;
    members.flush()?;
    Ok(())
}

/// Writes `degree,nodes` rows.
///
/// # Errors
///
/// * If the file cannot be created or written
pub fn write_degree_distribution(histogram: &BTreeMap<usize, usize>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["degree", "nodes"])?;
    for (degree, nodes) in histogram {
        writer.write_record([degree.to_string(), nodes.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::detect::{DetectionConfig, detect_communities};
    use crate::layout::community_layout;

    fn sample() -> WeightedGraph<String> {
        let mut graph = WeightedGraph::new();
        graph.add_edge("77th Street".to_string(), "Southeast".to_string(), 4.0);
        graph.add_edge("Southeast".to_string(), "Harbor & Port".to_string(), 1.0);
        graph.add_node("Topanga".to_string());
        graph
    }

    #[test]
    fn edge_list_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        write_edge_list(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "source,target,weight");
        assert_eq!(lines[1], "77th Street,Southeast,4.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn gexf_escapes_and_lists_every_node() {
        let graph = sample();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let xml = render_gexf(&graph, &partition, |n| format!("{n} <area>"));

        assert!(xml.contains(r#"id="Harbor &amp; Port""#));
        assert!(xml.contains("&lt;area&gt;"));
        assert_eq!(xml.matches("<node ").count(), 4);
        assert_eq!(xml.matches("<edge ").count(), 2);
        assert!(xml.contains(r#"weight="4""#));
    }

    #[test]
    fn dot_carries_positions_and_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.dot");
        let graph = sample();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let layout = community_layout(&graph, &partition, 42, 10);
        write_dot(&graph, &partition, &layout, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("graph {"));
        assert!(text.contains("fillcolor="));
        assert!(text.contains("pos=\""));
        assert!(text.contains("label=\"Topanga\""));
    }

    #[test]
    fn dot_labels_escape_quotes_and_backslashes() {
        assert_eq!(escape_dot(r#"Van "Nuys"\"#), r#"Van \"Nuys\"\\"#);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quoted.dot");
        let mut graph = WeightedGraph::new();
        graph.add_edge(r#"North "Hills"\"#.to_string(), "Mission".to_string(), 1.0);
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        write_dot(&graph, &partition, &HashMap::new(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"label="North \"Hills\"\\""#));
        assert!(!text.contains("pos="));
    }

    #[test]
    fn community_tables_include_singletons() {
        let dir = tempfile::tempdir().unwrap();
        let graph = sample();
        let partition = detect_communities(&graph, &DetectionConfig::default()).unwrap();
        let stats = analyze(&graph, &partition, &HashMap::new());
        let summary = dir.path().join("summary.csv");
        let members = dir.path().join("members.csv");
        write_community_stats(&stats, &summary, &members).unwrap();

        let summary = std::fs::read_to_string(summary).unwrap();
        assert_eq!(summary.lines().count(), 1 + partition.num_communities());
        assert!(summary.starts_with("community,members,internal_weight,total_records,ratio"));
        let members = std::fs::read_to_string(members).unwrap();
        assert_eq!(members.lines().count(), 1 + graph.node_count());
    }

    #[test]
    fn degree_distribution_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("degrees.csv");
        write_degree_distribution(&BTreeMap::from([(0, 1), (2, 3)]), &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "degree,nodes\n0,1\n2,3\n"
        );
    }
}
