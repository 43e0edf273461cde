use std::path::PathBuf;

use clap::Parser;
use crime_communities::{PipelineConfig, run};

#[derive(Parser)]
#[command(
    name = "crime-communities",
    about = "Area and incident community detection over a crime log"
)]
struct Cli {
    /// Semicolon-separated incident file (overrides the config file)
    input: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for exported graphs, tables and images
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = cli.input {
        config.input.path = input;
    }
    if let Some(output) = cli.output {
        config.output.directory = output;
    }

    let reports = run(&config)?;

    println!("Analyzed {} graphs:", reports.len());
    for report in reports {
        println!(
            "  {}: {} nodes, {} edges, {} communities (quality {:.4})",
            report.name, report.nodes, report.edges, report.communities, report.quality
        );
        if !report.failed_exports.is_empty() {
            println!("    failed exports: {}", report.failed_exports.join(", "));
        }
    }

    Ok(())
}
