//! Community structure in crime-incident logs.
//!
//! Two graph sources feed the same detector and analyzer:
//!
//! * [`build_area_graphs`] links patrol areas whose incidents share a
//!   modus-operandi code and crime type, one graph per year plus a total.
//! * [`build_similarity_graph`] links individual incidents whose
//!   similarity score clears a threshold.
//!
//! [`detect_communities`] partitions either graph with a seeded Louvain
//! search, and [`analyze()`] reports per-community weight and record totals.

pub mod aggregate;
pub mod analyze;
pub mod config;
pub mod detect;
pub mod error;
pub mod export;
pub mod graph;
pub mod layout;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod similarity;

pub use aggregate::{AreaGraphs, Bucket, PartitionKey, RecordCountIndex, build_area_graphs};
pub use analyze::{CommunityStats, NodeStats, analyze};
pub use config::PipelineConfig;
pub use detect::{DetectionConfig, Objective, Partition, detect_communities};
pub use error::{Error, Result};
pub use graph::{NodeId, WeightedGraph};
pub use pipeline::{GraphReport, run};
pub use record::{IncidentRecord, load_records};
pub use similarity::{PairScore, SamplePolicy, SimilarityWeights, build_similarity_graph};
