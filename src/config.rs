//! Pipeline configuration.
//!
//! Every section is optional in the TOML file; missing values fall back
//! to the LAPD dataset layout and the business-rule coefficients.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::aggregate::PartitionKey;
use crate::detect::DetectionConfig;
use crate::error::{Error, Result};
use crate::similarity::{SamplePolicy, SimilarityWeights};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub areas: AreaConfig,
    pub similarity: SimilarityConfig,
    pub detection: DetectionConfig,
    pub output: OutputConfig,
}

/// Logical field name → source column name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
    pub date: String,
    pub area: String,
    pub crime_type: String,
    pub mo_codes: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: "DATE OCC".to_string(),
            area: "AREA NAME".to_string(),
            crime_type: "Crm Cd Desc".to_string(),
            mo_codes: "Mocodes".to_string(),
            latitude: Some("LAT".to_string()),
            longitude: Some("LON".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,
    /// Single-byte field separator.
    pub delimiter: char,
    /// chrono formats, tried in order. Date-only formats are accepted too.
    pub date_formats: Vec<String>,
    pub columns: ColumnMapping,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("datasetReal.csv"),
            delimiter: ';',
            date_formats: vec![
                "%m/%d/%Y %I:%M:%S %p".to_string(),
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%m/%d/%Y".to_string(),
                "%Y-%m-%d".to_string(),
            ],
            columns: ColumnMapping::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AreaConfig {
    pub partition: PartitionKey,
    /// Link areas only when the incidents happened on the same calendar day.
    pub group_by_day: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            partition: PartitionKey::Year,
            group_by_day: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityConfig {
    pub weights: SimilarityWeights,
    /// Minimum score for an edge to be materialized.
    pub threshold: f64,
    pub sample: SamplePolicy,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            threshold: 3.0,
            sample: SamplePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub betweenness: bool,
    pub render_images: bool,
    pub layout_iterations: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            betweenness: true,
            render_images: true,
            layout_iterations: 50,
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read or parsed
    /// * If any value fails [`PipelineConfig::validate`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would silently produce a degenerate run.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] naming the first offending value
    pub fn validate(&self) -> Result<()> {
        let columns = &self.input.columns;
        for (field, column) in [
            ("date", &columns.date),
            ("area", &columns.area),
            ("crime_type", &columns.crime_type),
            ("mo_codes", &columns.mo_codes),
        ] {
            if column.trim().is_empty() {
                return Err(Error::config(format!("column for `{field}` is empty")));
            }
        }
        if !self.input.delimiter.is_ascii() {
            return Err(Error::config(format!(
                "delimiter {:?} is not a single ASCII byte",
                self.input.delimiter
            )));
        }
        if self.input.date_formats.is_empty() {
            return Err(Error::config("at least one date format is required"));
        }
        self.similarity.weights.validate()?;
        validate_threshold(self.similarity.threshold)?;
        if self.similarity.sample.size() == 0 {
            return Err(Error::config("similarity sample size must be positive"));
        }
        self.detection.validate()?;
        Ok(())
    }
}

/// A threshold at or below zero would connect every pair of records.
pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(Error::config(format!(
            "similarity threshold must be a positive number, got {threshold}"
        )));
    }
    Ok(())
}
