//! Incident records and the delimited-file loader.

use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::config::{ColumnMapping, InputConfig};
use crate::error::{Error, Result};

/// One crime incident, immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    /// Position among the kept rows; stable node id in the pairwise graph.
    pub row: usize,
    pub occurred_on: NaiveDate,
    pub area: String,
    pub crime_type: String,
    pub mo_codes: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl IncidentRecord {
    /// Short human-readable description used in exports.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} @ {} ({})", self.crime_type, self.area, self.occurred_on)
    }
}

/// Column positions resolved once against the input header.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    date: usize,
    area: usize,
    crime_type: usize,
    mo_codes: usize,
    latitude: Option<usize>,
    longitude: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, mapping: &ColumnMapping) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name.trim());
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::MissingColumn {
                column: name.to_string(),
            })
        };

        let latitude = mapping.latitude.as_deref().and_then(find);
        let longitude = mapping.longitude.as_deref().and_then(find);
        if mapping.latitude.is_some() && latitude.is_none() {
            log::debug!("Optional latitude column not present in input");
        }

        Ok(Self {
            date: require(&mapping.date)?,
            area: require(&mapping.area)?,
            crime_type: require(&mapping.crime_type)?,
            mo_codes: require(&mapping.mo_codes)?,
            latitude,
            longitude,
        })
    }
}

/// Loads incident records from the configured file.
///
/// # Errors
///
/// * If the file cannot be opened or its header read
/// * If a required column is missing from the header
pub fn load_records(config: &InputConfig) -> Result<Vec<IncidentRecord>> {
    log::info!("Loading incidents from {}", config.path.display());
    let file = std::fs::File::open(&config.path)?;
    read_records(file, config)
}

/// Loads incident records from any reader using the configured schema.
///
/// Rows with a missing required field or an unparseable date are dropped.
///
/// # Errors
///
/// * If the header cannot be read
/// * If a required column is missing from the header
pub fn read_records<R: Read>(reader: R, config: &InputConfig) -> Result<Vec<IncidentRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(config.delimiter)?)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnIndex::resolve(reader.headers()?, &config.columns)?;
    let mut records = Vec::new();
    let mut dropped = 0_usize;

    for result in reader.records() {
        let Ok(row) = result else {
            dropped += 1;
            continue;
        };
        match parse_row(&row, &columns, &config.date_formats, records.len()) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} rows with missing or malformed required fields");
    }
    log::info!("Loaded {} incidents", records.len());
    Ok(records)
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .map_err(|_| Error::config(format!("delimiter {delimiter:?} is not a single byte")))
}

fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    date_formats: &[String],
    position: usize,
) -> Option<IncidentRecord> {
    let field = |index: usize| {
        row.get(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let coordinate = |index: Option<usize>| {
        index
            .and_then(field)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
    };

    Some(IncidentRecord {
        row: position,
        occurred_on: parse_date(field(columns.date)?, date_formats)?,
        area: field(columns.area)?.to_string(),
        crime_type: field(columns.crime_type)?.to_string(),
        mo_codes: field(columns.mo_codes)?.to_string(),
        latitude: coordinate(columns.latitude),
        longitude: coordinate(columns.longitude),
    })
}

/// Parses the first format that matches, keeping only the calendar date.
#[must_use]
pub fn parse_date(value: &str, formats: &[String]) -> Option<NaiveDate> {
    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(value, format))
            .ok()
    })
}
