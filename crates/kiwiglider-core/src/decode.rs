// crates/kiwiglider-core/src/decode.rs

// Turns a decoded glider export into a `TimeSeriesDataset`.
//
// Slocum binaries are decoded by external tooling into a delimited text
// export whose header row names the glider sensors. The decoder here maps
// those sensors onto the configured output variables.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{DeploymentConfig, VariableSpec};
use crate::dataset::{AttrValue, Attributes, TimeSeriesDataset, TIME};
use crate::error::{PipelineError, Result};
use crate::pipeline::{BinaryDecoder, DecodeRequest};

pub const BAR_TO_DBAR: &str = "bar2dbar";

fn convert(value: f64, conversion: Option<&str>) -> Result<f64> {
    match conversion {
        None => Ok(value),
        Some(BAR_TO_DBAR) => Ok(value * 10.0),
        Some(other) => Err(PipelineError::Configuration(format!(
            "unknown unit conversion '{other}'"
        ))),
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Builds a dataset from a delimited export.
///
/// Every configured variable whose `source` column is present becomes a
/// variable carrying its configured attributes; the configuration metadata
/// becomes the global attributes. Rows without a parseable time (for example
/// a units row) are skipped.
pub fn decode_export<R: Read>(reader: R, config: &DeploymentConfig) -> Result<TimeSeriesDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    if !config.netcdf_variables.contains_key(TIME) {
        return Err(PipelineError::Configuration(format!(
            "netcdf_variables has no '{TIME}' entry"
        )));
    }
    let mut columns: Vec<(&str, &VariableSpec, usize)> = Vec::new();
    for (name, spec) in &config.netcdf_variables {
        let source = spec.source.as_deref().unwrap_or(name);
        match headers.iter().position(|header| header == source) {
            Some(idx) => columns.push((name.as_str(), spec, idx)),
            None if name == TIME => {
                return Err(PipelineError::Validation(format!(
                    "decoded export has no time source column '{source}'"
                )))
            }
            None => debug!(variable = %name, source, "source not in export, skipping"),
        }
    }
    // time leads the frame
    columns.sort_by_key(|(name, _, _)| *name != TIME);

    let time_idx = columns[0].2;
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];
    let mut skipped = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let Some(time) = record.get(time_idx).and_then(parse_cell) else {
            skipped += 1;
            continue;
        };
        for (slot, (name, spec, idx)) in values.iter_mut().zip(&columns) {
            let raw = if *name == TIME {
                Some(time)
            } else {
                record.get(*idx).and_then(parse_cell)
            };
            let converted = match raw {
                Some(value) => Some(convert(value, spec.conversion.as_deref())?),
                None => None,
            };
            slot.push(converted);
        }
    }
    if skipped > 0 {
        warn!(rows = skipped, "skipped export rows without a time value");
    }

    let frame_columns: Vec<Column> = columns
        .iter()
        .zip(values)
        .map(|((name, _, _), data)| Series::new((*name).into(), data).into())
        .collect();
    let frame = DataFrame::new(frame_columns)?;

    let variables = columns
        .iter()
        .map(|(name, spec, _)| (name.to_string(), spec.output_attributes()))
        .collect();
    let mut global: Attributes = config.metadata.clone();
    global.insert(
        "date_created".to_string(),
        AttrValue::Text(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
    );

    let dataset = TimeSeriesDataset::from_parts(frame, variables, global)?;
    info!(
        rows = dataset.height(),
        variables = columns.len(),
        "decoded glider export"
    );
    Ok(dataset)
}

/// A [`BinaryDecoder`] that reads an export already produced for the
/// discovered binaries.
#[derive(Debug, Clone)]
pub struct DecodedExportDecoder {
    export: PathBuf,
}

impl DecodedExportDecoder {
    pub fn new(export: impl Into<PathBuf>) -> Self {
        Self {
            export: export.into(),
        }
    }

    pub fn export_path(&self) -> &Path {
        &self.export
    }
}

impl BinaryDecoder for DecodedExportDecoder {
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<TimeSeriesDataset> {
        info!(
            export = %self.export.display(),
            binaries = request.binaries.len(),
            cache = %request.cache_directory.display(),
            "decoding glider export"
        );
        if !self.export.is_file() {
            return Err(PipelineError::Precondition(format!(
                "decoded export {} does not exist",
                self.export.display()
            )));
        }
        let file = File::open(&self.export)?;
        decode_export(file, request.config)
    }
}
