// crates/kiwiglider-core/src/metadata/sheet.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::metadata::record::{DeploymentRecord, RecordValue};

/// Anything that can hand out deployment records by ID.
pub trait DeploymentSource {
    fn deployment(&self, id: i64) -> Result<DeploymentRecord>;

    fn deployment_ids(&self) -> Vec<i64>;
}

/// A CSV export of the deployment spreadsheet.
///
/// The first row holds the column headers and the first column the integer
/// deployment ID; every other cell of a row becomes a record field.
#[derive(Debug, Clone)]
pub struct CsvDeploymentSheet {
    headers: Vec<String>,
    rows: BTreeMap<i64, Vec<String>>,
}

fn parse_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.fract() == 0.0)
            .map(|value| value as i64)
    })
}

impl CsvDeploymentSheet {
    pub fn from_path(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "reading deployment sheet");
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .skip(1)
            .map(|header| header.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(PipelineError::Validation(
                "deployment sheet needs an ID column followed by at least one field column"
                    .to_string(),
            ));
        }

        let mut rows = BTreeMap::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let Some(raw_id) = record.get(0) else {
                continue;
            };
            if raw_id.trim().is_empty() {
                continue;
            }
            let id = parse_id(raw_id).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "deployment sheet row {} has non-integer ID '{raw_id}'",
                    line + 2
                ))
            })?;
            let cells = record.iter().skip(1).map(str::to_string).collect();
            rows.insert(id, cells);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl DeploymentSource for CsvDeploymentSheet {
    fn deployment(&self, id: i64) -> Result<DeploymentRecord> {
        let cells = self.rows.get(&id).ok_or_else(|| {
            PipelineError::Validation(format!("deployment {id} is not in the deployment sheet"))
        })?;

        let pairs = self.headers.iter().enumerate().map(|(idx, header)| {
            let value = cells
                .get(idx)
                .map(|cell| RecordValue::parse(cell))
                .unwrap_or(RecordValue::Empty);
            (header.clone(), value)
        });
        Ok(DeploymentRecord::from_pairs(id, pairs))
    }

    fn deployment_ids(&self) -> Vec<i64> {
        self.rows.keys().copied().collect()
    }
}
