// crates/kiwiglider-core/src/metadata/record.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, Result};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];

/// One cell of a deployment sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl RecordValue {
    /// Infers the cell type from its text the way a spreadsheet would.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return RecordValue::Empty;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" => return RecordValue::Bool(true),
            "false" | "no" => return RecordValue::Bool(false),
            _ => {}
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            return RecordValue::Number(number);
        }
        if let Some(date) = parse_date(trimmed) {
            return RecordValue::Date(date);
        }
        RecordValue::Text(trimmed.to_string())
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Empty => Ok(()),
            RecordValue::Text(text) => f.write_str(text),
            RecordValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            RecordValue::Number(number) => write!(f, "{number}"),
            RecordValue::Bool(flag) => write!(f, "{flag}"),
            RecordValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// The descriptive record of one deployment: a flat key-value mapping taken
/// from one row of the deployment sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRecord {
    id: i64,
    fields: BTreeMap<String, RecordValue>,
}

impl DeploymentRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn from_pairs<I, K>(id: i64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, RecordValue)>,
        K: Into<String>,
    {
        Self {
            id,
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RecordValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn missing(&self, key: &str) -> PipelineError {
        PipelineError::Configuration(format!(
            "deployment {} record is missing required field '{key}'",
            self.id
        ))
    }

    fn invalid(&self, key: &str, expected: &str, value: &RecordValue) -> PipelineError {
        PipelineError::Configuration(format!(
            "deployment {} field '{key}' should be {expected}, found '{value}'",
            self.id
        ))
    }

    /// Field rendered as text; numbers without a fraction print as integers.
    pub fn text(&self, key: &str) -> Result<String> {
        match self.fields.get(key) {
            None | Some(RecordValue::Empty) => Err(self.missing(key)),
            Some(value) => Ok(value.to_string()),
        }
    }

    pub fn number(&self, key: &str) -> Result<f64> {
        match self.fields.get(key) {
            None | Some(RecordValue::Empty) => Err(self.missing(key)),
            Some(RecordValue::Number(number)) => Ok(*number),
            Some(RecordValue::Text(text)) => text
                .parse()
                .map_err(|_| self.invalid(key, "a number", &RecordValue::Text(text.clone()))),
            Some(other) => Err(self.invalid(key, "a number", other)),
        }
    }

    /// Yes/no field; an empty cell reads as `false`.
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.fields.get(key) {
            None => Err(self.missing(key)),
            Some(RecordValue::Empty) => Ok(false),
            Some(RecordValue::Bool(flag)) => Ok(*flag),
            Some(RecordValue::Number(number)) => Ok(*number != 0.0),
            Some(other) => Err(self.invalid(key, "true or false", other)),
        }
    }

    pub fn date(&self, key: &str) -> Result<NaiveDate> {
        match self.fields.get(key) {
            None | Some(RecordValue::Empty) => Err(self.missing(key)),
            Some(RecordValue::Date(date)) => Ok(*date),
            Some(RecordValue::Text(text)) => {
                parse_date(text).ok_or_else(|| self.invalid(key, "a date", &RecordValue::Text(text.clone())))
            }
            Some(other) => Err(self.invalid(key, "a date", other)),
        }
    }
}
