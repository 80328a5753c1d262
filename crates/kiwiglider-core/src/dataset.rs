// crates/kiwiglider-core/src/dataset.rs

use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const TIME: &str = "time";
pub const DEPTH: &str = "depth";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Coordinate variables that must come out of every transform unchanged.
pub const COORDINATES: [&str; 4] = [TIME, DEPTH, LATITUDE, LONGITUDE];

pub const FILL_VALUE_ATTR: &str = "_FillValue";
pub const ANCILLARY_ATTR: &str = "ancillary_variables";
pub const FLAG_VALUES_ATTR: &str = "flag_values";

/// Fill value for non-flag variables that do not declare their own.
pub const DEFAULT_FILL_VALUE: f64 = -999.0;

/// A single attribute value, as found on CF variables and globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(value) => Some(*value as f64),
            AttrValue::Float(value) => Some(*value),
            AttrValue::Text(text) => text.trim().parse().ok(),
            AttrValue::IntList(_) | AttrValue::FloatList(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Text(text) => f.write_str(text),
            AttrValue::IntList(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            AttrValue::FloatList(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i8> for AttrValue {
    fn from(value: i8) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<Vec<i8>> for AttrValue {
    fn from(values: Vec<i8>) -> Self {
        AttrValue::IntList(values.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(values: Vec<f64>) -> Self {
        AttrValue::FloatList(values)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Observations on a shared time axis, plus CF-style attributes.
///
/// Columns live in a polars [`DataFrame`]; the `time` column holds seconds
/// since 1970-01-01. Attributes are kept in ordered maps so that everything
/// derived from a dataset (archives, reports, exports) is deterministic.
#[derive(Debug, Clone)]
pub struct TimeSeriesDataset {
    frame: DataFrame,
    variables: BTreeMap<String, Attributes>,
    global: Attributes,
}

impl TimeSeriesDataset {
    pub fn new(frame: DataFrame) -> Result<Self> {
        Self::from_parts(frame, BTreeMap::new(), Attributes::new())
    }

    pub fn from_parts(
        frame: DataFrame,
        variables: BTreeMap<String, Attributes>,
        global: Attributes,
    ) -> Result<Self> {
        let time = frame.column(TIME).map_err(|_| {
            PipelineError::Validation(format!("dataset has no '{TIME}' variable"))
        })?;
        if !time.dtype().is_primitive_numeric() {
            return Err(PipelineError::Validation(format!(
                "'{TIME}' must be numeric seconds since epoch, found {}",
                time.dtype()
            )));
        }

        Ok(Self {
            frame,
            variables,
            global,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_parts(self) -> (DataFrame, BTreeMap<String, Attributes>, Attributes) {
        (self.frame, self.variables, self.global)
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn global_attributes(&self) -> &Attributes {
        &self.global
    }

    pub fn global_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.global
    }

    pub fn variable_attributes(&self) -> &BTreeMap<String, Attributes> {
        &self.variables
    }

    pub fn attributes(&self, name: &str) -> Option<&Attributes> {
        self.variables.get(name)
    }

    pub fn attributes_mut(&mut self, name: &str) -> &mut Attributes {
        self.variables.entry(name.to_string()).or_default()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| PipelineError::Validation(format!("variable '{name}' not in dataset")))
    }

    /// Values of a numeric variable as `f64`, nulls preserved.
    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        Ok(series.f64()?.into_iter().collect())
    }

    /// The time axis in seconds; missing timestamps come back as NaN.
    pub fn times(&self) -> Result<Vec<f64>> {
        Ok(self
            .values(TIME)?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }

    /// Adds a variable, replacing any variable of the same name.
    pub fn put_variable(&mut self, series: Series, attributes: Attributes) -> Result<()> {
        if series.len() != self.height() {
            return Err(PipelineError::Validation(format!(
                "variable '{}' has {} values, dataset has {}",
                series.name(),
                series.len(),
                self.height()
            )));
        }
        let name = series.name().to_string();
        self.frame.with_column(series)?;
        self.variables.insert(name, attributes);
        Ok(())
    }

    pub fn drop_variable(&mut self, name: &str) -> Result<Option<Attributes>> {
        if self.has_variable(name) {
            self.frame.drop_in_place(name)?;
        }
        Ok(self.variables.remove(name))
    }

    pub fn fill_value(&self, name: &str) -> Option<f64> {
        self.attributes(name)
            .and_then(|attrs| attrs.get(FILL_VALUE_ATTR))
            .and_then(AttrValue::as_f64)
    }

    pub fn is_flag_variable(&self, name: &str) -> bool {
        let declared = self
            .attributes(name)
            .is_some_and(|attrs| attrs.contains_key(FLAG_VALUES_ATTR));
        let stored_as_flag = self
            .frame
            .column(name)
            .is_ok_and(|column| column.dtype() == &DataType::Int8);
        declared || stored_as_flag
    }

    /// Adds `token` to the variable's `ancillary_variables` list unless it is
    /// already one of its whitespace-delimited entries.
    pub fn append_ancillary(&mut self, name: &str, token: &str) {
        let attrs = self.attributes_mut(name);
        let mut tokens: Vec<String> = attrs
            .get(ANCILLARY_ATTR)
            .map(|value| value.to_string())
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if !tokens.iter().any(|existing| existing == token) {
            tokens.push(token.to_string());
        }
        attrs.insert(ANCILLARY_ATTR.to_string(), AttrValue::Text(tokens.join(" ")));
    }

    /// Removes `token` from the variable's `ancillary_variables`, dropping
    /// the attribute once no entries remain.
    pub fn remove_ancillary(&mut self, name: &str, token: &str) {
        let Some(attrs) = self.variables.get_mut(name) else {
            return;
        };
        let Some(current) = attrs.get(ANCILLARY_ATTR).map(|value| value.to_string()) else {
            return;
        };
        let kept: Vec<&str> = current
            .split_whitespace()
            .filter(|existing| *existing != token)
            .collect();
        if kept.is_empty() {
            attrs.remove(ANCILLARY_ATTR);
        } else {
            attrs.insert(ANCILLARY_ATTR.to_string(), AttrValue::Text(kept.join(" ")));
        }
    }

    pub fn ancillary_variables(&self, name: &str) -> Vec<String> {
        self.attributes(name)
            .and_then(|attrs| attrs.get(ANCILLARY_ATTR))
            .map(|value| {
                value
                    .to_string()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn is_coordinate(name: &str) -> bool {
    COORDINATES.contains(&name)
}
