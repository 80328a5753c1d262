// crates/kiwiglider-core/src/qc/attributes.rs

use kiwiglider_qartod::{
    aggregate_flag_meanings, QartodFlag, QartodSuite, QartodTest, TestKind,
    AGGREGATE_FLAG_VALUES, FLAG_FILL_VALUE,
};
use polars::prelude::*;
use tracing::debug;

use crate::dataset::{
    is_coordinate, AttrValue, Attributes, TimeSeriesDataset, DEFAULT_FILL_VALUE, FILL_VALUE_ATTR,
};
use crate::error::Result;

pub const QC_MODULE: &str = "qartod";
pub const AGGREGATE_TEST: &str = "qc";

pub fn test_flag_name(source: &str, kind: TestKind) -> String {
    format!("{source}_qartod_{}", kind.method_name())
}

pub fn aggregate_flag_name(source: &str) -> String {
    format!("{source}_qc")
}

/// True for `<source>_qc` and every `<source>_qartod_*` variable.
pub fn is_flag_of(source: &str, name: &str) -> bool {
    name == aggregate_flag_name(source)
        || name
            .strip_prefix(source)
            .is_some_and(|rest| rest.starts_with("_qartod_"))
}

/// Drops the flag variables a previous annotation left for `source`, along
/// with their `ancillary_variables` entries.
pub fn clear_flags(dataset: &mut TimeSeriesDataset, source: &str) -> Result<Vec<String>> {
    let stale: Vec<String> = dataset
        .variable_names()
        .into_iter()
        .filter(|name| is_flag_of(source, name))
        .collect();
    for name in &stale {
        debug!(variable = %name, source = %source, "dropping previous flag variable");
        dataset.drop_variable(name)?;
        dataset.remove_ancillary(source, name);
    }
    Ok(stale)
}

fn flag_attributes(
    standard_name: &str,
    long_name: &str,
    flag_values: Vec<i8>,
    flag_meanings: String,
) -> Attributes {
    let min = flag_values.iter().copied().min().unwrap_or(FLAG_FILL_VALUE);
    let max = flag_values.iter().copied().max().unwrap_or(FLAG_FILL_VALUE);

    let mut attrs = Attributes::new();
    attrs.insert("standard_name".into(), standard_name.into());
    attrs.insert("long_name".into(), long_name.into());
    attrs.insert("flag_values".into(), flag_values.into());
    attrs.insert("flag_meanings".into(), flag_meanings.into());
    attrs.insert("valid_min".into(), min.into());
    attrs.insert("valid_max".into(), max.into());
    attrs.insert(FILL_VALUE_ATTR.into(), FLAG_FILL_VALUE.into());
    attrs
}

fn provenance(attrs: &mut Attributes, test: &str, source: &str, config: String) {
    attrs.insert("ioos_qc_module".into(), QC_MODULE.into());
    attrs.insert("ioos_qc_test".into(), test.into());
    attrs.insert("ioos_qc_target".into(), source.into());
    attrs.insert("ioos_qc_config".into(), config.into());
}

pub fn test_flag_attributes(source: &str, test: &QartodTest) -> Attributes {
    let kind = test.kind();
    let mut attrs = flag_attributes(
        kind.standard_name(),
        kind.long_name(),
        QartodFlag::flag_values(),
        QartodFlag::flag_meanings(),
    );
    provenance(&mut attrs, kind.method_name(), source, test.config_json());
    attrs
}

pub fn aggregate_flag_attributes(source: &str, tests: &[QartodTest]) -> Result<Attributes> {
    let mut suite = QartodSuite::default();
    for test in tests {
        suite.insert(test.clone());
    }

    let mut attrs = flag_attributes(
        "aggregate_quality_flag",
        "Aggregate Quality Flag",
        AGGREGATE_FLAG_VALUES.to_vec(),
        aggregate_flag_meanings(),
    );
    provenance(&mut attrs, AGGREGATE_TEST, source, serde_json::to_string(&suite)?);
    Ok(attrs)
}

/// Replaces nulls and NaNs in every non-flag variable with its `_FillValue`
/// (or [`DEFAULT_FILL_VALUE`]) and stores it as `f64`.
///
/// Coordinates and non-numeric variables are left untouched. Returns the
/// names of the normalized variables.
pub fn normalize_fill_values(dataset: &mut TimeSeriesDataset) -> Result<Vec<String>> {
    let mut normalized = Vec::new();

    for name in dataset.variable_names() {
        if is_coordinate(&name) || dataset.is_flag_variable(&name) {
            continue;
        }
        if !dataset.column(&name)?.dtype().is_primitive_numeric() {
            debug!(variable = %name, "skipping fill normalization for non-numeric variable");
            continue;
        }

        let fill = dataset.fill_value(&name).unwrap_or(DEFAULT_FILL_VALUE);
        let filled: Vec<f64> = dataset
            .values(&name)?
            .into_iter()
            .map(|value| match value {
                Some(v) if !v.is_nan() => v,
                _ => fill,
            })
            .collect();

        let mut attrs = dataset.attributes(&name).cloned().unwrap_or_default();
        attrs.insert(FILL_VALUE_ATTR.to_string(), AttrValue::Float(fill));
        dataset.put_variable(Series::new(name.as_str().into(), filled), attrs)?;
        normalized.push(name);
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::is_flag_of;

    #[test]
    fn flag_names_match_their_source_only() {
        assert!(is_flag_of("temperature", "temperature_qc"));
        assert!(is_flag_of("temperature", "temperature_qartod_spike_test"));
        assert!(!is_flag_of("temperature", "temperature"));
        assert!(!is_flag_of("temp", "temperature_qartod_spike_test"));
        assert!(!is_flag_of("temperature", "temperature_qc_raw"));
    }
}
