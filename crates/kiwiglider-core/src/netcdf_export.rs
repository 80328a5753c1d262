// crates/kiwiglider-core/src/netcdf_export.rs

// CF NetCDF export of a `TimeSeriesDataset`, one `time` dimension.

use std::path::Path;

use kiwiglider_qartod::FLAG_FILL_VALUE;
use polars::prelude::*;
use tracing::{debug, info};

use crate::dataset::{AttrValue, Attributes, TimeSeriesDataset, DEFAULT_FILL_VALUE, FILL_VALUE_ATTR, TIME};
use crate::error::Result;

fn to_netcdf_value(value: &AttrValue) -> netcdf::AttributeValue {
    match value {
        AttrValue::Int(v) => (*v).into(),
        AttrValue::Float(v) => (*v).into(),
        AttrValue::Text(v) => v.as_str().into(),
        AttrValue::IntList(v) => v.clone().into(),
        AttrValue::FloatList(v) => v.clone().into(),
    }
}

fn put_attributes(variable: &mut netcdf::VariableMut<'_>, attrs: Option<&Attributes>) -> Result<()> {
    for (key, value) in attrs.into_iter().flatten() {
        if key == FILL_VALUE_ATTR {
            continue;
        }
        variable.put_attribute(key, to_netcdf_value(value))?;
    }
    Ok(())
}

/// Writes every numeric variable: flag variables as bytes with the flag
/// fill value, everything else as doubles with its declared fill value.
pub fn write_netcdf(dataset: &TimeSeriesDataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = netcdf::create(path)?;
    file.add_dimension(TIME, dataset.height())?;

    for name in dataset.variable_names() {
        let column = dataset.column(&name)?;
        if !column.dtype().is_primitive_numeric() {
            debug!(variable = %name, dtype = %column.dtype(), "skipping non-numeric variable");
            continue;
        }
        let attrs = dataset.attributes(&name);

        if dataset.is_flag_variable(&name) {
            let series = column.as_materialized_series().cast(&DataType::Int8)?;
            let values: Vec<i8> = series
                .i8()?
                .into_iter()
                .map(|value| value.unwrap_or(FLAG_FILL_VALUE))
                .collect();
            let mut variable = file.add_variable::<i8>(&name, &[TIME])?;
            variable.set_fill_value(FLAG_FILL_VALUE)?;
            put_attributes(&mut variable, attrs)?;
            variable.put_values(&values, ..)?;
        } else {
            let fill = dataset.fill_value(&name).unwrap_or(DEFAULT_FILL_VALUE);
            let values: Vec<f64> = dataset
                .values(&name)?
                .into_iter()
                .map(|value| value.filter(|v| !v.is_nan()).unwrap_or(fill))
                .collect();
            let mut variable = file.add_variable::<f64>(&name, &[TIME])?;
            if name != TIME {
                variable.set_fill_value(fill)?;
            }
            put_attributes(&mut variable, attrs)?;
            variable.put_values(&values, ..)?;
        }
    }

    for (key, value) in dataset.global_attributes() {
        file.add_attribute(key, to_netcdf_value(value))?;
    }
    info!(path = %path.display(), rows = dataset.height(), "wrote NetCDF file");
    Ok(())
}
