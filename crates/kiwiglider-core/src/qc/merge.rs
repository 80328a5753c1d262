// crates/kiwiglider-core/src/qc/merge.rs

use std::collections::{HashMap, VecDeque};

use kiwiglider_qartod::FLAG_FILL_VALUE;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::dataset::{is_coordinate, Attributes, TimeSeriesDataset, TIME};
use crate::error::{PipelineError, Result};

pub const RESULT_TIME: &str = "time";
pub const RESULT_Z: &str = "z";
pub const RESULT_LAT: &str = "lat";
pub const RESULT_LON: &str = "lon";

/// Coordinate copies an evaluation frame carries beside its flag columns.
pub const RESULT_COORDINATES: [&str; 4] = [RESULT_TIME, RESULT_Z, RESULT_LAT, RESULT_LON];

fn time_key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn f64_values(column: &Column) -> Result<Vec<f64>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

/// For each dataset row, the result row sharing its timestamp.
///
/// Repeated timestamps pair up in order of occurrence. Rows left without a
/// partner map to `None`.
fn align_rows(dataset_times: &[f64], result_times: &[f64]) -> (Vec<Option<usize>>, usize) {
    let mut by_time: HashMap<u64, VecDeque<usize>> = HashMap::new();
    for (row, time) in result_times.iter().enumerate() {
        by_time.entry(time_key(*time)).or_default().push_back(row);
    }

    let mapping = dataset_times
        .iter()
        .map(|time| {
            by_time
                .get_mut(&time_key(*time))
                .and_then(VecDeque::pop_front)
        })
        .collect();
    let unmatched_results = by_time.values().map(VecDeque::len).sum();

    (mapping, unmatched_results)
}

/// Merges the flag columns of an evaluation frame into a copy of `dataset`.
///
/// The frame's coordinate copies are discarded and its rows are re-indexed
/// onto the dataset's own time axis, so the dataset's coordinates come out
/// exactly as they went in. Flag variables that already exist are replaced;
/// their attributes are reset and left for the caller to assign.
pub fn merge_results(dataset: &TimeSeriesDataset, results: &DataFrame) -> Result<TimeSeriesDataset> {
    let result_time = results.column(RESULT_TIME).map_err(|_| {
        PipelineError::Validation(format!("evaluation frame has no '{RESULT_TIME}' column"))
    })?;
    let result_times = f64_values(result_time)?;
    let dataset_times = f64_values(dataset.column(TIME)?)?;

    let (mapping, unmatched_results) = align_rows(&dataset_times, &result_times);
    let unmatched_rows = mapping.iter().filter(|row| row.is_none()).count();
    if unmatched_rows > 0 {
        warn!(rows = unmatched_rows, "dataset rows without QC results receive the flag fill value");
    }
    if unmatched_results > 0 {
        warn!(rows = unmatched_results, "QC results with no matching dataset time were dropped");
    }

    let mut merged = dataset.clone();
    for column in results.get_columns() {
        let name = column.name().as_str();
        if RESULT_COORDINATES.contains(&name) || is_coordinate(name) {
            debug!(column = %name, "discarding coordinate copy from evaluation frame");
            continue;
        }

        let flags = column.as_materialized_series().cast(&DataType::Int8)?;
        let flags = flags.i8()?;
        let aligned: Vec<i8> = mapping
            .iter()
            .map(|row| row.and_then(|idx| flags.get(idx)).unwrap_or(FLAG_FILL_VALUE))
            .collect();

        merged.drop_variable(name)?;
        merged.put_variable(Series::new(name.into(), aligned), Attributes::new())?;
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::align_rows;

    #[test]
    fn repeated_timestamps_pair_in_order() {
        let (mapping, unmatched) = align_rows(&[1.0, 2.0, 2.0, 3.0], &[2.0, 1.0, 2.0]);
        assert_eq!(mapping, vec![Some(1), Some(0), Some(2), None]);
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn unmatched_results_are_counted() {
        let (mapping, unmatched) = align_rows(&[1.0], &[1.0, 5.0, f64::NAN]);
        assert_eq!(mapping, vec![Some(0)]);
        assert_eq!(unmatched, 2);
    }
}
