// crates/kiwiglider-core/src/qc/evaluate.rs

use std::cmp::Ordering;

use kiwiglider_qartod::{
    archive_aggregate_flags, run_test, AggregationRule, QartodFlag, QartodSuite, QartodTest,
};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::QartodConfig;
use crate::dataset::{TimeSeriesDataset, DEPTH, LATITUDE, LONGITUDE};
use crate::error::{PipelineError, Result};
use crate::qc::attributes::{aggregate_flag_name, test_flag_name};
use crate::qc::merge::{RESULT_LAT, RESULT_LON, RESULT_TIME, RESULT_Z};
use crate::qc::report::VariableIssue;

#[derive(Debug, Clone, PartialEq)]
pub enum ResultKind {
    Test(QartodTest),
    /// Aggregate over the listed tests.
    Aggregate(Vec<QartodTest>),
}

/// One flag column of an evaluation frame and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResult {
    pub stream_id: String,
    pub column: String,
    pub kind: ResultKind,
}

/// Results of running a QARTOD configuration over a dataset.
///
/// `frame` is time-ordered and holds its own `time`, `z`, `lat` and `lon`
/// copies next to one `i8` column per entry in `results`. Within a stream the
/// test columns come first, in evaluation order, followed by the aggregate.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub frame: DataFrame,
    pub results: Vec<CollectedResult>,
    pub issues: Vec<VariableIssue>,
}

/// Row order that sorts the time axis; missing timestamps sort last and ties
/// keep their original order.
fn time_order(times: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| match (times[a].is_nan(), times[b].is_nan()) {
        (false, false) => times[a].total_cmp(&times[b]),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    });
    order
}

fn coordinate_copy(
    dataset: &TimeSeriesDataset,
    source: &str,
    name: &str,
    order: &[usize],
) -> Result<Series> {
    let values: Vec<Option<f64>> = if dataset.has_variable(source) {
        let raw = dataset.values(source)?;
        order.iter().map(|&idx| raw[idx]).collect()
    } else {
        vec![None; order.len()]
    };
    Ok(Series::new(name.into(), values))
}

fn flag_series(name: &str, flags: &[QartodFlag]) -> Series {
    let values: Vec<i8> = flags.iter().map(|flag| flag.value()).collect();
    Series::new(name.into(), values)
}

fn evaluate_variable(
    dataset: &TimeSeriesDataset,
    variable: &str,
    suite: &QartodSuite,
    order: &[usize],
    times: &[f64],
    rule: &AggregationRule,
) -> Result<Vec<(CollectedResult, Series)>> {
    let dtype = dataset.column(variable)?.dtype().clone();
    if !dtype.is_primitive_numeric() {
        return Err(PipelineError::Validation(format!(
            "'{variable}' is {dtype}, QARTOD tests need numeric values"
        )));
    }

    // values equal to the declared fill are gaps, not observations
    let fill = dataset.fill_value(variable);
    let raw = dataset.values(variable)?;
    let values: Vec<Option<f64>> = order
        .iter()
        .map(|&idx| raw[idx].filter(|value| Some(*value) != fill))
        .collect();

    let tests = suite.tests();
    let mut outputs = Vec::with_capacity(tests.len() + 1);
    let mut all_flags = Vec::with_capacity(tests.len());

    for test in &tests {
        let flags = run_test(test, &values, times)?;
        let column = test_flag_name(variable, test.kind());
        debug!(variable = %variable, test = %test.kind(), "evaluated QARTOD test");
        outputs.push((
            CollectedResult {
                stream_id: variable.to_string(),
                column: column.clone(),
                kind: ResultKind::Test(test.clone()),
            },
            flag_series(&column, &flags),
        ));
        all_flags.push(flags);
    }

    let slices: Vec<&[QartodFlag]> = all_flags.iter().map(Vec::as_slice).collect();
    let aggregate = rule.combine(&slices)?;
    let column = aggregate_flag_name(variable);
    outputs.push((
        CollectedResult {
            stream_id: variable.to_string(),
            column: column.clone(),
            kind: ResultKind::Aggregate(tests),
        },
        Series::new(column.as_str().into(), archive_aggregate_flags(&aggregate)),
    ));

    Ok(outputs)
}

/// Runs every configured test, variable by variable.
///
/// A variable missing from the dataset, or one whose evaluation fails, is
/// recorded as an issue and skipped; the remaining variables still run.
pub fn evaluate(
    dataset: &TimeSeriesDataset,
    config: &QartodConfig,
    rule: &AggregationRule,
) -> Result<Evaluation> {
    let times = dataset.times()?;
    let order = time_order(&times);
    let sorted_times: Vec<f64> = order.iter().map(|&idx| times[idx]).collect();

    let mut columns: Vec<Column> = vec![
        Series::new(RESULT_TIME.into(), sorted_times.clone()).into(),
        coordinate_copy(dataset, DEPTH, RESULT_Z, &order)?.into(),
        coordinate_copy(dataset, LATITUDE, RESULT_LAT, &order)?.into(),
        coordinate_copy(dataset, LONGITUDE, RESULT_LON, &order)?.into(),
    ];
    let mut results = Vec::new();
    let mut issues = Vec::new();

    for variable in config.variables() {
        let Some(suite) = config.suite(variable) else {
            continue;
        };
        if !dataset.has_variable(variable) {
            warn!(variable = %variable, "variable configured for QC is not in the dataset");
            issues.push(VariableIssue::MissingVariable {
                variable: variable.to_string(),
            });
            continue;
        }

        match evaluate_variable(dataset, variable, suite, &order, &sorted_times, rule) {
            Ok(outputs) => {
                for (result, series) in outputs {
                    columns.push(series.into());
                    results.push(result);
                }
            }
            Err(err) => {
                warn!(variable = %variable, error = %err, "QC evaluation failed, skipping variable");
                issues.push(VariableIssue::EvaluationFailed {
                    variable: variable.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(Evaluation {
        frame: DataFrame::new(columns)?,
        results,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::time_order;

    #[test]
    fn time_order_is_stable_with_gaps_last() {
        let order = time_order(&[3.0, f64::NAN, 1.0, 3.0, 2.0]);
        assert_eq!(order, vec![2, 4, 0, 3, 1]);
    }
}
