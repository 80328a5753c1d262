// crates/kiwiglider-core/src/qc/mod.rs

// QARTOD annotation of a timeseries dataset.
//
// `QcEngine::annotate` evaluates the configured tests per variable,
// aggregates them, merges the flag variables back onto the dataset's own
// time axis, assigns flag attributes, cross-references them from the source
// variables and finally normalizes fill values. The input dataset is never
// modified.

pub mod attributes;
pub mod evaluate;
pub mod merge;
pub mod report;

use std::collections::BTreeMap;

use kiwiglider_qartod::AggregationRule;
use tracing::{debug, info};

use crate::config::QartodConfig;
use crate::dataset::TimeSeriesDataset;
use crate::error::Result;

pub use attributes::{
    aggregate_flag_attributes, aggregate_flag_name, clear_flags, is_flag_of,
    normalize_fill_values, test_flag_attributes, test_flag_name,
};
pub use evaluate::{evaluate, CollectedResult, Evaluation, ResultKind};
pub use merge::merge_results;
pub use report::{AnnotatedVariable, QcReport, VariableIssue};

#[derive(Debug, Clone)]
pub struct QcOutcome {
    pub dataset: TimeSeriesDataset,
    pub report: QcReport,
}

#[derive(Debug, Clone, Default)]
pub struct QcEngine {
    rule: AggregationRule,
}

impl QcEngine {
    pub fn new(rule: AggregationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &AggregationRule {
        &self.rule
    }

    pub fn annotate(
        &self,
        dataset: &TimeSeriesDataset,
        config: &QartodConfig,
    ) -> Result<QcOutcome> {
        config.validate()?;
        info!(
            variables = config.variables().len(),
            tests = config.test_count(),
            "running QARTOD tests"
        );

        let evaluation = evaluate(dataset, config, &self.rule)?;

        // flags from tests no longer configured must not survive a re-run
        let mut base = dataset.clone();
        let mut streams: Vec<&str> = evaluation
            .results
            .iter()
            .map(|result| result.stream_id.as_str())
            .collect();
        streams.dedup();
        for stream in streams {
            clear_flags(&mut base, stream)?;
        }
        let mut merged = merge_results(&base, &evaluation.frame)?;

        let mut report = QcReport {
            annotated: Vec::new(),
            issues: evaluation.issues,
        };
        let mut pending_tests: Vec<String> = Vec::new();

        for result in &evaluation.results {
            debug!(variable = %result.column, "adding flag variable to dataset");
            let attrs = match &result.kind {
                ResultKind::Test(test) => test_flag_attributes(&result.stream_id, test),
                ResultKind::Aggregate(tests) => aggregate_flag_attributes(&result.stream_id, tests)?,
            };
            *merged.attributes_mut(&result.column) = attrs;
            merged.append_ancillary(&result.stream_id, &result.column);

            match result.kind {
                ResultKind::Test(_) => pending_tests.push(result.column.clone()),
                ResultKind::Aggregate(_) => {
                    let mut counts = BTreeMap::new();
                    for value in merged.values(&result.column)?.into_iter().flatten() {
                        *counts.entry(value as i8).or_insert(0usize) += 1;
                    }
                    report.annotated.push(AnnotatedVariable {
                        variable: result.stream_id.clone(),
                        test_flags: std::mem::take(&mut pending_tests),
                        aggregate_flag: result.column.clone(),
                        aggregate_counts: counts,
                    });
                }
            }
        }

        let normalized = normalize_fill_values(&mut merged)?;
        info!(
            annotated = report.annotated.len(),
            issues = report.issues.len(),
            normalized = normalized.len(),
            "QARTOD annotation complete"
        );

        Ok(QcOutcome {
            dataset: merged,
            report,
        })
    }
}

/// Annotates with the default QARTOD aggregation rule.
pub fn annotate(dataset: &TimeSeriesDataset, config: &QartodConfig) -> Result<QcOutcome> {
    QcEngine::default().annotate(dataset, config)
}
