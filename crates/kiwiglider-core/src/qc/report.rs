// crates/kiwiglider-core/src/qc/report.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Flag variables produced for one source variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedVariable {
    pub variable: String,
    pub test_flags: Vec<String>,
    pub aggregate_flag: String,
    /// Occurrences of each value in the merged aggregate flag variable.
    pub aggregate_counts: BTreeMap<i8, usize>,
}

impl AnnotatedVariable {
    pub fn flag_variables(&self) -> impl Iterator<Item = &str> {
        self.test_flags
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.aggregate_flag.as_str()))
    }
}

/// A configured variable that could not be annotated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableIssue {
    MissingVariable { variable: String },
    EvaluationFailed { variable: String, reason: String },
}

impl VariableIssue {
    pub fn variable(&self) -> &str {
        match self {
            VariableIssue::MissingVariable { variable } => variable,
            VariableIssue::EvaluationFailed { variable, .. } => variable,
        }
    }
}

impl fmt::Display for VariableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableIssue::MissingVariable { variable } => {
                write!(f, "{variable}: configured for QC but not in dataset")
            }
            VariableIssue::EvaluationFailed { variable, reason } => {
                write!(f, "{variable}: evaluation failed: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QcReport {
    pub annotated: Vec<AnnotatedVariable>,
    pub issues: Vec<VariableIssue>,
}

impl QcReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn annotated_variable(&self, variable: &str) -> Option<&AnnotatedVariable> {
        self.annotated.iter().find(|entry| entry.variable == variable)
    }

    pub fn flag_variables(&self) -> Vec<&str> {
        self.annotated
            .iter()
            .flat_map(AnnotatedVariable::flag_variables)
            .collect()
    }
}
