// crates/kiwiglider-qartod/src/errors.rs

use thiserror::Error;

use crate::params::TestKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QartodError {
    #[error("{test} parameter `{parameter}` is invalid: {reason}")]
    InvalidParameter {
        test: TestKind,
        parameter: &'static str,
        reason: String,
    },

    #[error("{test} received {values} values but {times} timestamps")]
    LengthMismatch {
        test: TestKind,
        values: usize,
        times: usize,
    },

    #[error("cannot aggregate result vectors of unequal length ({expected} vs {found})")]
    UnequalResults { expected: usize, found: usize },

    #[error("aggregation requires at least one test result")]
    NoResults,

    #[error("aggregation precedence must rank every flag exactly once: {0}")]
    InvalidPrecedence(String),
}

impl QartodError {
    pub(crate) fn invalid(test: TestKind, parameter: &'static str, reason: impl Into<String>) -> Self {
        QartodError::InvalidParameter {
            test,
            parameter,
            reason: reason.into(),
        }
    }
}
