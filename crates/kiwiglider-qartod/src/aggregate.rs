// crates/kiwiglider-qartod/src/aggregate.rs

use crate::errors::QartodError;
use crate::flags::QartodFlag;

/// Precedence used to combine several test results into one flag per sample.
///
/// The order runs from lowest to highest precedence: at each sample the
/// highest-ranked flag reported by any test wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRule {
    precedence: Vec<QartodFlag>,
}

impl Default for AggregationRule {
    /// MISSING < UNKNOWN < GOOD < SUSPECT < FAIL, the published QARTOD rule.
    fn default() -> Self {
        Self {
            precedence: vec![
                QartodFlag::Missing,
                QartodFlag::Unknown,
                QartodFlag::Good,
                QartodFlag::Suspect,
                QartodFlag::Fail,
            ],
        }
    }
}

impl AggregationRule {
    pub fn new(precedence: Vec<QartodFlag>) -> Result<Self, QartodError> {
        for flag in QartodFlag::ALL {
            let occurrences = precedence.iter().filter(|f| **f == flag).count();
            if occurrences != 1 {
                return Err(QartodError::InvalidPrecedence(format!(
                    "{flag} appears {occurrences} times"
                )));
            }
        }
        if precedence.len() != QartodFlag::ALL.len() {
            return Err(QartodError::InvalidPrecedence(format!(
                "expected {} flags, got {}",
                QartodFlag::ALL.len(),
                precedence.len()
            )));
        }
        Ok(Self { precedence })
    }

    pub fn precedence(&self) -> &[QartodFlag] {
        &self.precedence
    }

    pub fn rank(&self, flag: QartodFlag) -> usize {
        self.precedence
            .iter()
            .position(|candidate| *candidate == flag)
            .unwrap_or(0)
    }

    /// Combines equally long flag vectors sample by sample.
    pub fn combine(&self, results: &[&[QartodFlag]]) -> Result<Vec<QartodFlag>, QartodError> {
        let Some(first) = results.first() else {
            return Err(QartodError::NoResults);
        };
        let len = first.len();
        if let Some(other) = results.iter().find(|r| r.len() != len) {
            return Err(QartodError::UnequalResults {
                expected: len,
                found: other.len(),
            });
        }

        let lowest = self.precedence[0];
        let combined = (0..len)
            .map(|idx| {
                results
                    .iter()
                    .map(|flags| flags[idx])
                    .fold(lowest, |best, flag| {
                        if self.rank(flag) > self.rank(best) {
                            flag
                        } else {
                            best
                        }
                    })
            })
            .collect();

        Ok(combined)
    }
}

/// Aggregates test results with the default QARTOD precedence.
pub fn aggregate(results: &[&[QartodFlag]]) -> Result<Vec<QartodFlag>, QartodError> {
    AggregationRule::default().combine(results)
}
