// crates/kiwiglider-qartod/src/params.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::QartodError;

/// The fixed set of per-variable QARTOD tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TestKind {
    #[serde(rename = "gross_range_test", alias = "gross_range")]
    GrossRange,
    #[serde(rename = "spike_test", alias = "spike")]
    Spike,
    #[serde(rename = "rate_of_change_test", alias = "rate_of_change")]
    RateOfChange,
    #[serde(rename = "flat_line_test", alias = "flat_line")]
    FlatLine,
}

impl TestKind {
    /// Evaluation order within one variable.
    pub const ALL: [TestKind; 4] = [
        TestKind::GrossRange,
        TestKind::Spike,
        TestKind::RateOfChange,
        TestKind::FlatLine,
    ];

    /// Name used in configuration keys and flag variable names.
    pub fn method_name(&self) -> &'static str {
        match self {
            TestKind::GrossRange => "gross_range_test",
            TestKind::Spike => "spike_test",
            TestKind::RateOfChange => "rate_of_change_test",
            TestKind::FlatLine => "flat_line_test",
        }
    }

    pub fn standard_name(&self) -> &'static str {
        match self {
            TestKind::GrossRange => "gross_range_test_quality_flag",
            TestKind::Spike => "spike_test_quality_flag",
            TestKind::RateOfChange => "rate_of_change_test_quality_flag",
            TestKind::FlatLine => "flat_line_test_quality_flag",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            TestKind::GrossRange => "Gross Range Test Quality Flag",
            TestKind::Spike => "Spike Test Quality Flag",
            TestKind::RateOfChange => "Rate of Change Test Quality Flag",
            TestKind::FlatLine => "Flat Line Test Quality Flag",
        }
    }

    /// Whether the test looks at neighbouring samples in time.
    pub fn needs_time(&self) -> bool {
        matches!(self, TestKind::RateOfChange | TestKind::FlatLine)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for TestKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let stem = normalized.strip_suffix("_test").unwrap_or(&normalized);
        match stem {
            "gross_range" => Ok(TestKind::GrossRange),
            "spike" => Ok(TestKind::Spike),
            "rate_of_change" => Ok(TestKind::RateOfChange),
            "flat_line" => Ok(TestKind::FlatLine),
            _ => Err(format!("unknown QARTOD test '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrossRangeParams {
    pub fail_span: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspect_span: Option<[f64; 2]>,
}

impl GrossRangeParams {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            fail_span: [min, max],
            suspect_span: None,
        }
    }

    pub fn validate(&self) -> Result<(), QartodError> {
        check_span(TestKind::GrossRange, "fail_span", self.fail_span)?;
        if let Some(suspect) = self.suspect_span {
            check_span(TestKind::GrossRange, "suspect_span", suspect)?;
            if suspect[0] < self.fail_span[0] || suspect[1] > self.fail_span[1] {
                return Err(QartodError::invalid(
                    TestKind::GrossRange,
                    "suspect_span",
                    format!(
                        "[{}, {}] must lie within fail_span [{}, {}]",
                        suspect[0], suspect[1], self.fail_span[0], self.fail_span[1]
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeMethod {
    #[default]
    Average,
    Differential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpikeParams {
    pub suspect_threshold: f64,
    pub fail_threshold: f64,
    #[serde(default, skip_serializing_if = "is_default_method")]
    pub method: SpikeMethod,
}

fn is_default_method(method: &SpikeMethod) -> bool {
    *method == SpikeMethod::default()
}

impl SpikeParams {
    pub fn validate(&self) -> Result<(), QartodError> {
        check_threshold(TestKind::Spike, "suspect_threshold", self.suspect_threshold)?;
        check_threshold(TestKind::Spike, "fail_threshold", self.fail_threshold)?;
        check_ordered(
            TestKind::Spike,
            self.suspect_threshold,
            self.fail_threshold,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateOfChangeParams {
    /// Maximum allowed change per second.
    pub threshold: f64,
}

impl RateOfChangeParams {
    pub fn validate(&self) -> Result<(), QartodError> {
        check_threshold(TestKind::RateOfChange, "threshold", self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlatLineParams {
    /// Seconds of unchanged data before a sample is suspect.
    pub suspect_threshold: f64,
    /// Seconds of unchanged data before a sample fails.
    pub fail_threshold: f64,
    pub tolerance: f64,
}

impl FlatLineParams {
    pub fn validate(&self) -> Result<(), QartodError> {
        check_threshold(TestKind::FlatLine, "suspect_threshold", self.suspect_threshold)?;
        check_threshold(TestKind::FlatLine, "fail_threshold", self.fail_threshold)?;
        check_threshold(TestKind::FlatLine, "tolerance", self.tolerance)?;
        check_ordered(
            TestKind::FlatLine,
            self.suspect_threshold,
            self.fail_threshold,
        )
    }
}

/// One configured test together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum QartodTest {
    GrossRange(GrossRangeParams),
    Spike(SpikeParams),
    RateOfChange(RateOfChangeParams),
    FlatLine(FlatLineParams),
}

impl QartodTest {
    pub fn kind(&self) -> TestKind {
        match self {
            QartodTest::GrossRange(_) => TestKind::GrossRange,
            QartodTest::Spike(_) => TestKind::Spike,
            QartodTest::RateOfChange(_) => TestKind::RateOfChange,
            QartodTest::FlatLine(_) => TestKind::FlatLine,
        }
    }

    pub fn validate(&self) -> Result<(), QartodError> {
        match self {
            QartodTest::GrossRange(params) => params.validate(),
            QartodTest::Spike(params) => params.validate(),
            QartodTest::RateOfChange(params) => params.validate(),
            QartodTest::FlatLine(params) => params.validate(),
        }
    }

    /// Parameters rendered as compact JSON, used for provenance attributes.
    pub fn config_json(&self) -> String {
        let rendered = match self {
            QartodTest::GrossRange(params) => serde_json::to_string(params),
            QartodTest::Spike(params) => serde_json::to_string(params),
            QartodTest::RateOfChange(params) => serde_json::to_string(params),
            QartodTest::FlatLine(params) => serde_json::to_string(params),
        };
        // plain structs of floats always serialize
        rendered.unwrap_or_default()
    }
}

/// The tests configured for one variable, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QartodSuite {
    #[serde(default, alias = "gross_range", skip_serializing_if = "Option::is_none")]
    pub gross_range_test: Option<GrossRangeParams>,
    #[serde(default, alias = "spike", skip_serializing_if = "Option::is_none")]
    pub spike_test: Option<SpikeParams>,
    #[serde(default, alias = "rate_of_change", skip_serializing_if = "Option::is_none")]
    pub rate_of_change_test: Option<RateOfChangeParams>,
    #[serde(default, alias = "flat_line", skip_serializing_if = "Option::is_none")]
    pub flat_line_test: Option<FlatLineParams>,
}

impl QartodSuite {
    /// Sets a test, replacing any previous test of the same kind.
    pub fn insert(&mut self, test: QartodTest) {
        match test {
            QartodTest::GrossRange(params) => self.gross_range_test = Some(params),
            QartodTest::Spike(params) => self.spike_test = Some(params),
            QartodTest::RateOfChange(params) => self.rate_of_change_test = Some(params),
            QartodTest::FlatLine(params) => self.flat_line_test = Some(params),
        }
    }

    pub fn get(&self, kind: TestKind) -> Option<QartodTest> {
        match kind {
            TestKind::GrossRange => self.gross_range_test.clone().map(QartodTest::GrossRange),
            TestKind::Spike => self.spike_test.clone().map(QartodTest::Spike),
            TestKind::RateOfChange => self
                .rate_of_change_test
                .clone()
                .map(QartodTest::RateOfChange),
            TestKind::FlatLine => self.flat_line_test.clone().map(QartodTest::FlatLine),
        }
    }

    /// Configured tests in evaluation order.
    pub fn tests(&self) -> Vec<QartodTest> {
        TestKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind))
            .collect()
    }

    pub fn kinds(&self) -> Vec<TestKind> {
        self.tests().iter().map(QartodTest::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.tests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every test configured in `other` over this suite.
    pub fn overwrite_with(&mut self, other: &QartodSuite) {
        for test in other.tests() {
            self.insert(test);
        }
    }

    pub fn validate(&self) -> Result<(), QartodError> {
        for test in self.tests() {
            test.validate()?;
        }
        Ok(())
    }
}

fn check_span(test: TestKind, parameter: &'static str, span: [f64; 2]) -> Result<(), QartodError> {
    if !span[0].is_finite() || !span[1].is_finite() {
        return Err(QartodError::invalid(test, parameter, "bounds must be finite"));
    }
    if span[0] > span[1] {
        return Err(QartodError::invalid(
            test,
            parameter,
            format!("minimum {} exceeds maximum {}", span[0], span[1]),
        ));
    }
    Ok(())
}

fn check_threshold(test: TestKind, parameter: &'static str, value: f64) -> Result<(), QartodError> {
    if !value.is_finite() {
        return Err(QartodError::invalid(test, parameter, "must be finite"));
    }
    if value < 0.0 {
        return Err(QartodError::invalid(
            test,
            parameter,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(())
}

fn check_ordered(test: TestKind, suspect: f64, fail: f64) -> Result<(), QartodError> {
    if suspect > fail {
        return Err(QartodError::invalid(
            test,
            "suspect_threshold",
            format!("{suspect} exceeds fail_threshold {fail}"),
        ));
    }
    Ok(())
}
