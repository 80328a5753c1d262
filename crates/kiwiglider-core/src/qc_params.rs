// crates/kiwiglider-core/src/qc_params.rs

// Derives QARTOD test parameters from variable bounds and resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kiwiglider_qartod::{
    FlatLineParams, GrossRangeParams, QartodTest, RateOfChangeParams, SpikeMethod, SpikeParams,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{QartodConfig, VariableSpec};
use crate::error::{PipelineError, Result};

pub const SPIKE_SUSPECT_MULTIPLIER: f64 = 100.0;
pub const SPIKE_FAIL_MULTIPLIER: f64 = 200.0;
pub const FLAT_LINE_SUSPECT_SECONDS: f64 = 150.0;
pub const FLAT_LINE_FAIL_SECONDS: f64 = 300.0;

pub const BASIC_RATE_OF_CHANGE_MULTIPLIER: f64 = 100.0;
pub const BASIC_FLAT_LINE_TOLERANCE_MULTIPLIER: f64 = 2.0;
pub const LEGACY_RATE_OF_CHANGE_MULTIPLIER: f64 = 2.5;
pub const LEGACY_FLAT_LINE_TOLERANCE_MULTIPLIER: f64 = 1.0;

/// Multipliers turning a variable's resolution into test thresholds.
///
/// Two sets are in use: [`DerivationPolicy::BASIC`] and the older
/// [`DerivationPolicy::LEGACY`]. They differ only in the rate-of-change
/// threshold and the flat-line tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivationPolicy {
    pub spike_suspect_multiplier: f64,
    pub spike_fail_multiplier: f64,
    pub rate_of_change_multiplier: f64,
    pub flat_line_suspect_seconds: f64,
    pub flat_line_fail_seconds: f64,
    pub flat_line_tolerance_multiplier: f64,
}

impl DerivationPolicy {
    pub const BASIC: DerivationPolicy = DerivationPolicy {
        spike_suspect_multiplier: SPIKE_SUSPECT_MULTIPLIER,
        spike_fail_multiplier: SPIKE_FAIL_MULTIPLIER,
        rate_of_change_multiplier: BASIC_RATE_OF_CHANGE_MULTIPLIER,
        flat_line_suspect_seconds: FLAT_LINE_SUSPECT_SECONDS,
        flat_line_fail_seconds: FLAT_LINE_FAIL_SECONDS,
        flat_line_tolerance_multiplier: BASIC_FLAT_LINE_TOLERANCE_MULTIPLIER,
    };

    pub const LEGACY: DerivationPolicy = DerivationPolicy {
        spike_suspect_multiplier: SPIKE_SUSPECT_MULTIPLIER,
        spike_fail_multiplier: SPIKE_FAIL_MULTIPLIER,
        rate_of_change_multiplier: LEGACY_RATE_OF_CHANGE_MULTIPLIER,
        flat_line_suspect_seconds: FLAT_LINE_SUSPECT_SECONDS,
        flat_line_fail_seconds: FLAT_LINE_FAIL_SECONDS,
        flat_line_tolerance_multiplier: LEGACY_FLAT_LINE_TOLERANCE_MULTIPLIER,
    };

    /// The tests derivable from one variable's declared bounds.
    ///
    /// Nothing is derived without both bounds; the resolution-based tests
    /// additionally need a resolution.
    pub fn derive(&self, spec: &VariableSpec) -> Vec<QartodTest> {
        let (Some(min), Some(max)) = (spec.valid_min, spec.valid_max) else {
            return Vec::new();
        };

        let mut tests = vec![QartodTest::GrossRange(GrossRangeParams::new(min, max))];
        if let Some(res) = spec.resolution {
            tests.push(QartodTest::Spike(SpikeParams {
                suspect_threshold: res * self.spike_suspect_multiplier,
                fail_threshold: res * self.spike_fail_multiplier,
                method: SpikeMethod::Average,
            }));
            tests.push(QartodTest::RateOfChange(RateOfChangeParams {
                threshold: res * self.rate_of_change_multiplier,
            }));
            tests.push(QartodTest::FlatLine(FlatLineParams {
                suspect_threshold: self.flat_line_suspect_seconds,
                fail_threshold: self.flat_line_fail_seconds,
                tolerance: res * self.flat_line_tolerance_multiplier,
            }));
        }
        tests
    }
}

impl Default for DerivationPolicy {
    fn default() -> Self {
        DerivationPolicy::BASIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyPreset {
    #[default]
    Basic,
    Legacy,
}

impl PolicyPreset {
    pub fn policy(self) -> DerivationPolicy {
        match self {
            PolicyPreset::Basic => DerivationPolicy::BASIC,
            PolicyPreset::Legacy => DerivationPolicy::LEGACY,
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyPreset::Basic => f.write_str("basic"),
            PolicyPreset::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for PolicyPreset {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(PolicyPreset::Basic),
            "legacy" => Ok(PolicyPreset::Legacy),
            other => Err(PipelineError::Validation(format!(
                "derivation policy must be 'basic' or 'legacy', got '{other}'"
            ))),
        }
    }
}

/// Derives tests for every variable that declares bounds.
pub fn derive_qartod_tests(
    variables: &BTreeMap<String, VariableSpec>,
    policy: &DerivationPolicy,
) -> QartodConfig {
    let mut config = QartodConfig::default();
    for (name, spec) in variables {
        let tests = policy.derive(spec);
        if tests.is_empty() {
            debug!(variable = %name, "no valid range declared, no tests derived");
            continue;
        }
        debug!(variable = %name, tests = tests.len(), "derived QARTOD tests");
        for test in tests {
            config.insert(name, test);
        }
    }
    config
}

/// Copies caller-supplied tests over `config`, replacing per (variable, test).
pub fn apply_overrides(config: &mut QartodConfig, overrides: &QartodConfig) {
    for (variable, stream) in &overrides.streams {
        for test in stream.qartod.tests() {
            debug!(variable = %variable, test = %test.kind(), "overriding QARTOD test");
            config.insert(variable, test);
        }
    }
}

/// Derived tests with overrides applied, validated.
pub fn build_qartod_config(
    variables: &BTreeMap<String, VariableSpec>,
    policy: &DerivationPolicy,
    overrides: Option<&QartodConfig>,
) -> Result<QartodConfig> {
    let mut config = derive_qartod_tests(variables, policy);
    if let Some(overrides) = overrides {
        apply_overrides(&mut config, overrides);
    }
    config.validate()?;
    Ok(config)
}
