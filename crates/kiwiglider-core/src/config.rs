// crates/kiwiglider-core/src/config.rs

// The deployment configuration artifact.
//
// Written by the metadata builder, read by the pipeline driver and the QC
// engine. Stored as TOML with the tables `metadata`, `glider_devices`,
// `netcdf_variables`, `profile_variables` and, optionally, `qartod_tests`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use kiwiglider_qartod::{QartodSuite, QartodTest};
use serde::{Deserialize, Serialize};

use crate::dataset::{AttrValue, Attributes};
use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "deployment_metadata.toml";

/// How a logical output variable is produced from a decoded glider field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Unit conversion applied while decoding, e.g. `bar2dbar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl VariableSpec {
    pub fn new(source: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.valid_min = Some(min);
        self.valid_max = Some(max);
        self
    }

    pub fn resolution(mut self, resolution: f64) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn conversion(mut self, conversion: &str) -> Self {
        self.conversion = Some(conversion.to_string());
        self
    }

    /// Attributes carried onto the dataset variable (everything except the
    /// decoding instructions).
    pub fn output_attributes(&self) -> Attributes {
        let mut attrs = self.attributes.clone();
        if let Some(min) = self.valid_min {
            attrs.insert("valid_min".to_string(), AttrValue::Float(min));
        }
        if let Some(max) = self.valid_max {
            attrs.insert("valid_max".to_string(), AttrValue::Float(max));
        }
        if let Some(resolution) = self.resolution {
            attrs.insert("resolution".to_string(), AttrValue::Float(resolution));
        }
        attrs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    #[serde(default)]
    pub qartod: QartodSuite,
}

/// QARTOD tests keyed by the variable (stream) they run on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QartodConfig {
    #[serde(default)]
    pub streams: BTreeMap<String, StreamConfig>,
}

impl QartodConfig {
    /// Sets a test for a variable; a test of the same kind is replaced.
    pub fn insert(&mut self, variable: &str, test: QartodTest) {
        self.streams
            .entry(variable.to_string())
            .or_default()
            .qartod
            .insert(test);
    }

    pub fn suite(&self, variable: &str) -> Option<&QartodSuite> {
        self.streams.get(variable).map(|stream| &stream.qartod)
    }

    /// Variables with at least one configured test, in name order.
    pub fn variables(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|(_, stream)| !stream.qartod.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn test_count(&self) -> usize {
        self.streams.values().map(|stream| stream.qartod.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.test_count() == 0
    }

    /// Rejects malformed parameters before anything is evaluated.
    pub fn validate(&self) -> Result<()> {
        for (variable, stream) in &self.streams {
            stream.qartod.validate().map_err(|err| {
                PipelineError::Configuration(format!(
                    "qartod_tests.streams.{variable}.qartod: {err}"
                ))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub metadata: Attributes,
    #[serde(default)]
    pub glider_devices: BTreeMap<String, Attributes>,
    #[serde(default)]
    pub netcdf_variables: BTreeMap<String, VariableSpec>,
    #[serde(default)]
    pub profile_variables: BTreeMap<String, Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qartod_tests: Option<QartodConfig>,
}

impl DeploymentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DeploymentConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|err| match err {
            PipelineError::TomlDe(inner) => {
                PipelineError::Configuration(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(tests) = &self.qartod_tests {
            tests.validate()?;
        }
        Ok(())
    }

    pub fn qartod(&self) -> Result<&QartodConfig> {
        self.qartod_tests.as_ref().ok_or_else(|| {
            PipelineError::Configuration(
                "deployment configuration has no qartod_tests section".to_string(),
            )
        })
    }

    pub fn deployment_name(&self) -> Result<&str> {
        self.metadata
            .get("deployment_name")
            .and_then(AttrValue::as_str)
            .ok_or_else(|| {
                PipelineError::Configuration(
                    "metadata.deployment_name is missing".to_string(),
                )
            })
    }
}
