// crates/kiwiglider-core/src/metadata/builder.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{DeploymentConfig, QartodConfig, VariableSpec};
use crate::dataset::Attributes;
use crate::error::{PipelineError, Result};
use crate::metadata::defaults::{
    default_glider_devices, default_metadata, default_netcdf_variables,
    default_profile_variables,
};
use crate::metadata::record::DeploymentRecord;
use crate::metadata::sheet::DeploymentSource;
use crate::qc_params::{apply_overrides, derive_qartod_tests, DerivationPolicy};

/// Caller-supplied entries laid over the generated sections, entry by entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glider_devices: Option<BTreeMap<String, Attributes>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netcdf_variables: Option<BTreeMap<String, VariableSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_variables: Option<BTreeMap<String, Attributes>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qartod_tests: Option<QartodConfig>,
    #[serde(default)]
    pub skip_qartod: bool,
}

impl DeploymentOverrides {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| {
            PipelineError::Configuration(format!("{}: {err}", path.display()))
        })
    }
}

fn overlay<V: Clone>(section: &mut BTreeMap<String, V>, overrides: Option<&BTreeMap<String, V>>, label: &str) {
    for (name, value) in overrides.into_iter().flatten() {
        debug!(section = label, entry = %name, "applying override");
        section.insert(name.clone(), value.clone());
    }
}

/// Assembles a [`DeploymentConfig`] section by section.
///
/// Each `add_*` call (re)generates one section from the deployment record and
/// lays any overrides over it. Sections not added explicitly are generated by
/// [`DeploymentBuilder::build`].
#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    id: i64,
    policy: DerivationPolicy,
    record: Option<DeploymentRecord>,
    metadata: Option<Attributes>,
    glider_devices: Option<BTreeMap<String, Attributes>>,
    netcdf_variables: Option<BTreeMap<String, VariableSpec>>,
    profile_variables: Option<BTreeMap<String, Attributes>>,
    qartod_tests: Option<QartodConfig>,
}

impl DeploymentBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            policy: DerivationPolicy::default(),
            record: None,
            metadata: None,
            glider_devices: None,
            netcdf_variables: None,
            profile_variables: None,
            qartod_tests: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn with_policy(mut self, policy: DerivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Loads the record for this builder's deployment and clears every
    /// section generated from a previous record.
    pub fn load_record(&mut self, source: &dyn DeploymentSource) -> Result<&mut Self> {
        let record = source.deployment(self.id)?;
        Ok(self.set_record(record))
    }

    pub fn set_record(&mut self, record: DeploymentRecord) -> &mut Self {
        info!(deployment = record.id(), "loaded deployment record");
        self.id = record.id();
        self.record = Some(record);
        self.metadata = None;
        self.glider_devices = None;
        self.netcdf_variables = None;
        self.profile_variables = None;
        self.qartod_tests = None;
        self
    }

    pub fn record(&self) -> Option<&DeploymentRecord> {
        self.record.as_ref()
    }

    fn require_record(&self, step: &str) -> Result<&DeploymentRecord> {
        self.record.as_ref().ok_or_else(|| {
            PipelineError::Precondition(format!(
                "{step} needs the deployment record; load it from a deployment sheet first"
            ))
        })
    }

    pub fn add_metadata(&mut self, overrides: Option<&Attributes>) -> Result<&mut Self> {
        info!("adding global metadata");
        let mut section = default_metadata(self.require_record("add_metadata")?)?;
        overlay(&mut section, overrides, "metadata");
        self.metadata = Some(section);
        Ok(self)
    }

    pub fn add_glider_devices(
        &mut self,
        overrides: Option<&BTreeMap<String, Attributes>>,
    ) -> Result<&mut Self> {
        info!("adding glider device metadata");
        let mut section = default_glider_devices(self.require_record("add_glider_devices")?)?;
        overlay(&mut section, overrides, "glider_devices");
        self.glider_devices = Some(section);
        Ok(self)
    }

    pub fn add_netcdf_variables(
        &mut self,
        overrides: Option<&BTreeMap<String, VariableSpec>>,
    ) -> Result<&mut Self> {
        info!("adding variable metadata");
        let mut section = default_netcdf_variables(self.require_record("add_netcdf_variables")?)?;
        overlay(&mut section, overrides, "netcdf_variables");
        self.netcdf_variables = Some(section);
        Ok(self)
    }

    pub fn add_profile_variables(
        &mut self,
        overrides: Option<&BTreeMap<String, Attributes>>,
    ) -> Result<&mut Self> {
        info!("adding profile variable metadata");
        let mut section =
            default_profile_variables(self.require_record("add_profile_variables")?)?;
        overlay(&mut section, overrides, "profile_variables");
        self.profile_variables = Some(section);
        Ok(self)
    }

    /// Derives QARTOD tests from the netcdf variable section, then applies
    /// `overrides` per (variable, test).
    pub fn add_qartod_tests(&mut self, overrides: Option<&QartodConfig>) -> Result<&mut Self> {
        info!("adding QARTOD test metadata");
        let variables = self.netcdf_variables.as_ref().ok_or_else(|| {
            PipelineError::Precondition(
                "add_qartod_tests needs the netcdf variable section; call add_netcdf_variables first"
                    .to_string(),
            )
        })?;
        let mut tests = derive_qartod_tests(variables, &self.policy);
        if let Some(overrides) = overrides {
            apply_overrides(&mut tests, overrides);
        }
        tests.validate()?;
        self.qartod_tests = Some(tests);
        Ok(self)
    }

    /// Fills every section not yet added and assembles the configuration.
    ///
    /// A section named in `overrides` is regenerated even if it was already
    /// added. With `skip_qartod` set, the result has no QARTOD section.
    pub fn build(&mut self, overrides: &DeploymentOverrides) -> Result<DeploymentConfig> {
        self.require_record("build")?;
        info!(deployment = self.id, "building deployment configuration");

        if self.metadata.is_none() || overrides.metadata.is_some() {
            self.add_metadata(overrides.metadata.as_ref())?;
        }
        if self.glider_devices.is_none() || overrides.glider_devices.is_some() {
            self.add_glider_devices(overrides.glider_devices.as_ref())?;
        }
        if self.netcdf_variables.is_none() || overrides.netcdf_variables.is_some() {
            self.add_netcdf_variables(overrides.netcdf_variables.as_ref())?;
        }
        if self.profile_variables.is_none() || overrides.profile_variables.is_some() {
            self.add_profile_variables(overrides.profile_variables.as_ref())?;
        }
        if overrides.skip_qartod {
            self.qartod_tests = None;
        } else if self.qartod_tests.is_none() || overrides.qartod_tests.is_some() {
            self.add_qartod_tests(overrides.qartod_tests.as_ref())?;
        }

        let config = DeploymentConfig {
            metadata: self.metadata.clone().unwrap_or_default(),
            glider_devices: self.glider_devices.clone().unwrap_or_default(),
            netcdf_variables: self.netcdf_variables.clone().unwrap_or_default(),
            profile_variables: self.profile_variables.clone().unwrap_or_default(),
            qartod_tests: self.qartod_tests.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}
