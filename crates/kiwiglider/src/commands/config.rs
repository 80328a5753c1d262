// crates/kiwiglider/src/commands/config.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use kiwiglider_core::config::{DeploymentConfig, DEFAULT_CONFIG_FILE};
use kiwiglider_core::metadata::{CsvDeploymentSheet, DeploymentBuilder, DeploymentOverrides};
use kiwiglider_core::qc_params::{build_qartod_config, PolicyPreset};
use tracing::info;

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// CSV export of the deployment sheet.
    #[arg(long)]
    pub sheet: PathBuf,
    /// Deployment ID (first column of the sheet).
    #[arg(long)]
    pub id: i64,
    /// Where to write the configuration.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub output: PathBuf,
    /// TOML file of entries laid over the generated sections.
    #[arg(long)]
    pub overrides: Option<PathBuf>,
    /// Threshold multipliers for derived tests: basic or legacy.
    #[arg(long, default_value = "basic")]
    pub policy: String,
    /// Leave the qartod_tests section out.
    #[arg(long)]
    pub skip_qartod: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeriveTestsArgs {
    /// Deployment configuration to read variables from.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    #[arg(long, default_value = "basic")]
    pub policy: String,
}

pub fn handle_config(args: ConfigArgs) -> Result<()> {
    let policy: PolicyPreset = args.policy.parse()?;
    let sheet = CsvDeploymentSheet::from_path(&args.sheet)
        .with_context(|| format!("reading deployment sheet {}", args.sheet.display()))?;

    let mut overrides = match &args.overrides {
        Some(path) => DeploymentOverrides::load(path)?,
        None => DeploymentOverrides::default(),
    };
    overrides.skip_qartod |= args.skip_qartod;

    let mut builder = DeploymentBuilder::new(args.id).with_policy(policy.policy());
    builder.load_record(&sheet)?;
    let config = builder.build(&overrides)?;
    config.save(&args.output)?;

    info!(
        deployment = args.id,
        policy = %policy,
        output = %args.output.display(),
        "wrote deployment configuration"
    );
    println!("Wrote {}", args.output.display());
    Ok(())
}

pub fn handle_derive_tests(args: DeriveTestsArgs) -> Result<()> {
    let policy: PolicyPreset = args.policy.parse()?;
    let config = DeploymentConfig::load(&args.config)?;
    let tests = build_qartod_config(&config.netcdf_variables, &policy.policy(), None)?;

    println!("{}", toml::to_string_pretty(&tests)?);
    Ok(())
}
