// crates/kiwiglider/src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::config::{handle_config, handle_derive_tests, ConfigArgs, DeriveTestsArgs};
use commands::process::{handle_l0, handle_qc, L0Args, QcArgs};
use commands::report::{handle_check, handle_summary, CheckArgs, SummaryArgs};

/// Slocum glider post-processing: deployment metadata, QARTOD quality
/// control and reporting.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build a deployment configuration from the deployment sheet.
    Config(ConfigArgs),
    /// Print the QARTOD tests derived from a configuration's variables.
    DeriveTests(DeriveTestsArgs),
    /// Decode glider binaries into the L0 timeseries.
    L0(L0Args),
    /// Run QARTOD over the L0 timeseries into L1.
    Qc(QcArgs),
    /// Run the compliance checker over a directory of data files.
    Check(CheckArgs),
    /// Write a text summary for a timeseries archive.
    Summary(SummaryArgs),
    /// Write a timeseries archive as NetCDF.
    #[cfg(feature = "netcdf")]
    ExportNetcdf(commands::report::ExportNetcdfArgs),
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Config(args) => handle_config(args),
        Commands::DeriveTests(args) => handle_derive_tests(args),
        Commands::L0(args) => handle_l0(args),
        Commands::Qc(args) => handle_qc(args),
        Commands::Check(args) => handle_check(args),
        Commands::Summary(args) => handle_summary(args),
        #[cfg(feature = "netcdf")]
        Commands::ExportNetcdf(args) => commands::report::handle_export_netcdf(args),
    }
}
