// crates/kiwiglider/src/commands/report.rs

use std::path::PathBuf;

use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use kiwiglider_core::archive::read_archive;
use kiwiglider_core::compliance::{
    check_directory, verbosity_from_tracing, CommandChecker, FileOutcome,
};
use kiwiglider_core::summary::{
    default_panels, render_summary, DeploymentSummary, SummaryRenderer, TextSummaryRenderer,
};

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Directory of data files to check.
    #[arg(long)]
    pub dir: PathBuf,
    /// Extension of the files to check.
    #[arg(long, default_value = "nc")]
    pub extension: String,
}

#[derive(clap::Args, Debug)]
pub struct SummaryArgs {
    /// Timeseries archive to summarize.
    #[arg(long)]
    pub archive: PathBuf,
    /// Output file; defaults to the archive name with `_summary.txt`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn handle_check(args: CheckArgs) -> Result<()> {
    let checker = CommandChecker::from_env();
    let report = check_directory(&args.dir, &args.extension, &checker, verbosity_from_tracing())?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["File", "Outcome", "Report"]);
    for check in &report.files {
        let outcome = match &check.outcome {
            FileOutcome::Passed => "passed".to_string(),
            FileOutcome::Failed => "failed".to_string(),
            FileOutcome::AlreadyChecked => "already checked".to_string(),
            FileOutcome::Error(reason) => format!("error: {reason}"),
        };
        table.add_row(vec![
            check.file.display().to_string(),
            outcome,
            check.report.display().to_string(),
        ]);
    }
    println!("{table}");

    if !report.all_passed() {
        bail!("{} file(s) did not pass the compliance check", report.failed());
    }
    Ok(())
}

pub fn handle_summary(args: SummaryArgs) -> Result<()> {
    let dataset = read_archive(&args.archive)?;
    let summary = DeploymentSummary::from_dataset(&dataset, default_panels())?;

    let renderer = TextSummaryRenderer;
    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .archive
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| summary.deployment_name.clone());
        args.archive
            .with_file_name(format!("{stem}_summary.{}", renderer.extension()))
    });
    render_summary(&renderer, &summary, &output)?;
    println!("Wrote {}", output.display());
    Ok(())
}

#[cfg(feature = "netcdf")]
#[derive(clap::Args, Debug)]
pub struct ExportNetcdfArgs {
    #[arg(long)]
    pub archive: PathBuf,
    /// Output file; defaults to the archive path with a `.nc` extension.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(feature = "netcdf")]
pub fn handle_export_netcdf(args: ExportNetcdfArgs) -> Result<()> {
    let dataset = read_archive(&args.archive)?;
    let output = args
        .output
        .unwrap_or_else(|| args.archive.with_extension("nc"));
    kiwiglider_core::netcdf_export::write_netcdf(&dataset, &output)?;
    println!("Wrote {}", output.display());
    Ok(())
}
