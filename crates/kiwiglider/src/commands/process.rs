// crates/kiwiglider/src/commands/process.rs

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use kiwiglider_core::archive::ARCHIVE_EXTENSION;
use kiwiglider_core::decode::DecodedExportDecoder;
use kiwiglider_core::pipeline::{DeploymentLayout, PipelineDriver, ProcessingStyle, Stage};
use kiwiglider_core::qc::QcReport;

#[derive(clap::Args, Debug)]
pub struct DeploymentArgs {
    /// Deployment main directory (holds Raw/ and the configuration).
    #[arg(long)]
    pub main_dir: PathBuf,
    /// realtime or delayed
    #[arg(long, default_value = "delayed")]
    pub style: String,
}

impl DeploymentArgs {
    fn driver(&self) -> Result<PipelineDriver> {
        let style: ProcessingStyle = self.style.parse()?;
        let layout = DeploymentLayout::new(&self.main_dir, style);
        Ok(PipelineDriver::load(layout)?)
    }
}

#[derive(clap::Args, Debug)]
pub struct L0Args {
    #[command(flatten)]
    pub deployment: DeploymentArgs,
    /// CSV export of the decoded binaries, one column per glider sensor.
    #[arg(long)]
    pub export: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct QcArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,
    /// L0 archive; defaults to the deployment's own.
    #[arg(long)]
    pub l0: Option<PathBuf>,
    /// Print the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn handle_l0(args: L0Args) -> Result<()> {
    let mut driver = args.deployment.driver()?;
    let path = driver.make_l0(&DecodedExportDecoder::new(&args.export), None)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn handle_qc(args: QcArgs) -> Result<()> {
    let mut driver = args.deployment.driver()?;
    let l0 = match args.l0 {
        Some(path) => path,
        None => {
            let name = driver.config().deployment_name()?;
            driver
                .layout()
                .timeseries_directory(Stage::L0)
                .join(format!("{name}.{ARCHIVE_EXTENSION}"))
        }
    };
    driver.attach_l0(&l0)?;
    let report = driver.make_l1(None)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if let Some(path) = driver.artifact(Stage::L1) {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_report(report: &QcReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Variable", "Flag variables", "Aggregate counts"]);
    for annotated in &report.annotated {
        let counts: Vec<String> = annotated
            .aggregate_counts
            .iter()
            .map(|(flag, count)| format!("{flag}: {count}"))
            .collect();
        table.add_row(vec![
            annotated.variable.clone(),
            annotated.flag_variables().collect::<Vec<_>>().join("\n"),
            counts.join(", "),
        ]);
    }
    println!("{table}");

    for issue in &report.issues {
        println!("⚠️  {issue}");
    }
}
