use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use kiwiglider_core::compliance::{ComplianceChecker, FileOutcome};
use kiwiglider_core::config::{DeploymentConfig, QartodConfig, VariableSpec};
use kiwiglider_core::dataset::{AttrValue, TimeSeriesDataset};
use kiwiglider_core::decode::DecodedExportDecoder;
use kiwiglider_core::error::{PipelineError, Result};
use kiwiglider_core::pipeline::{
    BinaryDecoder, DecodeRequest, DeploymentLayout, PipelineDriver, ProcessingStyle,
    ProfileExtractor, Stage,
};
use kiwiglider_core::summary::{default_panels, TextSummaryRenderer};
use kiwiglider_qartod::{GrossRangeParams, QartodTest};
use polars::prelude::*;
use tempfile::TempDir;

fn config() -> DeploymentConfig {
    let mut config = DeploymentConfig::default();
    config
        .metadata
        .insert("deployment_name".into(), AttrValue::from("GLD0012"));
    config
        .metadata
        .insert("project".into(), AttrValue::from("Cook Strait"));
    config
        .netcdf_variables
        .insert("time".into(), VariableSpec::new("sci_m_present_time"));
    config.netcdf_variables.insert(
        "temperature".into(),
        VariableSpec::new("sci_water_temp")
            .attr("long_name", "Temperature")
            .range(-5.0, 40.0),
    );
    let mut qartod = QartodConfig::default();
    qartod.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(-5.0, 40.0)),
    );
    config.qartod_tests = Some(qartod);
    config
}

struct FixedDecoder {
    seen: RefCell<Vec<PathBuf>>,
}

impl BinaryDecoder for FixedDecoder {
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<TimeSeriesDataset> {
        self.seen.borrow_mut().extend(request.binaries.iter().cloned());
        let frame = df!(
            "time" => &[1_700_000_000.0f64, 1_700_003_600.0, 1_700_090_000.0],
            "latitude" => &[-41.5f64, -41.4, -41.3],
            "longitude" => &[174.5f64, 174.6, 174.7],
            "temperature" => &[12.0f64, 55.0, 12.5],
        )?;
        let mut dataset = TimeSeriesDataset::new(frame)?;
        *dataset.global_attributes_mut() = request.config.metadata.clone();
        dataset
            .attributes_mut("temperature")
            .insert("long_name".into(), AttrValue::from("Temperature"));
        Ok(dataset)
    }
}

struct FileProfiles;

impl ProfileExtractor for FileProfiles {
    fn extract(
        &self,
        timeseries: &TimeSeriesDataset,
        output_directory: &Path,
        _style: ProcessingStyle,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_directory)?;
        let path = output_directory.join("GLD0012_0001.nc");
        fs::write(&path, format!("{} rows", timeseries.height()))?;
        Ok(vec![path])
    }
}

struct NameChecker;

impl ComplianceChecker for NameChecker {
    fn check(&self, data_file: &Path, report: &Path, _verbosity: u8) -> Result<bool> {
        fs::write(report, "checked")?;
        let name = data_file.file_name().unwrap_or_default().to_string_lossy();
        Ok(!name.contains("bad"))
    }
}

fn deployment() -> (TempDir, DeploymentLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = DeploymentLayout::new(dir.path(), ProcessingStyle::Delayed);
    let raw = layout.binary_directory();
    fs::create_dir_all(&raw).unwrap();
    for name in ["00010000.DBD", "00010000.EBD", "00010000.sbd"] {
        fs::write(raw.join(name), b"binary").unwrap();
    }
    (dir, layout)
}

fn decoder() -> FixedDecoder {
    FixedDecoder {
        seen: RefCell::new(Vec::new()),
    }
}

#[test]
fn stages_run_in_order_and_name_their_outputs() {
    let (_dir, layout) = deployment();
    let mut driver = PipelineDriver::new(layout.clone(), config());
    let decoder = decoder();

    let l0 = driver.make_l0(&decoder, Some(&FileProfiles)).unwrap();
    assert_eq!(
        l0,
        layout.timeseries_directory(Stage::L0).join("GLD0012.kgz")
    );
    assert_eq!(decoder.seen.borrow().len(), 2);
    assert!(layout
        .profiles_directory(Stage::L0)
        .join("GLD0012_0001.nc")
        .is_file());

    let report = driver.make_l1(Some(&FileProfiles)).unwrap();
    let l1 = driver.artifact(Stage::L1).unwrap();
    assert_eq!(l1, layout.timeseries_directory(Stage::L1).join("GLD0012.kgz"));
    assert_eq!(
        report
            .annotated_variable("temperature")
            .unwrap()
            .aggregate_counts
            .get(&4),
        Some(&1)
    );

    let annotated = kiwiglider_core::archive::read_archive(l1).unwrap();
    assert!(annotated.has_variable("temperature_qc"));
}

#[test]
fn l1_before_l0_names_the_missing_artifact() {
    let (_dir, layout) = deployment();
    let mut driver = PipelineDriver::new(layout, config());

    let err = driver.make_l1(None).unwrap_err();
    assert!(matches!(err, PipelineError::Precondition(_)));
    assert!(err.to_string().contains("L0 timeseries"));

    let err = driver
        .create_summary(Stage::L1, &TextSummaryRenderer, default_panels())
        .unwrap_err();
    assert!(err.to_string().contains("L1 timeseries"));
}

#[test]
fn l0_without_binaries_is_a_precondition_failure() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DeploymentLayout::new(dir.path(), ProcessingStyle::Realtime);
    let mut driver = PipelineDriver::new(layout, config());

    let err = driver.make_l0(&decoder(), None).unwrap_err();
    assert!(matches!(err, PipelineError::Precondition(_)));
}

#[test]
fn attaching_a_missing_file_fails() {
    let (dir, layout) = deployment();
    let mut driver = PipelineDriver::new(layout, config());

    let err = driver.attach_l0(&dir.path().join("nope.kgz")).unwrap_err();
    assert!(matches!(err, PipelineError::Precondition(_)));
    assert!(driver.artifact(Stage::L0).is_none());
}

#[test]
fn attached_l0_feeds_make_l1() {
    let (_dir, layout) = deployment();
    let mut first = PipelineDriver::new(layout.clone(), config());
    let l0 = first.make_l0(&decoder(), None).unwrap();

    let mut second = PipelineDriver::new(layout, config());
    second.attach_l0(&l0).unwrap();
    second.make_l1(None).unwrap();
    assert!(second.artifact(Stage::L1).is_some());
}

#[test]
fn compliance_runs_once_per_file() {
    let (_dir, layout) = deployment();
    let mut driver = PipelineDriver::new(layout.clone(), config());
    driver.make_l0(&decoder(), None).unwrap();

    let err = driver
        .check_compliance(Stage::L0, "nc", &NameChecker, 0)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Precondition(_)));

    let profiles = layout.profiles_directory(Stage::L0);
    fs::create_dir_all(&profiles).unwrap();
    fs::write(profiles.join("GLD0012_0001.nc"), b"").unwrap();
    fs::write(profiles.join("GLD0012_bad.nc"), b"").unwrap();
    fs::write(profiles.join("notes.txt"), b"").unwrap();

    let report = driver
        .check_compliance(Stage::L0, "nc", &NameChecker, 1)
        .unwrap();
    let outcomes: Vec<&FileOutcome> = report.files.iter().map(|f| &f.outcome).collect();
    assert_eq!(outcomes, vec![&FileOutcome::Passed, &FileOutcome::Failed]);
    assert!(profiles.join("GLD0012_0001_report.txt").is_file());
    assert!(!report.all_passed());

    let rerun = driver
        .check_compliance(Stage::L0, "nc", &NameChecker, 1)
        .unwrap();
    assert_eq!(rerun.skipped(), 2);
    assert_eq!(rerun.passed(), 0);
}

#[test]
fn summary_describes_the_deployment() {
    let (_dir, layout) = deployment();
    let mut driver = PipelineDriver::new(layout.clone(), config());
    driver.make_l0(&decoder(), None).unwrap();

    let output = driver
        .create_summary(Stage::L0, &TextSummaryRenderer, default_panels())
        .unwrap();
    assert_eq!(
        output,
        layout.style_directory().join("GLD0012_L0_summary.txt")
    );

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("Ocean Glider Deployment Summary: GLD0012 - Cook Strait"));
    assert!(text.contains("Deployment duration: 1 days, 1 hours"));
    assert!(text.contains("Deployment location: 41\u{b0}30.00'S,174\u{b0}30.00'E"));
    assert!(text.contains("Science sensors: Temperature"));
    assert!(text.contains("panel temperature (cmocean.sequential.Thermal_20)"));
}

#[test]
fn decoded_export_runs_through_the_driver() {
    let (dir, layout) = deployment();
    let export = dir.path().join("export.csv");
    fs::write(
        &export,
        "sci_m_present_time,sci_water_temp\n1700000000,11.5\n1700000060,11.6\n",
    )
    .unwrap();

    let mut driver = PipelineDriver::new(layout, config());
    let l0 = driver
        .make_l0(&DecodedExportDecoder::new(&export), None)
        .unwrap();
    let dataset = kiwiglider_core::archive::read_archive(&l0).unwrap();

    assert_eq!(dataset.height(), 2);
    assert_eq!(
        dataset.global_attributes().get("project"),
        Some(&AttrValue::from("Cook Strait"))
    );
    assert_eq!(
        dataset.values("temperature").unwrap(),
        vec![Some(11.5), Some(11.6)]
    );
}

#[test]
fn driver_loads_its_configuration_from_the_main_directory() {
    let (_dir, layout) = deployment();
    assert!(matches!(
        PipelineDriver::load(layout.clone()),
        Err(PipelineError::Precondition(_))
    ));

    config().save(&layout.config_path()).unwrap();
    let driver = PipelineDriver::load(layout).unwrap();
    assert_eq!(driver.config().deployment_name().unwrap(), "GLD0012");
}
