use std::io::Cursor;

use kiwiglider_core::config::{DeploymentConfig, QartodConfig, VariableSpec};
use kiwiglider_core::dataset::{AttrValue, Attributes};
use kiwiglider_core::error::PipelineError;
use kiwiglider_core::metadata::{
    CsvDeploymentSheet, DeploymentBuilder, DeploymentOverrides, DeploymentRecord,
    DeploymentSource, RecordValue,
};
use kiwiglider_core::qc_params::DerivationPolicy;
use kiwiglider_qartod::{GrossRangeParams, QartodTest, TestKind};

const SHEET: &str = "\
id,principal_investigator,data_manager,pilot,data_manager_email,funding,deploy_date,end_date,platform_id,platform_sn,glidertype,pump_type,owner,platform_type,project_name,sea,wmo_id,pres_sn,ctd_type,ctd_sn,ctd_cal,wetlabs_installed,oxy_installed,oxy_type,oxy_sn,oxy_cal,par_installed,bb3_installed,lisst_installed,microrider_installed
7,\"Ana Rangi, Tom Hale\",Kiri Moana,Sam Reed,kiri.moana@niwa.co.nz,MBIE,2024-03-01,2024-04-15,kaharoa,unit_981,G3,200,NIWA,Slocum Glider,Hauraki Gulf Glider,South Pacific Ocean,6801234,P-11,GPCTD,9210,2023-10-02,no,yes,4831,1182,2023-11-05,no,no,no,no
8,Ana Rangi,Kiri Moana,Sam Reed,kiri.moana@niwa.co.nz,MBIE,2024-06-01,,kaharoa,unit_981,G3,1000,NIWA,Slocum Glider,Hauraki Gulf Glider,South Pacific Ocean,6801234,P-11,GPCTD,9210,2023-10-02,no,no,,,,no,no,no,no
";

fn sheet() -> CsvDeploymentSheet {
    CsvDeploymentSheet::from_reader(Cursor::new(SHEET)).expect("sheet parses")
}

fn builder() -> DeploymentBuilder {
    let mut builder = DeploymentBuilder::new(7);
    builder.load_record(&sheet()).expect("record loads");
    builder
}

fn text<'a>(attrs: &'a Attributes, key: &str) -> &'a str {
    attrs.get(key).and_then(AttrValue::as_str).unwrap_or_default()
}

#[test]
fn sheet_rows_become_typed_records() {
    let sheet = sheet();
    assert_eq!(sheet.deployment_ids(), vec![7, 8]);

    let record = sheet.deployment(7).unwrap();
    assert_eq!(record.get("oxy_installed"), Some(&RecordValue::Bool(true)));
    assert_eq!(record.text("wmo_id").unwrap(), "6801234");
    assert_eq!(record.number("pump_type").unwrap(), 200.0);
    assert_eq!(
        record.date("deploy_date").unwrap(),
        chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    );
}

#[test]
fn unknown_deployment_is_a_validation_error() {
    let err = sheet().deployment(99).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn builds_every_section_with_defaults() {
    let config = builder().build(&DeploymentOverrides::default()).unwrap();

    let meta = &config.metadata;
    assert_eq!(text(meta, "deployment_name"), "GLD0007");
    assert_eq!(text(meta, "naming_authority"), "nz.co.niwa");
    assert_eq!(text(meta, "glider_pump"), "200m");
    assert_eq!(text(meta, "deployment_start"), "2024-03-01");
    assert_eq!(
        text(meta, "contributor_name"),
        "Ana Rangi, Tom Hale,Kiri Moana,Sam Reed"
    );
    assert_eq!(
        text(meta, "contributor_role"),
        "Principal Investigator,Principal Investigator,Data Manager,Operator"
    );
    assert_eq!(text(meta, "Conventions"), "CF-1.11");

    let devices: Vec<&str> = config.glider_devices.keys().map(String::as_str).collect();
    assert_eq!(devices, vec!["ctd", "oxygen", "pressure"]);

    assert!(config.netcdf_variables.contains_key("oxygen_concentration"));
    assert!(!config.netcdf_variables.contains_key("chlorophyll"));
    assert_eq!(
        config.netcdf_variables["pressure"].conversion.as_deref(),
        Some("bar2dbar")
    );
    assert!(config.profile_variables.contains_key("profile_id"));
    assert!(config.profile_variables.contains_key("instrument_ctd"));
}

#[test]
fn qartod_tests_follow_declared_bounds() {
    let config = builder().build(&DeploymentOverrides::default()).unwrap();
    let tests = config.qartod().unwrap();

    let temperature = tests.suite("temperature").unwrap();
    assert_eq!(
        temperature.kinds(),
        vec![
            TestKind::GrossRange,
            TestKind::Spike,
            TestKind::RateOfChange,
            TestKind::FlatLine
        ]
    );
    let rate = temperature.rate_of_change_test.as_ref().unwrap();
    assert!((rate.threshold - 0.02).abs() < 1e-12);

    let latitude = tests.suite("latitude").unwrap();
    assert_eq!(latitude.kinds(), vec![TestKind::GrossRange]);
    assert!(tests.suite("time").is_none());
    assert!(tests.suite("heading").is_none());
}

#[test]
fn legacy_policy_uses_its_own_multipliers() {
    let mut builder = builder().with_policy(DerivationPolicy::LEGACY);
    let config = builder.build(&DeploymentOverrides::default()).unwrap();
    let temperature = config.qartod().unwrap().suite("temperature").unwrap();

    let rate = temperature.rate_of_change_test.as_ref().unwrap();
    assert!((rate.threshold - 0.0005).abs() < 1e-12);
    let flat = temperature.flat_line_test.as_ref().unwrap();
    assert!((flat.tolerance - 0.0002).abs() < 1e-12);
}

#[test]
fn overrides_replace_single_entries() {
    let mut metadata = Attributes::new();
    metadata.insert("project".into(), AttrValue::from("Override Project"));

    let mut netcdf = std::collections::BTreeMap::new();
    netcdf.insert(
        "temperature".to_string(),
        VariableSpec::new("sci_water_temp")
            .attr("units", "Celsius")
            .range(0.0, 30.0)
            .resolution(0.001),
    );

    let overrides = DeploymentOverrides {
        metadata: Some(metadata),
        netcdf_variables: Some(netcdf),
        ..DeploymentOverrides::default()
    };
    let config = builder().build(&overrides).unwrap();

    assert_eq!(text(&config.metadata, "project"), "Override Project");
    assert_eq!(text(&config.metadata, "deployment_name"), "GLD0007");
    assert_eq!(config.netcdf_variables["temperature"].valid_max, Some(30.0));
    assert!(config.netcdf_variables.contains_key("conductivity"));

    let gross = config
        .qartod()
        .unwrap()
        .suite("temperature")
        .unwrap()
        .gross_range_test
        .clone()
        .unwrap();
    assert_eq!(gross.fail_span, [0.0, 30.0]);
}

#[test]
fn qartod_overrides_apply_per_test() {
    let mut qartod = QartodConfig::default();
    qartod.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(-2.0, 35.0)),
    );
    let overrides = DeploymentOverrides {
        qartod_tests: Some(qartod),
        ..DeploymentOverrides::default()
    };
    let config = builder().build(&overrides).unwrap();
    let temperature = config.qartod().unwrap().suite("temperature").unwrap();

    assert_eq!(
        temperature.gross_range_test.as_ref().unwrap().fail_span,
        [-2.0, 35.0]
    );
    assert!(temperature.spike_test.is_some());
}

#[test]
fn skip_qartod_leaves_the_section_out() {
    let overrides = DeploymentOverrides {
        skip_qartod: true,
        ..DeploymentOverrides::default()
    };
    let config = builder().build(&overrides).unwrap();
    assert!(config.qartod_tests.is_none());
    assert!(matches!(config.qartod(), Err(PipelineError::Configuration(_))));
}

#[test]
fn sections_need_their_prerequisites() {
    let mut empty = DeploymentBuilder::new(7);
    assert!(matches!(
        empty.add_metadata(None),
        Err(PipelineError::Precondition(_))
    ));
    assert!(matches!(
        empty.build(&DeploymentOverrides::default()),
        Err(PipelineError::Precondition(_))
    ));

    let mut loaded = builder();
    let err = loaded.add_qartod_tests(None).unwrap_err();
    assert!(matches!(err, PipelineError::Precondition(_)));
    assert!(err.to_string().contains("add_netcdf_variables"));

    loaded.add_netcdf_variables(None).unwrap();
    loaded.add_qartod_tests(None).unwrap();
}

#[test]
fn missing_required_field_names_the_field() {
    let mut builder = DeploymentBuilder::new(8);
    builder.load_record(&sheet()).unwrap();
    let err = builder.build(&DeploymentOverrides::default()).unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
    assert!(err.to_string().contains("end_date"));
}

#[test]
fn records_can_be_supplied_directly() {
    let mut record = DeploymentRecord::new(3);
    record.insert("ctd_cal", RecordValue::parse("2023-01-31"));
    record.insert("ctd_type", RecordValue::parse("GPCTD"));
    record.insert("ctd_sn", RecordValue::parse("9210"));

    let mut builder = DeploymentBuilder::new(0);
    builder.set_record(record);
    builder.add_profile_variables(None).unwrap();
    assert_eq!(builder.id(), 3);
}

#[test]
fn config_survives_a_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deployment_metadata.toml");

    let config = builder().build(&DeploymentOverrides::default()).unwrap();
    config.save(&path).unwrap();
    let loaded = DeploymentConfig::load(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn override_files_reject_unknown_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overrides.toml");

    std::fs::write(
        &path,
        "skip_qartod = false\n\n[metadata]\nproject = \"From File\"\n\n\
         [qartod_tests.streams.temperature.qartod.gross_range]\nfail_span = [0.0, 25.0]\n",
    )
    .unwrap();
    let overrides = DeploymentOverrides::load(&path).unwrap();
    assert_eq!(
        overrides.metadata.unwrap().get("project"),
        Some(&AttrValue::from("From File"))
    );
    assert!(overrides.qartod_tests.is_some());

    std::fs::write(&path, "[devices]\nctd = {}\n").unwrap();
    assert!(matches!(
        DeploymentOverrides::load(&path),
        Err(PipelineError::Configuration(_))
    ));
}
