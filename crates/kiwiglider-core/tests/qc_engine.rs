use std::collections::BTreeMap;

use kiwiglider_core::config::QartodConfig;
use kiwiglider_core::dataset::{AttrValue, TimeSeriesDataset};
use kiwiglider_core::qc::{annotate, QcEngine, VariableIssue};
use kiwiglider_core::summary::{default_panels, DeploymentSummary};
use kiwiglider_qartod::{
    AggregationRule, GrossRangeParams, QartodFlag, QartodTest, SpikeMethod, SpikeParams,
};
use polars::prelude::*;

fn glider_dataset() -> TimeSeriesDataset {
    let frame = df!(
        "time" => &[0.0f64, 60.0, 120.0, 180.0],
        "depth" => &[Some(1.0f64), None, Some(3.0), Some(4.0)],
        "latitude" => &[-41.0f64, -41.001, -41.002, -41.003],
        "longitude" => &[174.0f64, 174.001, 174.002, 174.003],
        "temperature" => &[10.0f64, 10.1, 50.0, 10.2],
        "salinity" => &[Some(35.0f64), None, Some(35.1), Some(35.2)],
    )
    .unwrap();
    let mut dataset = TimeSeriesDataset::new(frame).unwrap();
    dataset
        .attributes_mut("temperature")
        .insert("units".into(), AttrValue::from("Celsius"));
    dataset
        .global_attributes_mut()
        .insert("deployment_name".into(), AttrValue::from("GLD0001"));
    dataset
}

fn temperature_tests() -> QartodConfig {
    let mut config = QartodConfig::default();
    config.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(0.0, 40.0)),
    );
    config.insert(
        "temperature",
        QartodTest::Spike(SpikeParams {
            suspect_threshold: 1.0,
            fail_threshold: 5.0,
            method: SpikeMethod::Average,
        }),
    );
    config
}

fn flags(dataset: &TimeSeriesDataset, name: &str) -> Vec<Option<i8>> {
    dataset
        .column(name)
        .unwrap()
        .as_materialized_series()
        .i8()
        .unwrap()
        .into_iter()
        .collect()
}

#[test]
fn out_of_range_sample_fails_and_aggregate_is_written() {
    let outcome = annotate(&glider_dataset(), &temperature_tests()).unwrap();
    let dataset = &outcome.dataset;

    assert_eq!(
        flags(dataset, "temperature_qartod_gross_range_test"),
        vec![Some(1), Some(1), Some(4), Some(1)]
    );
    assert_eq!(
        flags(dataset, "temperature_qartod_spike_test"),
        vec![Some(2), Some(4), Some(4), Some(2)]
    );
    assert_eq!(
        flags(dataset, "temperature_qc"),
        vec![Some(1), Some(4), Some(4), Some(1)]
    );

    let annotated = outcome.report.annotated_variable("temperature").unwrap();
    assert_eq!(annotated.aggregate_flag, "temperature_qc");
    assert_eq!(
        annotated.aggregate_counts,
        BTreeMap::from([(1i8, 2usize), (4i8, 2usize)])
    );
    assert!(outcome.report.is_clean());
}

#[test]
fn flag_attributes_carry_vocabulary_and_provenance() {
    let outcome = annotate(&glider_dataset(), &temperature_tests()).unwrap();
    let dataset = &outcome.dataset;

    let test_attrs = dataset
        .attributes("temperature_qartod_gross_range_test")
        .unwrap();
    assert_eq!(
        test_attrs.get("flag_values"),
        Some(&AttrValue::IntList(vec![1, 2, 3, 4, 9]))
    );
    assert_eq!(
        test_attrs.get("flag_meanings"),
        Some(&AttrValue::from("GOOD UNKNOWN SUSPECT FAIL MISSING"))
    );
    assert_eq!(test_attrs.get("_FillValue"), Some(&AttrValue::Int(-127)));
    assert_eq!(test_attrs.get("valid_min"), Some(&AttrValue::Int(1)));
    assert_eq!(test_attrs.get("valid_max"), Some(&AttrValue::Int(9)));
    assert_eq!(
        test_attrs.get("ioos_qc_target"),
        Some(&AttrValue::from("temperature"))
    );

    let aggregate_attrs = dataset.attributes("temperature_qc").unwrap();
    assert_eq!(
        aggregate_attrs.get("flag_values"),
        Some(&AttrValue::IntList((0..=9).collect()))
    );
    assert_eq!(aggregate_attrs.get("valid_min"), Some(&AttrValue::Int(0)));
    assert_eq!(aggregate_attrs.get("ioos_qc_test"), Some(&AttrValue::from("qc")));
    let config = aggregate_attrs
        .get("ioos_qc_config")
        .and_then(AttrValue::as_str)
        .unwrap();
    assert!(config.contains("gross_range_test"));
    assert!(config.contains("spike_test"));
}

#[test]
fn source_variable_lists_every_flag_once() {
    let outcome = annotate(&glider_dataset(), &temperature_tests()).unwrap();
    assert_eq!(
        outcome.dataset.ancillary_variables("temperature"),
        vec![
            "temperature_qartod_gross_range_test",
            "temperature_qartod_spike_test",
            "temperature_qc",
        ]
    );
    assert_eq!(
        outcome.dataset.attributes("temperature").unwrap().get("units"),
        Some(&AttrValue::from("Celsius"))
    );
}

#[test]
fn existing_ancillary_entries_are_kept() {
    let mut dataset = glider_dataset();
    dataset
        .attributes_mut("temperature")
        .insert("ancillary_variables".into(), AttrValue::from("instrument_ctd"));

    let outcome = annotate(&dataset, &temperature_tests()).unwrap();
    let tokens = outcome.dataset.ancillary_variables("temperature");
    assert_eq!(tokens.first().map(String::as_str), Some("instrument_ctd"));
    assert_eq!(tokens.len(), 4);
}

#[test]
fn annotating_twice_gives_the_same_dataset() {
    let config = temperature_tests();
    let once = annotate(&glider_dataset(), &config).unwrap().dataset;
    let twice = annotate(&once, &config).unwrap().dataset;

    assert!(once.frame().equals_missing(twice.frame()));
    assert_eq!(once.variable_attributes(), twice.variable_attributes());
    assert_eq!(once.global_attributes(), twice.global_attributes());
    assert_eq!(twice.ancillary_variables("temperature").len(), 3);
}

#[test]
fn coordinates_come_out_unchanged() {
    let input = glider_dataset();
    let outcome = annotate(&input, &temperature_tests()).unwrap();

    for name in ["time", "depth", "latitude", "longitude"] {
        let before = input.column(name).unwrap().as_materialized_series();
        let after = outcome.dataset.column(name).unwrap().as_materialized_series();
        assert!(before.equals_missing(after), "{name} changed");
        assert!(outcome.dataset.attributes(name).is_none());
    }
    assert_eq!(outcome.dataset.height(), input.height());
    assert!(!outcome.dataset.has_variable("z"));
    assert!(!outcome.dataset.has_variable("lat"));
}

#[test]
fn gaps_in_other_variables_get_the_default_fill() {
    let outcome = annotate(&glider_dataset(), &temperature_tests()).unwrap();
    let dataset = &outcome.dataset;

    assert_eq!(
        dataset.values("salinity").unwrap(),
        vec![Some(35.0), Some(-999.0), Some(35.1), Some(35.2)]
    );
    assert_eq!(dataset.fill_value("salinity"), Some(-999.0));
    assert_eq!(dataset.fill_value("temperature"), Some(-999.0));
}

#[test]
fn declared_fill_values_are_respected() {
    let mut dataset = glider_dataset();
    dataset
        .attributes_mut("salinity")
        .insert("_FillValue".into(), AttrValue::Float(-1.0));

    let outcome = annotate(&dataset, &temperature_tests()).unwrap();
    assert_eq!(outcome.dataset.values("salinity").unwrap()[1], Some(-1.0));
}

#[test]
fn missing_variable_is_reported_and_the_rest_still_run() {
    let mut config = temperature_tests();
    config.insert(
        "oxygen_concentration",
        QartodTest::GrossRange(GrossRangeParams::new(0.0, 500.0)),
    );

    let outcome = annotate(&glider_dataset(), &config).unwrap();
    assert_eq!(
        outcome.report.issues,
        vec![VariableIssue::MissingVariable {
            variable: "oxygen_concentration".into()
        }]
    );
    assert!(outcome.dataset.has_variable("temperature_qc"));
    assert!(!outcome.dataset.has_variable("oxygen_concentration_qc"));
}

#[test]
fn aggregate_never_holds_unknown() {
    let frame = df!(
        "time" => &[0.0f64, 60.0, 120.0],
        "temperature" => &[Some(10.0f64), None, Some(12.0)],
    )
    .unwrap();
    let dataset = TimeSeriesDataset::new(frame).unwrap();
    let mut config = QartodConfig::default();
    config.insert(
        "temperature",
        QartodTest::Spike(SpikeParams {
            suspect_threshold: 1.0,
            fail_threshold: 2.0,
            method: SpikeMethod::Average,
        }),
    );

    let outcome = annotate(&dataset, &config).unwrap();
    let spike = flags(&outcome.dataset, "temperature_qartod_spike_test");
    assert_eq!(spike, vec![Some(2), Some(9), Some(2)]);

    let aggregate = flags(&outcome.dataset, "temperature_qc");
    assert_eq!(aggregate, vec![Some(0), Some(9), Some(0)]);
    let allowed = [0i8, 1, 3, 4, 9, -127];
    assert!(aggregate.iter().flatten().all(|value| allowed.contains(value)));
}

#[test]
fn duplicate_and_unsorted_timestamps_map_back_to_their_rows() {
    let frame = df!(
        "time" => &[120.0f64, 60.0, 0.0, 60.0],
        "temperature" => &[10.0f64, 50.0, 10.0, 10.0],
    )
    .unwrap();
    let dataset = TimeSeriesDataset::new(frame).unwrap();
    let mut config = QartodConfig::default();
    config.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(0.0, 40.0)),
    );

    let outcome = annotate(&dataset, &config).unwrap();
    assert_eq!(
        flags(&outcome.dataset, "temperature_qc"),
        vec![Some(1), Some(4), Some(1), Some(1)]
    );
    assert!(outcome
        .dataset
        .column("time")
        .unwrap()
        .as_materialized_series()
        .equals_missing(dataset.column("time").unwrap().as_materialized_series()));
}

#[test]
fn custom_precedence_changes_the_aggregate() {
    let rule = AggregationRule::new(vec![
        QartodFlag::Missing,
        QartodFlag::Good,
        QartodFlag::Suspect,
        QartodFlag::Fail,
        QartodFlag::Unknown,
    ])
    .unwrap();
    let outcome = QcEngine::new(rule)
        .annotate(&glider_dataset(), &temperature_tests())
        .unwrap();

    // UNKNOWN now outranks everything and is archived as 0
    assert_eq!(
        flags(&outcome.dataset, "temperature_qc"),
        vec![Some(0), Some(4), Some(4), Some(0)]
    );
}

#[test]
fn invalid_parameters_are_rejected_before_evaluation() {
    let mut config = QartodConfig::default();
    config.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(40.0, 0.0)),
    );

    let err = annotate(&glider_dataset(), &config).unwrap_err();
    assert!(err.to_string().contains("temperature"));
}

#[test]
fn derived_tests_on_a_warm_spike() {
    use kiwiglider_core::config::VariableSpec;
    use kiwiglider_core::qc_params::{derive_qartod_tests, DerivationPolicy};

    let mut variables = BTreeMap::new();
    variables.insert(
        "temperature".to_string(),
        VariableSpec::new("sci_water_temp").range(-5.0, 50.0).resolution(0.001),
    );
    let config = derive_qartod_tests(&variables, &DerivationPolicy::BASIC);

    let outcome = annotate(&glider_dataset(), &config).unwrap();
    let dataset = &outcome.dataset;

    // 50 sits on the inclusive upper bound
    assert_eq!(
        flags(dataset, "temperature_qartod_gross_range_test"),
        vec![Some(1), Some(1), Some(1), Some(1)]
    );
    assert_eq!(
        flags(dataset, "temperature_qartod_spike_test"),
        vec![Some(2), Some(4), Some(4), Some(2)]
    );
    assert_eq!(
        flags(dataset, "temperature_qartod_rate_of_change_test"),
        vec![Some(2), Some(1), Some(3), Some(3)]
    );
    assert_eq!(
        flags(dataset, "temperature_qartod_flat_line_test"),
        vec![Some(2), Some(2), Some(2), Some(1)]
    );
    assert_eq!(
        flags(dataset, "temperature_qc"),
        vec![Some(1), Some(4), Some(4), Some(3)]
    );
    assert_eq!(outcome.report.annotated_variable("temperature").unwrap().test_flags.len(), 4);
}

#[test]
fn reannotating_with_fewer_tests_drops_stale_flags() {
    let first = annotate(&glider_dataset(), &temperature_tests()).unwrap();
    assert!(first.dataset.has_variable("temperature_qartod_spike_test"));

    let mut gross_only = QartodConfig::default();
    gross_only.insert(
        "temperature",
        QartodTest::GrossRange(GrossRangeParams::new(0.0, 40.0)),
    );
    let second = annotate(&first.dataset, &gross_only).unwrap();

    assert!(!second.dataset.has_variable("temperature_qartod_spike_test"));
    assert!(second.dataset.has_variable("temperature_qartod_gross_range_test"));
    assert_eq!(
        second.dataset.ancillary_variables("temperature"),
        vec![
            "temperature_qartod_gross_range_test".to_string(),
            "temperature_qc".to_string()
        ]
    );
    assert_eq!(
        flags(&second.dataset, "temperature_qc"),
        vec![Some(1), Some(1), Some(4), Some(1)]
    );
}

#[test]
fn non_numeric_variable_is_reported_and_the_rest_still_run() {
    let frame = df!(
        "time" => &[0.0f64, 60.0, 120.0, 180.0],
        "temperature" => &[10.0f64, 10.1, 50.0, 10.2],
        "comment" => &["a", "b", "c", "d"],
    )
    .unwrap();
    let dataset = TimeSeriesDataset::new(frame).unwrap();
    let mut config = temperature_tests();
    config.insert(
        "comment",
        QartodTest::GrossRange(GrossRangeParams::new(0.0, 1.0)),
    );

    let outcome = annotate(&dataset, &config).unwrap();

    assert_eq!(outcome.report.issues.len(), 1);
    assert!(matches!(
        &outcome.report.issues[0],
        VariableIssue::EvaluationFailed { variable, .. } if variable == "comment"
    ));
    assert!(outcome.dataset.has_variable("temperature_qc"));
    assert!(outcome
        .dataset
        .variable_names()
        .iter()
        .all(|name| !name.starts_with("comment_")));
    assert!(outcome.dataset.ancillary_variables("comment").is_empty());
}

#[test]
fn summary_of_annotated_dataset_ignores_fill_values() {
    let frame = df!(
        "time" => &[0.0f64, 60.0, 120.0],
        "temperature" => &[10.0f64, 10.1, 10.2],
        "salinity" => &[Some(35.0f64), None, Some(35.1)],
        "distance_over_ground" => &[Some(0.0f64), Some(1.0), None],
    )
    .unwrap();
    let mut dataset = TimeSeriesDataset::new(frame).unwrap();
    let global = dataset.global_attributes_mut();
    global.insert("deployment_name".into(), AttrValue::from("GLD0001"));
    global.insert("project".into(), AttrValue::from("Hauraki Gulf"));

    let outcome = annotate(&dataset, &temperature_tests()).unwrap();
    assert_eq!(outcome.dataset.values("salinity").unwrap()[1], Some(-999.0));

    let summary = DeploymentSummary::from_dataset(&outcome.dataset, default_panels()).unwrap();
    let salinity = summary
        .ranges
        .iter()
        .find(|range| range.variable == "salinity")
        .unwrap();
    assert_eq!(salinity.min, Some(35.0));
    assert_eq!(salinity.max, Some(35.1));
    assert_eq!(summary.distance_covered, Some(1.0));
}
