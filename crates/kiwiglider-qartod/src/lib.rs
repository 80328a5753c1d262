// crates/kiwiglider-qartod/src/lib.rs

//! QARTOD flags, per-sample tests and aggregation over plain slices.

pub mod aggregate;
pub mod checks;
pub mod errors;
pub mod flags;
pub mod params;

pub use aggregate::{aggregate, AggregationRule};
pub use checks::{flat_line_test, gross_range_test, rate_of_change_test, run_test, spike_test};
pub use errors::QartodError;
pub use flags::{
    aggregate_flag_meanings, archive_aggregate_flag, archive_aggregate_flags, QartodFlag,
    AGGREGATE_FLAG_MEANINGS, AGGREGATE_FLAG_VALUES, FLAG_FILL_VALUE,
};
pub use params::{
    FlatLineParams, GrossRangeParams, QartodSuite, QartodTest, RateOfChangeParams, SpikeMethod,
    SpikeParams, TestKind,
};
