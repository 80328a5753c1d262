// crates/kiwiglider-qartod/src/flags.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fill value stored in every flag variable where no flag could be assigned.
pub const FLAG_FILL_VALUE: i8 = -127;

/// Numeric vocabulary of the aggregate flag variable.
pub const AGGREGATE_FLAG_VALUES: [i8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

pub const AGGREGATE_FLAG_MEANINGS: [&str; 10] = [
    "no_qc_performed",
    "good_data",
    "probably_good_data",
    "bad_data_that_are_potentially_correctable",
    "bad_data",
    "value_changed",
    "not_used",
    "not_used",
    "interpolated_value",
    "missing_value",
];

/// Per-sample result of a single QARTOD test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i8)]
pub enum QartodFlag {
    Good = 1,
    Unknown = 2,
    Suspect = 3,
    Fail = 4,
    Missing = 9,
}

impl QartodFlag {
    pub const ALL: [QartodFlag; 5] = [
        QartodFlag::Good,
        QartodFlag::Unknown,
        QartodFlag::Suspect,
        QartodFlag::Fail,
        QartodFlag::Missing,
    ];

    pub fn value(self) -> i8 {
        self as i8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QartodFlag::Good => "GOOD",
            QartodFlag::Unknown => "UNKNOWN",
            QartodFlag::Suspect => "SUSPECT",
            QartodFlag::Fail => "FAIL",
            QartodFlag::Missing => "MISSING",
        }
    }

    pub fn from_value(value: i8) -> Option<Self> {
        QartodFlag::ALL.into_iter().find(|flag| flag.value() == value)
    }

    /// `flag_values` attribute for a per-test flag variable.
    pub fn flag_values() -> Vec<i8> {
        QartodFlag::ALL.iter().map(|flag| flag.value()).collect()
    }

    /// `flag_meanings` attribute for a per-test flag variable.
    pub fn flag_meanings() -> String {
        QartodFlag::ALL
            .iter()
            .map(|flag| flag.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for QartodFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts an aggregated QARTOD flag into the archive's aggregate vocabulary.
///
/// The archive reserves `2` for "probably good data", so an aggregate that
/// came out UNKNOWN is written as `0` (no QC performed). Every other flag keeps
/// its numeric value.
pub fn archive_aggregate_flag(flag: QartodFlag) -> i8 {
    match flag {
        QartodFlag::Unknown => 0,
        other => other.value(),
    }
}

pub fn archive_aggregate_flags(flags: &[QartodFlag]) -> Vec<i8> {
    flags.iter().copied().map(archive_aggregate_flag).collect()
}

pub fn aggregate_flag_meanings() -> String {
    AGGREGATE_FLAG_MEANINGS.join(" ")
}
