// crates/kiwiglider-core/src/compliance.rs

// Runs an external standards checker over produced files, one report each.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

pub const REPORT_SUFFIX: &str = "_report.txt";
pub const CHECKER_ENV: &str = "KIWIGLIDER_COMPLIANCE_CHECKER";
pub const DEFAULT_CHECKER_PROGRAM: &str = "compliance-checker";
pub const DEFAULT_CHECKER_TEST: &str = "gliderdac";
pub const DEFAULT_CRITERIA: &str = "normal";

/// Report path for a data file: its name up to the first `.`, plus
/// `_report.txt`, in the same directory.
pub fn report_path(data_file: &Path) -> PathBuf {
    let name = data_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.split('.').next().unwrap_or_default();
    data_file.with_file_name(format!("{base}{REPORT_SUFFIX}"))
}

/// Checker verbosity that follows the active log level.
pub fn verbosity_from_tracing() -> u8 {
    let level = LevelFilter::current();
    if level >= LevelFilter::DEBUG {
        2
    } else if level >= LevelFilter::INFO {
        1
    } else {
        0
    }
}

pub trait ComplianceChecker {
    /// Checks one file and writes its report; `Ok(true)` when it passed.
    fn check(&self, data_file: &Path, report: &Path, verbosity: u8) -> Result<bool>;
}

/// Invokes a command-line checker such as the IOOS compliance checker.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    program: PathBuf,
    test: String,
    criteria: String,
}

impl CommandChecker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            test: DEFAULT_CHECKER_TEST.to_string(),
            criteria: DEFAULT_CRITERIA.to_string(),
        }
    }

    /// Program from `KIWIGLIDER_COMPLIANCE_CHECKER`, falling back to
    /// `compliance-checker` on the `PATH`.
    pub fn from_env() -> Self {
        let program = env::var_os(CHECKER_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKER_PROGRAM));
        Self::new(program)
    }

    pub fn with_test(mut self, test: &str) -> Self {
        self.test = test.to_string();
        self
    }

    pub fn with_criteria(mut self, criteria: &str) -> Self {
        self.criteria = criteria.to_string();
        self
    }

    pub fn args(&self, data_file: &Path, report: &Path, verbosity: u8) -> Vec<String> {
        let mut args = vec![
            "--test".to_string(),
            self.test.clone(),
            "--criteria".to_string(),
            self.criteria.clone(),
            "--format".to_string(),
            "text".to_string(),
            "--output".to_string(),
            report.to_string_lossy().into_owned(),
        ];
        if verbosity > 0 {
            args.push(format!("-{}", "v".repeat(verbosity as usize)));
        }
        args.push(data_file.to_string_lossy().into_owned());
        args
    }
}

impl ComplianceChecker for CommandChecker {
    fn check(&self, data_file: &Path, report: &Path, verbosity: u8) -> Result<bool> {
        let status = Command::new(&self.program)
            .args(self.args(data_file, report, verbosity))
            .status()?;
        Ok(status.success())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileOutcome {
    Passed,
    Failed,
    AlreadyChecked,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub file: PathBuf,
    pub report: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub files: Vec<FileCheck>,
}

impl ComplianceReport {
    fn count(&self, wanted: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|file| wanted(&file.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Failed | FileOutcome::Error(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::AlreadyChecked))
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Checks every file in `directory` with the given extension.
///
/// Files that already have a report are skipped, so a rerun only checks
/// what is new. A checker that cannot be run for one file is recorded
/// against that file and the rest are still checked.
pub fn check_directory(
    directory: &Path,
    extension: &str,
    checker: &dyn ComplianceChecker,
    verbosity: u8,
) -> Result<ComplianceReport> {
    if !directory.is_dir() {
        return Err(PipelineError::Precondition(format!(
            "nothing to check: {} does not exist",
            directory.display()
        )));
    }

    let mut data_files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            data_files.push(path);
        }
    }
    data_files.sort();

    let mut report = ComplianceReport::default();
    for file in data_files {
        let report_file = report_path(&file);
        let outcome = if report_file.exists() {
            info!(file = %file.display(), "already checked, skipping");
            FileOutcome::AlreadyChecked
        } else {
            info!(file = %file.display(), "checking compliance");
            match checker.check(&file, &report_file, verbosity) {
                Ok(true) => FileOutcome::Passed,
                Ok(false) => {
                    warn!(file = %file.display(), report = %report_file.display(), "compliance check failed");
                    FileOutcome::Failed
                }
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "could not run compliance checker");
                    FileOutcome::Error(err.to_string())
                }
            }
        };
        report.files.push(FileCheck {
            file,
            report: report_file,
            outcome,
        });
    }

    info!(
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped(),
        "compliance checks finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_name_stops_at_first_dot() {
        assert_eq!(
            report_path(Path::new("/data/L1/GLD0001.delayed.nc")),
            PathBuf::from("/data/L1/GLD0001_report.txt")
        );
    }

    #[test]
    fn command_arguments_follow_verbosity() {
        let checker = CommandChecker::new("cchecker");
        let args = checker.args(Path::new("a.nc"), Path::new("a_report.txt"), 2);
        assert_eq!(
            args,
            vec![
                "--test", "gliderdac", "--criteria", "normal", "--format", "text", "--output",
                "a_report.txt", "-vv", "a.nc"
            ]
        );
        let quiet = checker.args(Path::new("a.nc"), Path::new("a_report.txt"), 0);
        assert!(!quiet.iter().any(|arg| arg.starts_with("-v")));
    }
}
