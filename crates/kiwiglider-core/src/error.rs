// crates/kiwiglider-core/src/error.rs

use kiwiglider_qartod::QartodError;
use thiserror::Error;

use crate::archive::ArchiveError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Dataset archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("File discovery error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("QARTOD error: {0}")]
    Qartod(#[from] QartodError),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
