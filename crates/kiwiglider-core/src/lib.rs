// crates/kiwiglider-core/src/lib.rs

//! Glider deployment processing: configuration, QARTOD annotation, staging and reporting.

pub mod error;
pub mod dataset;
pub mod archive;
pub mod config;
pub mod qc_params;
pub mod qc;
pub mod metadata;
pub mod binaries;
pub mod decode;
pub mod pipeline;
pub mod compliance;
pub mod summary;
pub mod geo;
#[cfg(feature = "netcdf")]
pub mod netcdf_export;
