// crates/kiwiglider-core/src/archive.rs

// Dataset archives: a zip holding `manifest.json` and `data.parquet`.
//
// The manifest carries every attribute the parquet file cannot hold plus a
// blake3 hash of the parquet bytes, checked again on read.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use ::zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Attributes, TimeSeriesDataset};

pub const ARCHIVE_EXTENSION: &str = "kgz";

const MANIFEST_PATH: &str = "manifest.json";
const DATA_PATH: &str = "data.parquet";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("JSON operation failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ZIP operation failed: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Manifest is missing or corrupt")]
    MissingManifest,
    #[error("Data file '{0}' is missing from archive")]
    MissingDataFile(String),
    #[error("Unsupported archive format version {0}")]
    UnsupportedVersion(u32),
    #[error("Data hash mismatch: manifest records {expected}, data hashes to {found}")]
    HashMismatch { expected: String, found: String },
    #[error("Archive data is not a valid dataset: {0}")]
    InvalidDataset(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    data_hash: String,
    data_path: String,
    rows: usize,
    global_attributes: Attributes,
    variables: BTreeMap<String, Attributes>,
}

pub fn to_zip_bytes(dataset: &TimeSeriesDataset) -> Result<Vec<u8>, ArchiveError> {
    let mut frame = dataset.frame().clone();
    let mut data_bytes = Vec::new();
    ParquetWriter::new(&mut data_bytes).finish(&mut frame)?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        data_hash: blake3::hash(&data_bytes).to_hex().to_string(),
        data_path: DATA_PATH.to_string(),
        rows: dataset.height(),
        global_attributes: dataset.global_attributes().clone(),
        variables: dataset.variable_attributes().clone(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&manifest_bytes)?;
    zip.start_file(DATA_PATH, options)?;
    zip.write_all(&data_bytes)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn from_zip_bytes(zip_bytes: &[u8]) -> Result<TimeSeriesDataset, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;

    let manifest: Manifest = {
        let mut manifest_file = archive
            .by_name(MANIFEST_PATH)
            .map_err(|_| ArchiveError::MissingManifest)?;
        let mut manifest_bytes = Vec::new();
        manifest_file.read_to_end(&mut manifest_bytes)?;
        serde_json::from_slice(&manifest_bytes)?
    };
    if manifest.format_version != FORMAT_VERSION {
        return Err(ArchiveError::UnsupportedVersion(manifest.format_version));
    }

    let data_bytes = {
        let mut data_file = archive
            .by_name(&manifest.data_path)
            .map_err(|_| ArchiveError::MissingDataFile(manifest.data_path.clone()))?;
        let mut bytes = Vec::new();
        data_file.read_to_end(&mut bytes)?;
        bytes
    };

    let found = blake3::hash(&data_bytes).to_hex().to_string();
    if found != manifest.data_hash {
        return Err(ArchiveError::HashMismatch {
            expected: manifest.data_hash,
            found,
        });
    }

    let frame = ParquetReader::new(Cursor::new(data_bytes)).finish()?;
    if frame.height() != manifest.rows {
        return Err(ArchiveError::InvalidDataset(format!(
            "manifest records {} rows, data holds {}",
            manifest.rows,
            frame.height()
        )));
    }

    TimeSeriesDataset::from_parts(frame, manifest.variables, manifest.global_attributes)
        .map_err(|err| ArchiveError::InvalidDataset(err.to_string()))
}

pub fn write_archive(dataset: &TimeSeriesDataset, path: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_zip_bytes(dataset)?)?;
    Ok(())
}

pub fn read_archive(path: &Path) -> Result<TimeSeriesDataset, ArchiveError> {
    let bytes = fs::read(path)?;
    from_zip_bytes(&bytes)
}
