//! Error handling for sorter log processing.
//!
//! Recoverable data problems (malformed lines, bad payload pairs, unmapped
//! keys) never surface here; they are counted and logged where they occur.
//! These variants cover the precondition failures that stop a run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SorterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Config file error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Unsupported file type '{extension}' for {path} (supported: .csv, .log, .txt)")]
    UnsupportedFileType { path: PathBuf, extension: String },

    #[error("No input files found under {path}")]
    NoInputFiles { path: PathBuf },

    #[error("Empty dataset: {reason}")]
    EmptyDataset { reason: String },

    #[error("Could not parse '{input}' as a time or datetime: {reason}")]
    InvalidTimeInput { input: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to load mapping file {path}: {reason}")]
    MappingLoad { path: PathBuf, reason: String },

    #[error("Failed to load alarm export {path}: {reason}")]
    AlarmExport { path: PathBuf, reason: String },

    #[error("Export failed for {path}: {reason}")]
    ExportFailed { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SorterError>;
