//! Sorter Log Processor Library
//!
//! Turns the semicolon-delimited log exports of a parcel sorter controller
//! into analysis tables for operations engineers.
//!
//! This library provides tools for:
//! - Reading raw log lines and decoding their `->{key:value,...}<` payloads
//! - Expanding list-valued fields into one row per attempt
//! - Selecting analysis windows against the dataset bounds
//! - Enriching sort events with site destination mappings
//! - Correcting operator-confirmed false-positive scan defects
//! - Reconstructing packages from repeated item ids
//! - Scanner, sort-code, defect, recirculation, jackpot, rate and destination metrics
//! - Summarizing HMI alarm exports
//! - Exporting every result table as CSV or Parquet

pub mod alarms;
pub mod cli;
pub mod config;
pub mod constants;
pub mod correction;
pub mod decoder;
pub mod enrichment;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod packages;
pub mod pipeline;
pub mod processor;
pub mod reader;
pub mod report;
pub mod schema;
pub mod table;
pub mod window;

// Re-export commonly used types
pub use config::AnalysisConfig;
pub use error::{Result, SorterError};
pub use processor::{AnalysisKind, LogProcessor, MappingSource, PresetChoices, RunChoices};
pub use report::AnalysisReport;
pub use window::{DatasetBounds, ResolvedWindow, WindowRequest};
