//! Raw controller log reading.
//!
//! Turns exported log bytes into positional `RawRecord`s: corrupt bytes are
//! stripped, lines are split on `;` with quoting disabled, and every field
//! is cleaned of quote/backslash artifacts and whitespace. Lines that do not
//! yield exactly twelve fields are skipped and counted, never fatal.

use crate::constants::{LOG_DELIMITER, RAW_FIELD_COUNT, SUPPORTED_LOG_EXTENSIONS};
use crate::error::{Result, SorterError};
use crate::models::{RawRecord, ReadStats};
use std::path::Path;
use tracing::{debug, warn};

/// Result of keeping one message family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub kept: usize,
}

impl FilterStats {
    pub fn dropped(&self) -> usize {
        self.total - self.kept
    }
}

/// Reject paths whose extension is not a supported log export
pub fn ensure_supported_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if SUPPORTED_LOG_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(SorterError::UnsupportedFileType {
            path: path.to_path_buf(),
            extension,
        })
    }
}

/// Read and parse one log export from disk
pub fn read_log_file(path: &Path) -> Result<(Vec<RawRecord>, ReadStats)> {
    if !path.exists() {
        return Err(SorterError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    ensure_supported_extension(path)?;

    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    let (records, stats) = parse_log_bytes(&bytes)?;
    if stats.malformed_lines > 0 {
        warn!(
            "{}: dropped {} of {} lines that did not split into {} fields",
            path.display(),
            stats.malformed_lines,
            stats.lines_total - stats.blank_lines,
            RAW_FIELD_COUNT
        );
    }
    Ok((records, stats))
}

/// Parse log bytes into raw records
pub fn parse_log_bytes(bytes: &[u8]) -> Result<(Vec<RawRecord>, ReadStats)> {
    let text = sanitize_bytes(bytes);
    let mut stats = ReadStats::default();

    for line in text.lines() {
        stats.lines_total += 1;
        if line.trim().is_empty() {
            stats.blank_lines += 1;
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(LOG_DELIMITER)
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                debug!("Skipping unreadable line: {}", e);
                stats.malformed_lines += 1;
                continue;
            }
        };

        let mut fields: Vec<String> = row.iter().map(clean_field).collect();

        if fields.len() == 1 && fields[0].is_empty() {
            // whitespace-only line, already counted as blank
            continue;
        }

        // A trailing `;` yields one extra empty field
        if fields.len() == RAW_FIELD_COUNT + 1 && fields[RAW_FIELD_COUNT].is_empty() {
            fields.truncate(RAW_FIELD_COUNT);
        }

        match RawRecord::from_fields(fields) {
            Some(record) => {
                stats.records_read += 1;
                records.push(record);
            }
            None => {
                debug!(
                    "Skipping line {} with {} fields",
                    row.position().map_or(0, |pos| pos.line()),
                    row.len()
                );
                stats.malformed_lines += 1;
            }
        }
    }

    Ok((records, stats))
}

/// Decode bytes leniently and drop NUL/control characters
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|ch| *ch == '\n' || *ch == '\r' || *ch == '\t' || !ch.is_control())
        .filter(|ch| *ch != '\u{feff}')
        .collect()
}

/// Remove quote and backslash artifacts and all whitespace from a field
pub fn clean_field(field: &str) -> String {
    field
        .chars()
        .filter(|ch| *ch != '"' && *ch != '\\' && !ch.is_whitespace())
        .collect()
}

/// Keep only records carrying `message_code`
pub fn filter_by_message_code(
    records: Vec<RawRecord>,
    message_code: &str,
) -> (Vec<RawRecord>, FilterStats) {
    let total = records.len();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter(|record| record.message_code == message_code)
        .collect();

    let stats = FilterStats {
        total,
        kept: kept.len(),
    };
    debug!(
        "Kept {} rows with messageCode = {}, dropped {} of {} total rows",
        stats.kept,
        message_code,
        stats.dropped(),
        stats.total
    );
    (kept, stats)
}
