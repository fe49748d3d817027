//! False-positive scan defect correction.
//!
//! Operators supply a list of destination index ids with a comment each.
//! Every list entry consumes the next unused scan-defect event at that
//! index and turns it into a success, so an id listed twice corrects two
//! events. Entries left without a candidate are reported, not fatal.

use crate::enrichment::derive_sort_outcome;
use crate::error::{Result, SorterError};
use crate::mapping::detect_delimiter;
use crate::models::{SortEvent, parse_integral};
use crate::reader::sanitize_bytes;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// One line of an exception list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub raw_id: String,
    pub comment: String,
}

/// Outcome of applying an exception list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub corrected: usize,
    /// Padded ids that corrected an event, one per correction
    pub matched_ids: Vec<String>,
    /// Padded ids whose entry found no unused candidate, one per entry
    pub not_applied: Vec<String>,
    /// Raw ids that are not integers
    pub invalid_ids: Vec<String>,
}

/// `12`, `12.0` and `0012` all become `0012`
pub fn pad_index_id(raw: &str) -> Option<String> {
    parse_integral(raw)
        .filter(|id| *id >= 0)
        .map(|id| format!("{:04}", id))
}

/// Load an exception list: header row, then id and comment columns
pub fn load_exception_list(path: &Path) -> Result<Vec<ExceptionEntry>> {
    if !path.exists() {
        return Err(SorterError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if extension != "csv" && extension != "txt" {
        return Err(SorterError::UnsupportedFileType {
            path: path.to_path_buf(),
            extension,
        });
    }

    let text = sanitize_bytes(&std::fs::read(path)?);
    let entries = parse_exception_list(&text)?;
    debug!("Loaded {} exception entries from {}", entries.len(), path.display());
    Ok(entries)
}

pub fn parse_exception_list(text: &str) -> Result<Vec<ExceptionEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row?;
        let raw_id = row.get(0).unwrap_or_default().trim();
        if raw_id.is_empty() {
            continue;
        }
        entries.push(ExceptionEntry {
            raw_id: raw_id.to_string(),
            comment: row.get(1).unwrap_or_default().trim().to_string(),
        });
    }
    Ok(entries)
}

/// Turn listed scan-defect events into successes
pub fn apply_corrections(
    events: &mut [SortEvent],
    entries: &[ExceptionEntry],
    scan_defect_codes: &[i64],
) -> CorrectionReport {
    let mut report = CorrectionReport::default();
    let mut used: HashSet<usize> = HashSet::new();

    let candidates: Vec<(usize, Option<String>)> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| {
            event
                .sort_code
                .is_some_and(|code| scan_defect_codes.contains(&code))
        })
        .map(|(position, event)| {
            let index = event.index_no.as_deref().and_then(pad_index_id);
            (position, index)
        })
        .collect();

    for entry in entries {
        let Some(padded) = pad_index_id(&entry.raw_id) else {
            report.invalid_ids.push(entry.raw_id.clone());
            continue;
        };

        let candidate = candidates
            .iter()
            .find(|(position, index)| {
                !used.contains(position) && index.as_deref() == Some(padded.as_str())
            })
            .map(|(position, _)| *position);

        match candidate {
            Some(position) => {
                let event = &mut events[position];
                event.sort_code = Some(0);
                event.explanation = Some(entry.comment.clone());
                derive_sort_outcome(event);
                used.insert(position);
                report.corrected += 1;
                report.matched_ids.push(padded);
            }
            None => report.not_applied.push(padded),
        }
    }

    info!(
        "Changed sort code to success for {} scan-defect events",
        report.corrected
    );
    if !report.not_applied.is_empty() {
        warn!(
            "IDs not applied (no scan-defect event left): {}",
            report.not_applied.join(", ")
        );
    }
    if !report.invalid_ids.is_empty() {
        warn!("Ignored non-integer IDs: {}", report.invalid_ids.join(", "));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortReason;

    fn defect(index: &str, code: i64) -> SortEvent {
        let mut event = SortEvent {
            index_no: Some(index.to_string()),
            sort_code: Some(code),
            ..SortEvent::default()
        };
        derive_sort_outcome(&mut event);
        event
    }

    fn entry(id: &str, comment: &str) -> ExceptionEntry {
        ExceptionEntry {
            raw_id: id.to_string(),
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_id_padding() {
        assert_eq!(pad_index_id("12").as_deref(), Some("0012"));
        assert_eq!(pad_index_id("12.0").as_deref(), Some("0012"));
        assert_eq!(pad_index_id("0012").as_deref(), Some("0012"));
        assert_eq!(pad_index_id("12345").as_deref(), Some("12345"));
        assert_eq!(pad_index_id("twelve"), None);
    }

    #[test]
    fn test_duplicate_ids_consume_distinct_events() {
        let mut events = vec![defect("0012", 8)];
        let report = apply_corrections(
            &mut events,
            &[entry("12", "label ok"), entry("12.0", "again")],
            &[8, 9, 10],
        );

        assert_eq!(report.corrected, 1);
        assert_eq!(report.matched_ids, vec!["0012".to_string()]);
        assert_eq!(report.not_applied, vec!["0012".to_string()]);
        assert_eq!(events[0].sort_code, Some(0));
        assert_eq!(events[0].sort_reason, Some(SortReason::Success));
        assert_eq!(events[0].defect_category, None);
        assert_eq!(events[0].explanation.as_deref(), Some("label ok"));
    }

    #[test]
    fn test_only_scan_defects_are_candidates() {
        let mut events = vec![defect("0012", 14), defect("0012", 0), defect("0012", 10), defect("0012", 9)];
        let report = apply_corrections(
            &mut events,
            &[entry("12", "a"), entry("12", "b"), entry("12", "c"), entry("x", "d")],
            &[8, 9, 10],
        );

        assert_eq!(report.corrected, 2);
        assert_eq!(events[0].sort_code, Some(14));
        assert_eq!(events[2].explanation.as_deref(), Some("a"));
        assert_eq!(events[3].explanation.as_deref(), Some("b"));
        assert_eq!(report.not_applied.len(), 1);
        assert_eq!(report.invalid_ids, vec!["x".to_string()]);
    }

    #[test]
    fn test_parse_exception_list() {
        let entries = parse_exception_list("ID,Comment\n12,damaged label\n\n0034.0,\n").unwrap();
        assert_eq!(
            entries,
            vec![entry("12", "damaged label"), entry("0034.0", "")]
        );
    }
}
