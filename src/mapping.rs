//! Site destination mapping.
//!
//! Each site ships a table keyed by the sorter's integer destination id
//! (`IndexNo`) giving the Amazon-convention name, the Beumer-convention
//! chute code, and an optional flag column (`Jackpot`). The table is loaded
//! once per run and is read-only afterwards.

use crate::error::{Result, SorterError};
use crate::models::parse_integral;
use crate::reader::sanitize_bytes;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Names and flag for one destination id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestinationInfo {
    pub amazon: Option<String>,
    pub beumer: Option<String>,
    pub jackpot: Option<String>,
}

/// Lookup from destination id to its names
#[derive(Debug, Clone, Default)]
pub struct DestinationMap {
    entries: HashMap<i64, DestinationInfo>,
    by_beumer: HashMap<String, i64>,
    skipped_rows: usize,
}

/// Pick `;` or `,` by counting them in the header line
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn header_index(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        names
            .iter()
            .any(|name| header.trim().eq_ignore_ascii_case(name))
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

impl DestinationMap {
    /// Load a mapping CSV (`,` or `;` separated)
    pub fn load(path: &Path) -> Result<Self> {
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
        let map = Self::from_text(&text).map_err(|e| match e {
            SorterError::MappingLoad { reason, .. } => SorterError::MappingLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        debug!(
            "Loaded {} destinations from {}",
            map.len(),
            path.display()
        );
        if map.skipped_rows > 0 {
            warn!(
                "{}: skipped {} mapping rows without an integer IndexNo",
                path.display(),
                map.skipped_rows
            );
        }
        Ok(map)
    }

    /// Parse mapping text with a header row
    pub fn from_text(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(detect_delimiter(text))
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let missing = |column: &str| SorterError::MappingLoad {
            path: Default::default(),
            reason: format!("missing '{}' column", column),
        };
        let index_col = header_index(&headers, &["IndexNo"]).ok_or_else(|| missing("IndexNo"))?;
        let amazon_col = header_index(&headers, &["Amazon"]).ok_or_else(|| missing("Amazon"))?;
        let beumer_col =
            header_index(&headers, &["Beumer", "Buemer"]).ok_or_else(|| missing("Beumer"))?;
        let jackpot_col = header_index(&headers, &["Jackpot"]);

        let mut map = DestinationMap::default();
        for row in reader.records() {
            let row = row?;
            let Some(id) = row.get(index_col).and_then(parse_integral) else {
                map.skipped_rows += 1;
                continue;
            };

            map.insert(
                id,
                DestinationInfo {
                    amazon: non_empty(row.get(amazon_col)),
                    beumer: non_empty(row.get(beumer_col)),
                    jackpot: jackpot_col.and_then(|col| non_empty(row.get(col))),
                },
            );
        }

        Ok(map)
    }

    /// Add or replace a destination; the first id seen for a Beumer code
    /// answers reverse lookups
    pub fn insert(&mut self, id: i64, info: DestinationInfo) {
        if let Some(beumer) = &info.beumer {
            self.by_beumer.entry(beumer.clone()).or_insert(id);
        }
        self.entries.insert(id, info);
    }

    pub fn get(&self, id: i64) -> Option<&DestinationInfo> {
        self.entries.get(&id)
    }

    /// Amazon name for a Beumer chute code
    pub fn amazon_for_beumer(&self, beumer: &str) -> Option<&str> {
        self.by_beumer
            .get(beumer.trim())
            .and_then(|id| self.entries.get(id))
            .and_then(|info| info.amazon.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}
