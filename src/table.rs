//! Column-oriented view of decoded events.
//!
//! `EventTable` holds the base log columns followed by payload keys in
//! first-seen order. List expansion and column pruning operate on it, and
//! the typed event views for each message family are read from it.

use crate::config::RateConfig;
use crate::constants::{RAW_COLUMNS, TIMESTAMP_COLUMN};
use crate::decoder::parse_log_timestamp;
use crate::models::{
    DecodedEvent, DestinationRequestEvent, FieldValue, InductionEvent, SortEvent,
};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::sync::OnceLock;
use tracing::debug;

/// Rectangular table of field values
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
    /// Parsed `timeStamp` cells, filled on first use
    timestamps: OnceLock<Vec<Option<NaiveDateTime>>>,
}

impl PartialEq for EventTable {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

impl EventTable {
    /// Build a table from rows; short rows are padded with missing cells
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<FieldValue>>) -> Self {
        for row in &mut rows {
            row.resize(columns.len(), FieldValue::Missing);
        }
        Self {
            columns,
            rows,
            timestamps: OnceLock::new(),
        }
    }

    /// Base columns plus the union of payload keys
    pub fn from_decoded(events: &[DecodedEvent]) -> Self {
        let base: Vec<&str> = RAW_COLUMNS[..RAW_COLUMNS.len() - 1].to_vec();
        let mut columns: Vec<String> = base.iter().map(|name| name.to_string()).collect();

        for event in events {
            for (key, _) in &event.fields {
                if base.contains(&key.as_str()) {
                    continue;
                }
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = events
            .iter()
            .map(|event| {
                let mut row: Vec<FieldValue> = event
                    .record
                    .base_fields()
                    .iter()
                    .map(|value| FieldValue::text(*value))
                    .collect();
                row.resize(columns.len(), FieldValue::Missing);

                for (key, value) in &event.fields {
                    if base.contains(&key.as_str()) {
                        debug!("Payload key '{}' shadows a base column, ignored", key);
                        continue;
                    }
                    if let Some(index) = columns.iter().position(|column| column == key) {
                        row[index] = value.clone();
                    }
                }
                row
            })
            .collect();

        Self {
            columns,
            rows,
            timestamps: OnceLock::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<FieldValue>>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cell lookup by column name
    pub fn value<'a>(&'a self, row: &'a [FieldValue], name: &str) -> Option<&'a FieldValue> {
        self.column_index(name).and_then(|index| row.get(index))
    }

    /// Keep `names` in the given order; returns the names that were absent
    pub fn select(&self, names: &[&str]) -> (EventTable, Vec<String>) {
        let mut indices = Vec::new();
        let mut kept = Vec::new();
        let mut missing = Vec::new();

        for name in names {
            match self.column_index(name) {
                Some(index) => {
                    indices.push(index);
                    kept.push(name.to_string());
                }
                None => missing.push(name.to_string()),
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
            .collect();

        let timestamps = match self.timestamps.get() {
            Some(parsed) if kept.iter().any(|name| name == TIMESTAMP_COLUMN) => {
                OnceLock::from(parsed.clone())
            }
            _ => OnceLock::new(),
        };

        (
            EventTable {
                columns: kept,
                rows,
                timestamps,
            },
            missing,
        )
    }

    /// Parsed timestamp per row; `None` where the cell is missing or unreadable
    pub fn timestamps(&self) -> &[Option<NaiveDateTime>] {
        self.timestamps.get_or_init(|| {
            let Some(index) = self.column_index(TIMESTAMP_COLUMN) else {
                return vec![None; self.rows.len()];
            };
            self.rows
                .iter()
                .map(|row| {
                    row[index]
                        .as_text()
                        .and_then(|text| parse_log_timestamp(&text))
                })
                .collect()
        })
    }

    /// Render as a string-typed DataFrame; the timestamp column is formatted
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let values: Vec<Option<String>> = if name == TIMESTAMP_COLUMN {
                    self.timestamps()
                        .iter()
                        .map(|ts| ts.map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()))
                        .collect()
                } else {
                    self.rows.iter().map(|row| row[index].as_text()).collect()
                };
                Column::new(name.as_str().into(), values)
            })
            .collect();

        DataFrame::new(columns)
    }

    fn text(&self, row: &[FieldValue], name: &str) -> Option<String> {
        self.value(row, name).and_then(FieldValue::as_text)
    }

    fn integer(&self, row: &[FieldValue], name: &str) -> Option<i64> {
        self.value(row, name).and_then(FieldValue::as_i64)
    }

    /// Typed sort-outcome events, before enrichment
    pub fn to_sort_events(&self) -> Vec<SortEvent> {
        self.rows
            .iter()
            .zip(self.timestamps())
            .map(|(row, timestamp)| SortEvent {
                timestamp: *timestamp,
                plc_record_no: self.text(row, "plcRecordNo"),
                item_id: self.text(row, "itemID"),
                index_no: self.text(row, "indexNo"),
                location: self.text(row, "locationAWCS"),
                barcode: self.text(row, "barcodeAWCS"),
                actual_destination: self.integer(row, "actualDestMCID"),
                requested_destination: self.integer(row, "requestedDestMCID"),
                sort_code: self.integer(row, "sortCode"),
                ..SortEvent::default()
            })
            .collect()
    }

    /// Typed items-inducted events with induction names resolved
    pub fn to_induction_events(&self, rate: &RateConfig) -> Vec<InductionEvent> {
        self.rows
            .iter()
            .zip(self.timestamps())
            .map(|(row, timestamp)| {
                let induction_no = self.text(row, "inductionNo");
                InductionEvent {
                    timestamp: *timestamp,
                    item_id: self.text(row, "itemID"),
                    index_no: self.text(row, "indexNo"),
                    induction: rate.induction_name(induction_no.as_deref()),
                    induction_no,
                }
            })
            .collect()
    }

    /// Typed destination-request events
    pub fn to_destination_requests(&self) -> Vec<DestinationRequestEvent> {
        self.rows
            .iter()
            .zip(self.timestamps())
            .map(|(row, timestamp)| DestinationRequestEvent {
                timestamp: *timestamp,
                item_id: self.text(row, "itemID"),
                barcode: self.text(row, "barcodeAWCS"),
                requested_destination: self.text(row, "requestedDestMCID"),
                sort_code: self.integer(row, "sortCode"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_record;
    use crate::models::RawRecord;

    fn record(timestamp: &str, payload: &str) -> RawRecord {
        RawRecord {
            timestamp: timestamp.to_string(),
            message_code: "54177".to_string(),
            payload: payload.to_string(),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_payload_columns_in_first_seen_order() {
        let events = vec![
            decode_record(record("250924100000000", "->{itemID:1,sortCode:[0]}<")),
            decode_record(record("250924100001000", "->{barcodeAWCS:X,itemID:2}<")),
        ];
        let table = EventTable::from_decoded(&events);

        let payload_columns: Vec<&str> = table.columns()[11..].iter().map(String::as_str).collect();
        assert_eq!(payload_columns, vec!["itemID", "sortCode", "barcodeAWCS"]);
        assert_eq!(table.len(), 2);

        let second = &table.rows()[1];
        assert!(table.value(second, "sortCode").unwrap().is_missing());
        assert_eq!(
            table.value(second, "barcodeAWCS"),
            Some(&FieldValue::text("X"))
        );
    }

    #[test]
    fn test_select_reports_missing_columns() {
        let table = EventTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![FieldValue::int(1), FieldValue::int(2)]],
        );
        let (selected, missing) = table.select(&["b", "c"]);
        assert_eq!(selected.columns(), &["b".to_string()]);
        assert_eq!(selected.rows()[0], vec![FieldValue::int(2)]);
        assert_eq!(missing, vec!["c".to_string()]);
    }

    #[test]
    fn test_to_sort_events() {
        let table = EventTable::new(
            vec![
                "timeStamp".into(),
                "itemID".into(),
                "sortCode".into(),
                "requestedDestMCID".into(),
            ],
            vec![vec![
                FieldValue::text("250924100000000"),
                FieldValue::text("77"),
                FieldValue::int(8),
                FieldValue::text("3001"),
            ]],
        );
        let events = table.to_sort_events();
        assert_eq!(events[0].item_id.as_deref(), Some("77"));
        assert_eq!(events[0].sort_code, Some(8));
        assert_eq!(events[0].requested_destination, Some(3001));
        assert!(events[0].timestamp.is_some());
        assert_eq!(events[0].barcode, None);
    }

    #[test]
    fn test_timestamps_parsed_once_per_table() {
        let table = EventTable::new(
            vec!["timeStamp".into(), "itemID".into()],
            vec![
                vec![FieldValue::text("250924100000000"), FieldValue::text("1")],
                vec![FieldValue::text("not a time"), FieldValue::text("2")],
                vec![FieldValue::Missing, FieldValue::text("3")],
            ],
        );

        let first = table.timestamps().as_ptr();
        let sort_events = table.to_sort_events();
        let requests = table.to_destination_requests();
        assert_eq!(table.timestamps().as_ptr(), first);

        assert!(sort_events[0].timestamp.is_some());
        assert_eq!(sort_events[1].timestamp, None);
        assert_eq!(requests[2].timestamp, None);
        assert_eq!(sort_events[0].timestamp, requests[0].timestamp);

        let (selected, _) = table.select(&["timeStamp"]);
        assert_eq!(selected.timestamps(), table.timestamps());

        let (without, _) = table.select(&["itemID"]);
        assert_eq!(without.timestamps(), &[None, None, None]);
    }

    #[test]
    fn test_to_dataframe_formats_timestamps() {
        let table = EventTable::new(
            vec!["timeStamp".into(), "itemID".into()],
            vec![vec![
                FieldValue::text("250924100000123"),
                FieldValue::text("1"),
            ]],
        );
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.shape(), (1, 2));
        let ts = df.column("timeStamp").unwrap().str().unwrap().get(0);
        assert_eq!(ts, Some("2025-09-24 10:00:00.123"));
    }
}
