//! List alignment and expansion.
//!
//! A sort report can carry several attempts in parallel list fields
//! (`sortCode:[5,0]`, `requestedDestMCID:[1001,3001]`). Lists are padded to
//! a common length with a per-field sentinel and the row is expanded
//! position by position, so index `i` of every list describes the same
//! attempt. Rows where a must-resolve field still holds its sentinel are
//! padding and get dropped.

use crate::models::{ExpansionStats, FieldValue, Scalar};
use crate::table::EventTable;
use tracing::debug;

/// A list-capable column and its padding sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct ListField {
    pub name: String,
    pub sentinel: Scalar,
    pub must_resolve: bool,
}

impl ListField {
    /// Numeric-coded field padded with an integer sentinel; padded rows are dropped
    pub fn numeric(name: &str, sentinel: i64) -> Self {
        Self {
            name: name.to_string(),
            sentinel: Scalar::Int(sentinel),
            must_resolve: true,
        }
    }

    /// Status field padded with a text sentinel; padded rows are kept
    pub fn status(name: &str, sentinel: &str) -> Self {
        Self {
            name: name.to_string(),
            sentinel: Scalar::Text(sentinel.to_string()),
            must_resolve: false,
        }
    }

    fn holds_sentinel(&self, value: &FieldValue) -> bool {
        match (&self.sentinel, value) {
            (Scalar::Int(sentinel), value) => value.as_i64() == Some(*sentinel),
            (Scalar::Text(sentinel), FieldValue::Scalar(Scalar::Text(text))) => text == sentinel,
            _ => false,
        }
    }

    /// Element `position` of a padded cell
    fn element(&self, value: &FieldValue, position: usize) -> FieldValue {
        let sentinel = || FieldValue::Scalar(self.sentinel.clone());
        match value {
            FieldValue::List(items) => items
                .get(position)
                .cloned()
                .map(FieldValue::Scalar)
                .unwrap_or_else(sentinel),
            other if position == 0 => other.clone(),
            _ => sentinel(),
        }
    }
}

/// Expand each row into one row per aligned list position
///
/// Fields absent from the table are ignored. A row whose lists are all
/// empty pads to a single position.
pub fn expand_lists(table: &EventTable, fields: &[ListField]) -> (EventTable, ExpansionStats) {
    let present: Vec<(usize, &ListField)> = fields
        .iter()
        .filter_map(|field| table.column_index(&field.name).map(|index| (index, field)))
        .collect();

    let mut stats = ExpansionStats {
        input_rows: table.len(),
        ..ExpansionStats::default()
    };

    if present.is_empty() {
        debug!("No list fields present, expansion skipped");
        stats.expanded_rows = table.len();
        return (table.clone(), stats);
    }

    let mut rows = Vec::with_capacity(table.len());
    for row in table.rows() {
        let width = present
            .iter()
            .map(|(index, _)| row[*index].list_len())
            .max()
            .unwrap_or(1)
            .max(1);

        for position in 0..width {
            stats.expanded_rows += 1;
            let mut expanded = row.clone();
            for (index, field) in &present {
                expanded[*index] = field.element(&row[*index], position);
            }

            let padded = present
                .iter()
                .any(|(index, field)| field.must_resolve && field.holds_sentinel(&expanded[*index]));
            if padded {
                stats.sentinel_dropped += 1;
            } else {
                rows.push(expanded);
            }
        }
    }

    debug!(
        "Expanded {} rows into {} ({} padding rows dropped)",
        stats.input_rows, stats.expanded_rows, stats.sentinel_dropped
    );

    (EventTable::new(table.columns().to_vec(), rows), stats)
}

/// Replace each named list cell with its first element
pub fn first_list_element(table: &EventTable, names: &[&str]) -> EventTable {
    let indices: Vec<usize> = names
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut row = row.clone();
            for &index in &indices {
                if let FieldValue::List(items) = &row[index] {
                    row[index] = items
                        .first()
                        .cloned()
                        .map(FieldValue::Scalar)
                        .unwrap_or(FieldValue::Missing);
                }
            }
            row
        })
        .collect();

    EventTable::new(table.columns().to_vec(), rows)
}
