//! Core data structures and types for sorter log processing.
//!
//! Defines raw and decoded records, the typed events each message family
//! produces, the fixed sort-reason table, and the statistics structs the
//! pipeline stages report.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value found in a decoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Integer view of the value; integral floats and numeric text qualify
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            Scalar::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(*value as i64)
            }
            Scalar::Float(_) => None,
            Scalar::Text(text) => parse_integral(text),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Parse `"12"`, `" 12 "` or `"12.0"` as an integer
pub fn parse_integral(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Some(value as i64),
        _ => None,
    }
}

/// One cell of an event table
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Missing,
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::Text(value.into()))
    }

    pub fn int(value: i64) -> Self {
        FieldValue::Scalar(Scalar::Int(value))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_i64)
    }

    /// Text rendering; `None` for missing cells and empty text
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Scalar(Scalar::Text(text)) if text.is_empty() => None,
            other => Some(other.to_string()),
        }
    }

    /// Length used when aligning list columns; scalars and missing cells count as one
    pub fn list_len(&self) -> usize {
        match self {
            FieldValue::List(items) => items.len(),
            _ => 1,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => Ok(()),
            FieldValue::Scalar(scalar) => write!(f, "{}", scalar),
            FieldValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", rendered.join(","))
            }
        }
    }
}

/// One positional log line after character cleanup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord {
    pub timestamp: String,
    pub flag: String,
    pub system_name: String,
    pub ip_address: String,
    pub sender: String,
    pub unknown: String,
    pub unknown_2: String,
    pub plc_timestamp: String,
    pub cabinet_name: String,
    pub message_code: String,
    pub sequence_no: String,
    pub payload: String,
}

impl RawRecord {
    /// Build from exactly twelve cleaned fields
    pub fn from_fields(fields: Vec<String>) -> Option<Self> {
        let [
            timestamp,
            flag,
            system_name,
            ip_address,
            sender,
            unknown,
            unknown_2,
            plc_timestamp,
            cabinet_name,
            message_code,
            sequence_no,
            payload,
        ]: [String; 12] = fields.try_into().ok()?;

        Some(Self {
            timestamp,
            flag,
            system_name,
            ip_address,
            sender,
            unknown,
            unknown_2,
            plc_timestamp,
            cabinet_name,
            message_code,
            sequence_no,
            payload,
        })
    }

    /// Every field except the payload, in column order
    pub fn base_fields(&self) -> [&str; 11] {
        [
            &self.timestamp,
            &self.flag,
            &self.system_name,
            &self.ip_address,
            &self.sender,
            &self.unknown,
            &self.unknown_2,
            &self.plc_timestamp,
            &self.cabinet_name,
            &self.message_code,
            &self.sequence_no,
        ]
    }

    /// All twelve fields, in column order
    pub fn all_fields(&self) -> Vec<&str> {
        let mut fields = self.base_fields().to_vec();
        fields.push(&self.payload);
        fields
    }
}

/// A raw record with its payload expanded into named fields
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub record: RawRecord,
    pub timestamp: Option<NaiveDateTime>,
    pub fields: Vec<(String, FieldValue)>,
}

impl DecodedEvent {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Category grouping of sort reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefectCategory {
    ScanDefect,
    MheDefect,
}

impl DefectCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DefectCategory::ScanDefect => "Scan Defect",
            DefectCategory::MheDefect => "MHE Defect",
        }
    }
}

/// Sorter outcome reasons keyed by their numeric sort code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortReason {
    Success,
    Unknown,
    UnexpectedContainer,
    TrackingError,
    GapError,
    DestinationFull,
    DestinationNonOperational,
    InvalidDestination,
    NoRead,
    NoCode,
    MultiLabel,
    Reserved11,
    DestinationDisabled,
    ThroughputLimit,
    FailedToDivert,
    Reserved15,
    NoDestinationReceived,
    LostContainer,
    DimensionError,
    WeightError,
    ContainerUtilization,
    UnableToDivert,
    DestinationNotAttempted,
}

impl SortReason {
    const ALL: [SortReason; 23] = [
        SortReason::Success,
        SortReason::Unknown,
        SortReason::UnexpectedContainer,
        SortReason::TrackingError,
        SortReason::GapError,
        SortReason::DestinationFull,
        SortReason::DestinationNonOperational,
        SortReason::InvalidDestination,
        SortReason::NoRead,
        SortReason::NoCode,
        SortReason::MultiLabel,
        SortReason::Reserved11,
        SortReason::DestinationDisabled,
        SortReason::ThroughputLimit,
        SortReason::FailedToDivert,
        SortReason::Reserved15,
        SortReason::NoDestinationReceived,
        SortReason::LostContainer,
        SortReason::DimensionError,
        SortReason::WeightError,
        SortReason::ContainerUtilization,
        SortReason::UnableToDivert,
        SortReason::DestinationNotAttempted,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn code(&self) -> i64 {
        Self::ALL
            .iter()
            .position(|reason| reason == self)
            .map_or(-1, |index| index as i64)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortReason::Success => "Success",
            SortReason::Unknown => "Unknown",
            SortReason::UnexpectedContainer => "Unexpected_Container",
            SortReason::TrackingError => "Tracking_Error",
            SortReason::GapError => "Gap_Error",
            SortReason::DestinationFull => "Destination_Full",
            SortReason::DestinationNonOperational => "Destination_Non_Operational",
            SortReason::InvalidDestination => "Invalid_Destination",
            SortReason::NoRead => "No_Read",
            SortReason::NoCode => "No_Code",
            SortReason::MultiLabel => "Multi_Label",
            SortReason::Reserved11 | SortReason::Reserved15 => "<reserved>",
            SortReason::DestinationDisabled => "Destination_Disabled",
            SortReason::ThroughputLimit => "Throughput_Limit",
            SortReason::FailedToDivert => "Failed_To_Divert",
            SortReason::NoDestinationReceived => "No_Destination_Received",
            SortReason::LostContainer => "Lost_Container",
            SortReason::DimensionError => "Dimension_Error",
            SortReason::WeightError => "Weight_Error",
            SortReason::ContainerUtilization => "Container_Utilization",
            SortReason::UnableToDivert => "Unable_To_Divert",
            SortReason::DestinationNotAttempted => "Destination_Not_Attempted",
        }
    }

    pub fn defect_category(&self) -> Option<DefectCategory> {
        match self {
            SortReason::MultiLabel | SortReason::NoRead | SortReason::NoCode => {
                Some(DefectCategory::ScanDefect)
            }
            SortReason::FailedToDivert
            | SortReason::GapError
            | SortReason::DestinationNonOperational
            | SortReason::LostContainer
            | SortReason::NoDestinationReceived
            | SortReason::Unknown
            | SortReason::TrackingError
            | SortReason::UnableToDivert => Some(DefectCategory::MheDefect),
            _ => None,
        }
    }
}

/// Scan-quality pattern of a reconstructed package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageClass {
    Normal,
    NoRead,
    MultiRead,
}

impl PackageClass {
    pub fn label(&self) -> &'static str {
        match self {
            PackageClass::Normal => "normal",
            PackageClass::NoRead => "no_read",
            PackageClass::MultiRead => "multi_read",
        }
    }
}

/// Sort-outcome event after pruning, typing, and enrichment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortEvent {
    pub timestamp: Option<NaiveDateTime>,
    pub plc_record_no: Option<String>,
    pub item_id: Option<String>,
    pub index_no: Option<String>,
    pub location: Option<String>,
    pub barcode: Option<String>,
    pub actual_destination: Option<i64>,
    pub requested_destination: Option<i64>,
    pub sort_code: Option<i64>,
    pub sort_reason: Option<SortReason>,
    pub defect_category: Option<DefectCategory>,
    pub amazon_destination: Option<String>,
    pub beumer_destination: Option<String>,
    pub jackpot_destination: Option<String>,
    pub explanation: Option<String>,
}

/// A sort event assigned to its reconstructed package
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedEvent {
    pub event: SortEvent,
    pub package_id: String,
    pub classification: PackageClass,
}

/// Items-inducted event used for rate analysis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InductionEvent {
    pub timestamp: Option<NaiveDateTime>,
    pub item_id: Option<String>,
    pub index_no: Option<String>,
    pub induction_no: Option<String>,
    pub induction: String,
}

/// Destination-request event (first element of each list field kept)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DestinationRequestEvent {
    pub timestamp: Option<NaiveDateTime>,
    pub item_id: Option<String>,
    pub barcode: Option<String>,
    pub requested_destination: Option<String>,
    pub sort_code: Option<i64>,
}

/// Counters reported by the raw record reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub lines_total: usize,
    pub blank_lines: usize,
    pub records_read: usize,
    pub malformed_lines: usize,
}

impl ReadStats {
    pub fn merge(&mut self, other: &ReadStats) {
        self.lines_total += other.lines_total;
        self.blank_lines += other.blank_lines;
        self.records_read += other.records_read;
        self.malformed_lines += other.malformed_lines;
    }

    /// Fraction of non-blank lines that yielded a record
    pub fn success_rate(&self) -> f64 {
        let attempted = self.records_read + self.malformed_lines;
        if attempted == 0 {
            0.0
        } else {
            (self.records_read as f64 / attempted as f64) * 100.0
        }
    }
}

/// Counters reported by the list expander
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub input_rows: usize,
    pub expanded_rows: usize,
    pub sentinel_dropped: usize,
}

impl ExpansionStats {
    pub fn output_rows(&self) -> usize {
        self.expanded_rows - self.sentinel_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_reason_table() {
        assert_eq!(SortReason::from_code(0), Some(SortReason::Success));
        assert_eq!(SortReason::from_code(8).map(|r| r.label()), Some("No_Read"));
        assert_eq!(SortReason::from_code(11).map(|r| r.label()), Some("<reserved>"));
        assert_eq!(
            SortReason::from_code(22),
            Some(SortReason::DestinationNotAttempted)
        );
        assert_eq!(SortReason::from_code(23), None);
        assert_eq!(SortReason::from_code(-1), None);
        assert_eq!(SortReason::UnableToDivert.code(), 21);
    }

    #[test]
    fn test_defect_categories() {
        assert_eq!(
            SortReason::MultiLabel.defect_category(),
            Some(DefectCategory::ScanDefect)
        );
        assert_eq!(
            SortReason::TrackingError.defect_category(),
            Some(DefectCategory::MheDefect)
        );
        assert_eq!(SortReason::Success.defect_category(), None);
        assert_eq!(SortReason::DestinationFull.defect_category(), None);
    }

    #[test]
    fn test_scalar_integer_view() {
        assert_eq!(Scalar::Text("12".into()).as_i64(), Some(12));
        assert_eq!(Scalar::Text("12.0".into()).as_i64(), Some(12));
        assert_eq!(Scalar::Float(3.5).as_i64(), None);
        assert_eq!(Scalar::Text("abc".into()).as_i64(), None);
    }

    #[test]
    fn test_field_value_rendering() {
        let list = FieldValue::List(vec![Scalar::Int(1), Scalar::Text("Unused".into())]);
        assert_eq!(list.to_string(), "[1,Unused]");
        assert_eq!(list.list_len(), 2);
        assert_eq!(FieldValue::Missing.as_text(), None);
        assert_eq!(FieldValue::text("").as_text(), None);
    }

    #[test]
    fn test_raw_record_requires_twelve_fields() {
        let fields: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let record = RawRecord::from_fields(fields).unwrap();
        assert_eq!(record.message_code, "9");
        assert_eq!(record.payload, "11");

        let short: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        assert!(RawRecord::from_fields(short).is_none());
    }
}
