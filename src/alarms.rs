//! HMI alarm export summaries.
//!
//! Three export shapes are understood:
//! - the `HistoryAlarms` duration history (`;` separated, one filter line
//!   before the header) summarized per chute, DBS, IAS or emergency stop
//! - jam occurrence exports (`Part`, `Message`, `Occurrences`)
//! - alarm category exports (`Text`, `Amount`)

use crate::constants::{CHUTE_JAM_MESSAGE, EMERGENCY_STOP_GROUP};
use crate::error::{Result, SorterError};
use crate::mapping::{DestinationMap, detect_delimiter};
use crate::models::parse_integral;
use crate::reader::sanitize_bytes;
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Device family summarized from a duration history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Chute,
    Dbs,
    Ias,
    Estop,
}

impl DeviceKind {
    fn pattern(&self) -> &'static Regex {
        static CHUTE: OnceLock<Regex> = OnceLock::new();
        static DBS: OnceLock<Regex> = OnceLock::new();
        static IAS: OnceLock<Regex> = OnceLock::new();
        static ESTOP: OnceLock<Regex> = OnceLock::new();

        let (cell, pattern) = match self {
            DeviceKind::Chute => (&CHUTE, r"CHU\d+"),
            DeviceKind::Dbs => (&DBS, r"DBS\d+"),
            DeviceKind::Ias => (&IAS, r"IAS\d+"),
            DeviceKind::Estop => (&ESTOP, r"ES\d+"),
        };
        cell.get_or_init(|| Regex::new(pattern).expect("valid device regex"))
    }

    /// Column heading for the device id
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Chute => "Beumer",
            DeviceKind::Dbs => "DBS",
            DeviceKind::Ias => "IAS",
            DeviceKind::Estop => "Emergency Stop",
        }
    }

    /// Column heading for the alarm count
    pub fn count_label(&self) -> &'static str {
        match self {
            DeviceKind::Chute => "Jam Count",
            _ => "Alarm Count",
        }
    }

    /// Table name used for exports
    pub fn table_name(&self) -> &'static str {
        match self {
            DeviceKind::Chute => "chute_jams",
            DeviceKind::Dbs => "dbs_alarms",
            DeviceKind::Ias => "ias_alarms",
            DeviceKind::Estop => "estop_alarms",
        }
    }

    /// Device id found anywhere in a part name
    pub fn extract(&self, part_name: &str) -> Option<String> {
        self.pattern()
            .find(part_name)
            .map(|found| found.as_str().to_string())
    }
}

/// Duration statistics for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAlarmSummary {
    pub device: String,
    /// Amazon chute name, chutes only
    pub amazon: Option<String>,
    pub count: usize,
    pub total: Duration,
    pub average: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationReport {
    pub kind: DeviceKind,
    /// Sorted by total duration, longest first
    pub rows: Vec<DeviceAlarmSummary>,
    /// Rows without a device id or with an unreadable duration
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JamCount {
    pub chute: String,
    pub total_jams: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub text: String,
    pub total_amount: i64,
}

fn duration_re() -> &'static Regex {
    static DURATION_RE: OnceLock<Regex> = OnceLock::new();
    DURATION_RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+)\s*days?\s*)?(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)$")
            .expect("valid duration regex")
    })
}

/// Parse `HH:MM:SS`, `D days HH:MM:SS` and `="HH:MM:SS"` durations
pub fn parse_alarm_duration(raw: &str) -> Option<Duration> {
    let cleaned = raw.replace("=\"", "").replace('"', "");
    let captures = duration_re().captures(cleaned.trim())?;

    let days: i64 = captures
        .get(1)
        .map_or(Ok(0), |m| m.as_str().parse())
        .ok()?;
    let hours: i64 = captures[2].parse().ok()?;
    let minutes: i64 = captures[3].parse().ok()?;
    let seconds: f64 = captures[4].parse().ok()?;

    Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_milliseconds((seconds * 1000.0).round() as i64)?)
}

/// Whole seconds as `HH:MM:SS`; hours may exceed 24
pub fn format_hhmmss(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// `=CBS01.CHU334+S1-U1` becomes `CHU334`
pub fn clean_part(part: &str) -> String {
    let mut part = part;
    if let Some((_, rest)) = part.split_once(':') {
        part = rest;
    }
    if let Some((_, rest)) = part.split_once('.') {
        part = rest;
    }
    if let Some((head, _)) = part.split_once('+') {
        part = head;
    }
    part.trim().to_string()
}

fn read_export(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SorterError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(sanitize_bytes(&std::fs::read(path)?))
}

fn column(headers: &csv::StringRecord, name: &str, source: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| SorterError::AlarmExport {
            path: source.to_path_buf(),
            reason: format!("missing '{}' column", name),
        })
}

fn reader_for(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

pub fn summarize_duration_history(
    path: &Path,
    kind: DeviceKind,
    mapping: Option<&DestinationMap>,
) -> Result<DurationReport> {
    let text = read_export(path)?;
    parse_duration_history(&text, path, kind, mapping)
}

/// Summarize a `HistoryAlarms` export already in memory
pub fn parse_duration_history(
    text: &str,
    source: &Path,
    kind: DeviceKind,
    mapping: Option<&DestinationMap>,
) -> Result<DurationReport> {
    // first line holds the export filter, the header follows
    let body = text.split_once('\n').map_or("", |(_, rest)| rest);
    let mut reader = reader_for(body, b';');

    let headers = reader.headers()?.clone();
    let part_col = column(&headers, "Part name", source)?;
    let duration_col = column(&headers, "Duration", source)?;
    let group_col = match kind {
        DeviceKind::Estop => Some(column(&headers, "Group", source)?),
        _ => None,
    };

    let mut per_device: HashMap<String, Vec<Duration>> = HashMap::new();
    let mut dropped_rows = 0usize;

    for row in reader.records() {
        let row = row?;
        if let Some(col) = group_col {
            if row.get(col).map(str::trim) != Some(EMERGENCY_STOP_GROUP) {
                continue;
            }
        }

        let device = row.get(part_col).and_then(|part| kind.extract(part));
        let duration = row.get(duration_col).and_then(parse_alarm_duration);
        match (device, duration) {
            (Some(device), Some(duration)) => per_device.entry(device).or_default().push(duration),
            _ => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        warn!(
            "{}: dropped {} alarm rows without a {} id or readable duration",
            source.display(),
            dropped_rows,
            kind.label()
        );
    }

    let mut rows: Vec<DeviceAlarmSummary> = per_device
        .into_iter()
        .map(|(device, durations)| {
            let total = durations
                .iter()
                .fold(Duration::zero(), |acc, d| acc.checked_add(d).unwrap_or(Duration::MAX));
            let max = durations.iter().copied().max().unwrap_or_else(Duration::zero);
            let average = total / durations.len().max(1) as i32;
            let amazon = match kind {
                DeviceKind::Chute => mapping
                    .and_then(|map| map.amazon_for_beumer(&device))
                    .map(String::from),
                _ => None,
            };
            DeviceAlarmSummary {
                device,
                amazon,
                count: durations.len(),
                total,
                average,
                max,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.device.cmp(&b.device)));

    debug!("Summarized {} {} devices", rows.len(), kind.label());
    Ok(DurationReport {
        kind,
        rows,
        dropped_rows,
    })
}

pub fn summarize_jam_occurrences(
    path: &Path,
    mapping: Option<&DestinationMap>,
) -> Result<Vec<JamCount>> {
    let text = read_export(path)?;
    parse_jam_occurrences(&text, path, mapping)
}

/// Chute jam totals per Amazon chute, falling back to the Beumer code
pub fn parse_jam_occurrences(
    text: &str,
    source: &Path,
    mapping: Option<&DestinationMap>,
) -> Result<Vec<JamCount>> {
    let mut reader = reader_for(text, detect_delimiter(text));
    let headers = reader.headers()?.clone();
    let part_col = column(&headers, "Part", source)?;
    let message_col = column(&headers, "Message", source)?;
    let occurrences_col = column(&headers, "Occurrences", source)?;

    let mut totals: HashMap<String, i64> = HashMap::new();
    for row in reader.records() {
        let row = row?;
        if row.get(message_col).map(str::trim) != Some(CHUTE_JAM_MESSAGE) {
            continue;
        }
        let Some(occurrences) = row.get(occurrences_col).and_then(parse_integral) else {
            continue;
        };
        let beumer = clean_part(row.get(part_col).unwrap_or_default());
        let chute = mapping
            .and_then(|map| map.amazon_for_beumer(&beumer))
            .map(String::from)
            .unwrap_or(beumer);
        *totals.entry(chute).or_default() += occurrences;
    }

    let mut jams: Vec<JamCount> = totals
        .into_iter()
        .map(|(chute, total_jams)| JamCount { chute, total_jams })
        .collect();
    jams.sort_by(|a, b| b.total_jams.cmp(&a.total_jams).then_with(|| a.chute.cmp(&b.chute)));
    Ok(jams)
}

pub fn summarize_alarm_categories(path: &Path) -> Result<Vec<CategoryCount>> {
    let text = read_export(path)?;
    parse_alarm_categories(&text, path)
}

/// Alarm amounts summed per category text
pub fn parse_alarm_categories(text: &str, source: &Path) -> Result<Vec<CategoryCount>> {
    let mut reader = reader_for(text, detect_delimiter(text));
    let headers = reader.headers()?.clone();
    let text_col = column(&headers, "Text", source)?;
    let amount_col = column(&headers, "Amount", source)?;

    let mut totals: HashMap<String, i64> = HashMap::new();
    for row in reader.records() {
        let row = row?;
        let Some(amount) = row.get(amount_col).and_then(parse_integral) else {
            continue;
        };
        let category = row.get(text_col).unwrap_or_default().trim().to_string();
        *totals.entry(category).or_default() += amount;
    }

    let mut categories: Vec<CategoryCount> = totals
        .into_iter()
        .map(|(text, total_amount)| CategoryCount { text, total_amount })
        .collect();
    categories.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.text.cmp(&b.text))
    });
    Ok(categories)
}
