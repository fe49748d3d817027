//! Message payload decoding.
//!
//! Payloads look like `->{key:value,key:[v1,v2],...}<`. Commas inside
//! brackets belong to list values, so splitting tracks bracket depth.
//! Decoding is total: malformed pairs and unparseable lists degrade to
//! partial results instead of errors.

use crate::constants::{PAYLOAD_PREFIX, PAYLOAD_SUFFIX};
use crate::models::{DecodedEvent, FieldValue, RawRecord, Scalar};
use chrono::{NaiveDate, NaiveDateTime};

/// Decode a raw record's timestamp and payload
pub fn decode_record(record: RawRecord) -> DecodedEvent {
    let timestamp = parse_log_timestamp(&record.timestamp);
    let fields = decode_payload(&record.payload);
    DecodedEvent {
        record,
        timestamp,
        fields,
    }
}

/// Expand a payload into ordered `(key, value)` pairs
///
/// Segments without a colon or with an empty key are dropped. A repeated
/// key keeps its first position and takes the later value.
pub fn decode_payload(payload: &str) -> Vec<(String, FieldValue)> {
    let mut fields: Vec<(String, FieldValue)> = Vec::new();

    for segment in split_top_level(strip_markers(payload)) {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = parse_value(value.trim());
        match fields.iter_mut().find(|(name, _)| name == key) {
            Some(existing) => existing.1 = value,
            None => fields.push((key.to_string(), value)),
        }
    }

    fields
}

/// Remove the `->{` / `}<` wrapper when present
pub fn strip_markers(payload: &str) -> &str {
    let payload = payload.strip_prefix(PAYLOAD_PREFIX).unwrap_or(payload);
    payload.strip_suffix(PAYLOAD_SUFFIX).unwrap_or(payload)
}

/// Split on commas outside `[...]` nesting
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buffer = String::new();
    let mut depth = 0i32;

    for ch in text.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth -= 1,
            _ => {}
        }

        if ch == ',' && depth == 0 {
            parts.push(buffer.trim().to_string());
            buffer.clear();
        } else {
            buffer.push(ch);
        }
    }

    if !buffer.is_empty() {
        parts.push(buffer.trim().to_string());
    }

    parts
}

/// Type a payload value: bracketed values become lists, everything else text
pub fn parse_value(value: &str) -> FieldValue {
    if value.starts_with('[') && value.ends_with(']') && value.len() >= 2 {
        match parse_list(&value[1..value.len() - 1]) {
            Some(items) => FieldValue::List(items),
            None => FieldValue::List(vec![Scalar::Text(value.to_string())]),
        }
    } else {
        FieldValue::text(value)
    }
}

/// Parse a list interior as scalar literals; `None` if any element is not one
pub fn parse_list(inner: &str) -> Option<Vec<Scalar>> {
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut elements: Vec<&str> = inner.split(',').map(str::trim).collect();
    if elements.len() > 1 && elements.last().is_some_and(|last| last.is_empty()) {
        elements.pop();
    }

    elements.into_iter().map(parse_literal).collect()
}

/// Integer, float, or quoted string literal
pub fn parse_literal(element: &str) -> Option<Scalar> {
    if element.is_empty() {
        return None;
    }

    for quote in ['\'', '"'] {
        if element.len() >= 2 && element.starts_with(quote) && element.ends_with(quote) {
            return Some(Scalar::Text(element[1..element.len() - 1].to_string()));
        }
    }

    if let Ok(value) = element.parse::<i64>() {
        return Some(Scalar::Int(value));
    }

    let numeric = element
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'));
    if numeric {
        if let Ok(value) = element.parse::<f64>() {
            return Some(Scalar::Float(value));
        }
    }

    None
}

/// Parse `yyMMddHHmmss` plus up to six fractional-second digits
pub fn parse_log_timestamp(text: &str) -> Option<NaiveDateTime> {
    let digits: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
    if digits.len() < 12 || digits.len() > 18 || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }

    let number = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();
    let year = 2000 + number(0..2)? as i32;
    let month = number(2..4)?;
    let day = number(4..6)?;
    let hour = number(6..8)?;
    let minute = number(8..10)?;
    let second = number(10..12)?;

    let fraction = &digits[12..];
    let micros = if fraction.is_empty() {
        0
    } else {
        format!("{:0<6}", fraction).parse::<u32>().ok()?
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_micro_opt(hour, minute, second, micros)
}
