//! Analysis time window resolution.
//!
//! A window request is resolved against the dataset's own time bounds:
//! requests reaching outside the data are clamped, and requests that cannot
//! overlap the data resolve to an explicitly empty window rather than an
//! error.

use crate::error::{Result, SorterError};
use crate::models::{DestinationRequestEvent, InductionEvent, PackagedEvent, SortEvent};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, warn};

/// Anything carrying an optional event timestamp
pub trait Timestamped {
    fn timestamp(&self) -> Option<NaiveDateTime>;
}

impl Timestamped for SortEvent {
    fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }
}

impl Timestamped for PackagedEvent {
    fn timestamp(&self) -> Option<NaiveDateTime> {
        self.event.timestamp
    }
}

impl Timestamped for InductionEvent {
    fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }
}

impl Timestamped for DestinationRequestEvent {
    fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }
}

/// Earliest and latest timestamps of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetBounds {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DatasetBounds {
    /// Fails with `EmptyDataset` when no event has a timestamp
    pub fn from_events<T: Timestamped>(events: &[T]) -> Result<Self> {
        let mut timestamps = events.iter().filter_map(Timestamped::timestamp);
        let first = timestamps.next().ok_or_else(|| SorterError::EmptyDataset {
            reason: format!("all {} timestamps are missing or unparseable", events.len()),
        })?;

        let (start, end) = timestamps.fold((first, first), |(start, end), ts| {
            (start.min(ts), end.max(ts))
        });
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRequest {
    /// The whole dataset, no resolution
    Full,
    /// Optional start and end inputs; omitted start is the dataset start,
    /// omitted end is start plus the default window length
    Range {
        start: Option<String>,
        end: Option<String>,
    },
}

impl Default for WindowRequest {
    fn default() -> Self {
        WindowRequest::Range {
            start: None,
            end: None,
        }
    }
}

/// A request resolved against dataset bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub full: bool,
    pub empty: bool,
    pub start_clamped: bool,
    pub end_clamped: bool,
}

impl ResolvedWindow {
    pub fn duration_secs(&self) -> f64 {
        let secs = (self.end - self.start).num_milliseconds() as f64 / 1000.0;
        secs.max(0.0)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs() / 60.0
    }

    /// Inclusive on both bounds; always false for an empty window
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        !self.empty && timestamp >= self.start && timestamp <= self.end
    }

    fn empty(start: NaiveDateTime, end: NaiveDateTime, start_clamped: bool) -> Self {
        Self {
            start,
            end,
            full: false,
            empty: true,
            start_clamped,
            end_clamped: false,
        }
    }
}

/// Resolve a request; bare times anchor to the dataset start (start input)
/// or the resolved start (end input)
pub fn resolve_window(
    bounds: &DatasetBounds,
    request: &WindowRequest,
    window_minutes: i64,
) -> Result<ResolvedWindow> {
    let (start_input, end_input) = match request {
        WindowRequest::Full => {
            info!("Using the full dataset: {} -> {}", bounds.start, bounds.end);
            return Ok(ResolvedWindow {
                start: bounds.start,
                end: bounds.end,
                full: true,
                empty: false,
                start_clamped: false,
                end_clamped: false,
            });
        }
        WindowRequest::Range { start, end } => (start.as_deref(), end.as_deref()),
    };

    let mut start = match start_input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(input) => parse_time_input(input, bounds.start)?,
        None => bounds.start,
    };

    let mut start_clamped = false;
    if start < bounds.start {
        warn!(
            "Requested start {} is before data begins ({}), adjusting",
            start, bounds.start
        );
        start = bounds.start;
        start_clamped = true;
    }

    if start > bounds.end {
        warn!(
            "Requested start {} is after data ends ({}), no data in window",
            start, bounds.end
        );
        return Ok(ResolvedWindow::empty(start, start, start_clamped));
    }

    let mut end = match end_input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(input) => parse_time_input(input, start)?,
        None => start + Duration::minutes(window_minutes),
    };

    let mut end_clamped = false;
    if end > bounds.end {
        let requested = end;
        end = bounds.end;
        end_clamped = true;
        warn!(
            "Requested end {} exceeds data boundary ({}), actual window {:.1} minutes (requested {:.1})",
            requested,
            bounds.end,
            (end - start).num_milliseconds() as f64 / 60_000.0,
            (requested - start).num_milliseconds() as f64 / 60_000.0
        );
    }

    if end < start {
        warn!("End time {} is before start time {}, no valid window", end, start);
        return Ok(ResolvedWindow::empty(start, end, start_clamped));
    }

    Ok(ResolvedWindow {
        start,
        end,
        full: false,
        empty: false,
        start_clamped,
        end_clamped,
    })
}

/// Events inside the window; the full window keeps untimed events too
pub fn select_window<T: Timestamped + Clone>(events: &[T], window: &ResolvedWindow) -> Vec<T> {
    if window.full {
        return events.to_vec();
    }
    events
        .iter()
        .filter(|event| event.timestamp().is_some_and(|ts| window.contains(ts)))
        .cloned()
        .collect()
}

/// Parse `HH`, `HH:MM[:SS[.f]]`, `YYYY-MM-DD[ |T]HH:MM[:SS[.f]]` or `YYYY-MM-DD`
///
/// Time-only inputs take the date of `anchor`.
pub fn parse_time_input(input: &str, anchor: NaiveDateTime) -> Result<NaiveDateTime> {
    let input = input.trim();

    for format in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(input, format) {
            return Ok(anchor.date().and_time(time));
        }
    }

    if let Ok(hour) = input.parse::<u32>() {
        return NaiveTime::from_hms_opt(hour, 0, 0)
            .map(|time| anchor.date().and_time(time))
            .ok_or_else(|| SorterError::InvalidTimeInput {
                input: input.to_string(),
                reason: format!("hour {} is out of range", hour),
            });
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(datetime);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(SorterError::InvalidTimeInput {
        input: input.to_string(),
        reason: "expected HH, HH:MM[:SS], or YYYY-MM-DD HH:MM[:SS]".to_string(),
    })
}
