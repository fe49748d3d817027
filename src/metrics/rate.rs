//! Throughput rate and target attainment for inducted items.

use crate::config::RateConfig;
use crate::constants::ALL_INDUCTIONS_LABEL;
use crate::models::InductionEvent;
use crate::window::ResolvedWindow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// One row of the rate table; the total row leaves per-induction fields empty
#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub line_name: String,
    pub measuring_point: Option<String>,
    pub time_label: Option<String>,
    pub n_items: usize,
    pub window_minutes: Option<f64>,
    pub items_per_sec: Option<f64>,
    pub items_per_min: Option<f64>,
    pub pph: f64,
    pub target_pph: f64,
    pub attainment_pct: f64,
    pub needed_items_for_pass: Option<i64>,
    pub items_short: Option<i64>,
    pub sec_per_bag_current: Option<f64>,
    pub sec_per_bag_target: Option<f64>,
    pub recommendation: Option<String>,
    pub summary_line: Option<String>,
    pub passed: Option<bool>,
}

/// Rate analysis over one window
#[derive(Debug, Clone, PartialEq)]
pub struct RateAnalysis {
    pub target_pph: f64,
    /// Distinct induction names present, sorted
    pub inductions: Vec<String>,
    /// Per-induction rows followed by the total row
    pub rows: Vec<RateRow>,
}

impl RateAnalysis {
    pub fn total(&self) -> Option<&RateRow> {
        self.rows.last().filter(|row| row.line_name == ALL_INDUCTIONS_LABEL)
    }
}

/// Target for the set of inductions present
///
/// Unrecognized names are ignored; SPS names only count while an SPS
/// target is configured. `None` when nothing recognized remains.
pub fn choose_target_pph<'a, I>(inductions: I, rate: &RateConfig) -> Option<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let sps_target = rate.sps_target();
    let recognized: BTreeSet<&str> = inductions
        .into_iter()
        .filter(|name| {
            rate.semi_auto_inductions.iter().any(|n| n == name)
                || rate.auto_inductions.iter().any(|n| n == name)
                || (sps_target.is_some() && rate.sps_inductions.iter().any(|n| n == name))
        })
        .collect();

    if recognized.is_empty() {
        return None;
    }

    let all_in = |group: &[String]| recognized.iter().all(|name| group.iter().any(|n| n == name));

    if all_in(rate.semi_auto_inductions.as_slice()) {
        return Some(if recognized.len() == 1 {
            rate.single_semi_auto_pph
        } else {
            rate.all_semi_auto_pph
        });
    }
    if all_in(rate.auto_inductions.as_slice()) {
        return Some(if recognized.len() == 1 {
            rate.single_auto_pph
        } else {
            rate.all_auto_pph
        });
    }
    if all_in(rate.sps_inductions.as_slice()) {
        return sps_target;
    }
    Some((rate.all_semi_auto_pph + rate.all_auto_pph) / 2.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// `HHMM-HHMMAM` label for a window
pub fn time_label(window: &ResolvedWindow) -> String {
    format!(
        "{}-{}{}",
        window.start.format("%H%M"),
        window.end.format("%H%M"),
        window.end.format("%p")
    )
}

/// Rate row for one induction over the window
pub fn analyze_induction(
    n_items: usize,
    line_name: &str,
    measuring_point: &str,
    window: &ResolvedWindow,
    target_pph: f64,
) -> RateRow {
    let window_secs = window.duration_secs();
    let window_minutes = window_secs / 60.0;
    let items = n_items as f64;

    let pph = ratio(items * 3600.0, window_secs);
    let items_per_sec = ratio(items, window_secs);
    let sec_per_bag = if window_secs > 0.0 { ratio(window_secs, items) } else { 0.0 };
    let sec_per_bag_target = ratio(3600.0, target_pph);

    let needed = (target_pph * window_secs / 3600.0).ceil() as i64;
    let short = (needed - n_items as i64).max(0);
    let passed = pph >= target_pph;

    let recommendation = if n_items == 0 {
        "No items inducted in this window.".to_string()
    } else if window_secs > 0.0 && short > 0 {
        format!(
            "Need +{} items in this {:.1} min window or reduce sec/bag to <= {:.2} (current {:.2}).",
            short, window_minutes, sec_per_bag_target, sec_per_bag
        )
    } else {
        "On target or above. Maintain current rate.".to_string()
    };

    let label = time_label(window);
    let summary_line = format!(
        "{};Measuring Point: {}: Time {}; Total Inducted = {}",
        line_name, measuring_point, label, n_items
    );

    RateRow {
        line_name: line_name.to_string(),
        measuring_point: Some(measuring_point.to_string()),
        time_label: Some(label),
        n_items,
        window_minutes: Some(window_minutes),
        items_per_sec: Some(items_per_sec),
        items_per_min: Some(items_per_sec * 60.0),
        pph,
        target_pph,
        attainment_pct: ratio(pph, target_pph) * 100.0,
        needed_items_for_pass: Some(needed),
        items_short: Some(short),
        sec_per_bag_current: Some(sec_per_bag),
        sec_per_bag_target: Some(sec_per_bag_target),
        recommendation: Some(recommendation),
        summary_line: Some(summary_line),
        passed: Some(passed),
    }
}

/// Zeroed total for a window without inductions, against the target of
/// every configured induction
fn empty_window_analysis(window: &ResolvedWindow, rate: &RateConfig) -> RateAnalysis {
    let configured = rate
        .semi_auto_inductions
        .iter()
        .chain(&rate.auto_inductions)
        .chain(&rate.sps_inductions)
        .map(String::as_str);
    let target_pph = choose_target_pph(configured, rate).unwrap_or(0.0);
    info!(
        "No items inducted between {} and {}, reporting zero rates",
        window.start, window.end
    );

    RateAnalysis {
        target_pph,
        inductions: Vec::new(),
        rows: vec![RateRow {
            line_name: ALL_INDUCTIONS_LABEL.to_string(),
            measuring_point: None,
            time_label: Some(time_label(window)),
            n_items: 0,
            window_minutes: Some(window.duration_minutes()),
            items_per_sec: Some(0.0),
            items_per_min: Some(0.0),
            pph: 0.0,
            target_pph,
            attainment_pct: 0.0,
            needed_items_for_pass: None,
            items_short: None,
            sec_per_bag_current: Some(0.0),
            sec_per_bag_target: Some(ratio(3600.0, target_pph)),
            recommendation: Some("No items inducted in this window.".to_string()),
            summary_line: None,
            passed: Some(false),
        }],
    }
}

/// Per-induction rates plus an `All Inductions` total
///
/// A window without inductions yields a single zeroed total row. Returns
/// `None` (with a warning) when inductions are present but no target applies.
pub fn analyze_rate(
    events: &[InductionEvent],
    window: &ResolvedWindow,
    rate: &RateConfig,
) -> Option<RateAnalysis> {
    let excluded_sps = rate.sps_target().is_none();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        let name = event.induction.as_str();
        if excluded_sps && rate.sps_inductions.iter().any(|n| n == name) {
            continue;
        }
        *counts.entry(name).or_default() += 1;
    }

    let inductions: Vec<String> = counts.keys().map(|name| name.to_string()).collect();

    if events.is_empty() {
        return Some(empty_window_analysis(window, rate));
    }

    let Some(target_pph) = choose_target_pph(counts.keys().copied(), rate) else {
        warn!(
            "No target PPH for inductions [{}], skipping rate analysis",
            inductions.join(", ")
        );
        return None;
    };
    info!("Target PPH for this analysis: {:.1}", target_pph);

    let mut rows: Vec<RateRow> = counts
        .iter()
        .map(|(name, count)| {
            analyze_induction(*count, name, rate.measuring_point(name), window, target_pph)
        })
        .collect();

    if !rows.is_empty() {
        let total_items = rows.iter().map(|row| row.n_items).sum();
        let total_pph: f64 = rows.iter().map(|row| row.pph).sum();
        let combined_target = target_pph * rows.len() as f64;

        rows.push(RateRow {
            line_name: ALL_INDUCTIONS_LABEL.to_string(),
            measuring_point: None,
            time_label: None,
            n_items: total_items,
            window_minutes: None,
            items_per_sec: None,
            items_per_min: None,
            pph: total_pph,
            target_pph: combined_target,
            attainment_pct: ratio(total_pph, combined_target) * 100.0,
            needed_items_for_pass: None,
            items_short: None,
            sec_per_bag_current: None,
            sec_per_bag_target: None,
            recommendation: None,
            summary_line: None,
            passed: None,
        });
    }

    Some(RateAnalysis {
        target_pph,
        inductions,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn window(start: &str, end: &str) -> ResolvedWindow {
        ResolvedWindow {
            start: at(start),
            end: at(end),
            full: false,
            empty: false,
            start_clamped: false,
            end_clamped: false,
        }
    }

    fn inducted(name: &str, count: usize) -> Vec<InductionEvent> {
        (0..count)
            .map(|_| InductionEvent {
                induction: name.to_string(),
                ..InductionEvent::default()
            })
            .collect()
    }

    #[test]
    fn test_target_selection() {
        let rate = RateConfig::default();
        assert_eq!(choose_target_pph(["IU001"], &rate), Some(2640.0));
        assert_eq!(
            choose_target_pph(["IU001", "IU002"], &rate),
            Some(9119.0 / 4.0)
        );
        assert_eq!(choose_target_pph(["IU006"], &rate), Some(2820.0));
        assert_eq!(
            choose_target_pph(["IU005", "IU007", "No Map Yet"], &rate),
            Some(7351.0 / 3.0)
        );
        assert_eq!(choose_target_pph(["SPS001"], &rate), Some(100.0));
        assert_eq!(
            choose_target_pph(["IU001", "IU005"], &rate),
            Some((9119.0 / 4.0 + 7351.0 / 3.0) / 2.0)
        );
        assert_eq!(choose_target_pph(["No Map Yet"], &rate), None);
        assert_eq!(choose_target_pph(Vec::<&str>::new(), &rate), None);
    }

    #[test]
    fn test_sps_can_be_excluded() {
        let mut rate = RateConfig::default();
        rate.sps_target_pph = None;
        assert_eq!(choose_target_pph(["SPS001"], &rate), None);
        assert_eq!(choose_target_pph(["SPS001", "IU001"], &rate), Some(2640.0));

        let mut events = inducted("SPS001", 10);
        events.extend(inducted("IU001", 10));
        let analysis =
            analyze_rate(&events, &window("2025-09-24 10:00:00", "2025-09-24 10:30:00"), &rate)
                .unwrap();
        assert_eq!(analysis.inductions, vec!["IU001".to_string()]);
    }

    #[test]
    fn test_single_induction_attainment() {
        let rate = RateConfig::default();
        let events = inducted("IU001", 1800);
        let window = window("2025-09-24 10:00:00", "2025-09-24 10:30:00");
        let analysis = analyze_rate(&events, &window, &rate).unwrap();

        let row = &analysis.rows[0];
        assert_eq!(row.pph, 3600.0);
        assert!((row.attainment_pct - 3600.0 / 2640.0 * 100.0).abs() < 1e-9);
        assert_eq!(row.passed, Some(true));
        assert_eq!(row.items_short, Some(0));
        assert_eq!(row.needed_items_for_pass, Some(1320));
        assert_eq!(row.time_label.as_deref(), Some("1000-1030AM"));
        assert_eq!(
            row.summary_line.as_deref(),
            Some("IU001;Measuring Point: MP1000605: Time 1000-1030AM; Total Inducted = 1800")
        );

        let total = analysis.total().unwrap();
        assert_eq!(total.n_items, 1800);
        assert_eq!(total.target_pph, 2640.0);
    }

    #[test]
    fn test_shortfall_and_recommendation() {
        let row = analyze_induction(
            100,
            "IU002",
            "MP1",
            &window("2025-09-24 14:00:00", "2025-09-24 14:30:00"),
            2640.0,
        );
        assert_eq!(row.needed_items_for_pass, Some(1320));
        assert_eq!(row.items_short, Some(1220));
        assert_eq!(row.passed, Some(false));
        assert!(row.recommendation.unwrap().starts_with("Need +1220 items"));
        assert_eq!(row.time_label.as_deref(), Some("1400-1430PM"));
    }

    #[test]
    fn test_zero_window_is_guarded() {
        let row = analyze_induction(
            5,
            "IU001",
            "MP1",
            &window("2025-09-24 10:00:00", "2025-09-24 10:00:00"),
            2640.0,
        );
        assert_eq!(row.pph, 0.0);
        assert_eq!(row.sec_per_bag_current, Some(0.0));
        assert_eq!(row.needed_items_for_pass, Some(0));

        let empty = analyze_induction(
            0,
            "IU001",
            "MP1",
            &window("2025-09-24 10:00:00", "2025-09-24 10:30:00"),
            2640.0,
        );
        assert_eq!(empty.pph, 0.0);
        assert_eq!(empty.sec_per_bag_current, Some(0.0));
        assert_eq!(empty.attainment_pct, 0.0);
    }

    #[test]
    fn test_empty_window_reports_zero_rates() {
        let rate = RateConfig::default();
        let mut empty = window("2025-09-24 11:00:00", "2025-09-24 10:30:00");
        empty.empty = true;

        let analysis = analyze_rate(&[], &empty, &rate).unwrap();
        assert!(analysis.inductions.is_empty());
        assert_eq!(analysis.rows.len(), 1);
        assert_eq!(analysis.target_pph, (9119.0 / 4.0 + 7351.0 / 3.0) / 2.0);

        let total = analysis.total().unwrap();
        assert_eq!(total.n_items, 0);
        assert_eq!(total.pph, 0.0);
        assert_eq!(total.attainment_pct, 0.0);
        assert_eq!(total.window_minutes, Some(0.0));
        assert_eq!(
            total.recommendation.as_deref(),
            Some("No items inducted in this window.")
        );
    }

    #[test]
    fn test_unrecognized_inductions_skip_rate() {
        let rate = RateConfig::default();
        let events = inducted("No Map Yet", 5);
        let window = window("2025-09-24 10:00:00", "2025-09-24 10:30:00");
        assert!(analyze_rate(&events, &window, &rate).is_none());
    }

    #[test]
    fn test_total_row_sums_inductions() {
        let rate = RateConfig::default();
        let mut events = inducted("IU001", 600);
        events.extend(inducted("IU002", 300));
        let analysis =
            analyze_rate(&events, &window("2025-09-24 10:00:00", "2025-09-24 10:30:00"), &rate)
                .unwrap();

        assert_eq!(analysis.rows.len(), 3);
        let total = analysis.total().unwrap();
        assert_eq!(total.n_items, 900);
        assert_eq!(total.pph, 1800.0);
        assert_eq!(total.target_pph, 9119.0 / 4.0 * 2.0);
        assert!(total.passed.is_none());
    }
}
