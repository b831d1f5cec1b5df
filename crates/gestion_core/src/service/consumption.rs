//! Consumption engine over cumulative meter readings.
//!
//! # Responsibility
//! - Derive per-interval consumption from consecutive index readings.
//! - Aggregate consumption into month/year periods and category roll-ups.
//! - Build period-over-period comparison rows and render them as text.
//!
//! # Invariants
//! - Functions here are pure: no storage access, no logging.
//! - A negative index delta is a meter reset; the interval then counts from
//!   zero and is flagged `reset`. Consumption is never negative.
//! - Roll-up keys carry the unit, so different units never sum together.

use crate::export::{render_bar_chart, Alignment, BarChartOptions, TextTable};
use crate::model::meter::Reading;
use crate::model::RecordId;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Consumption between two consecutive readings of one meter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionInterval {
    pub meter_id: RecordId,
    /// Date of the earlier reading (exclusive).
    pub start: NaiveDate,
    /// Date of the later reading (inclusive).
    pub end: NaiveDate,
    pub days: i64,
    pub consumption: f64,
    /// Index went down: the meter was replaced or rolled over.
    pub reset: bool,
}

impl ConsumptionInterval {
    pub fn daily_average(&self) -> f64 {
        if self.days <= 0 {
            return 0.0;
        }
        self.consumption / self.days as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumptionError {
    /// Two readings of one meter share a date.
    DuplicateDate { meter_id: RecordId, date: NaiveDate },
    /// Readings of several meters were mixed in one series.
    MixedMeters { expected: RecordId, found: RecordId },
    /// Roll-up depth must be at least 1.
    InvalidDepth(usize),
}

impl Display for ConsumptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateDate { meter_id, date } => {
                write!(f, "meter {meter_id} has several readings on {date}")
            }
            Self::MixedMeters { expected, found } => write!(
                f,
                "reading series mixes meters {expected} and {found}"
            ),
            Self::InvalidDepth(depth) => {
                write!(f, "category depth must be at least 1, got {depth}")
            }
        }
    }
}

impl Error for ConsumptionError {}

/// Turns readings of a single meter into consecutive consumption intervals.
///
/// Input order does not matter. Fewer than two readings yield no interval.
pub fn derive_consumption(
    readings: &[Reading],
) -> Result<Vec<ConsumptionInterval>, ConsumptionError> {
    let Some(first) = readings.first() else {
        return Ok(Vec::new());
    };
    let meter_id = first.meter_id;
    if let Some(other) = readings.iter().find(|r| r.meter_id != meter_id) {
        return Err(ConsumptionError::MixedMeters {
            expected: meter_id,
            found: other.meter_id,
        });
    }

    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by_key(|reading| reading.date);

    let mut intervals = Vec::with_capacity(sorted.len().saturating_sub(1));
    for pair in sorted.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if previous.date == current.date {
            return Err(ConsumptionError::DuplicateDate {
                meter_id,
                date: current.date,
            });
        }
        let delta = current.index_value - previous.index_value;
        let reset = delta < 0.0;
        intervals.push(ConsumptionInterval {
            meter_id,
            start: previous.date,
            end: current.date,
            days: (current.date - previous.date).num_days(),
            consumption: if reset { current.index_value } else { delta },
            reset,
        });
    }
    Ok(intervals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Month,
    Year,
}

/// How an interval spanning several periods is split between them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Attribution {
    /// Whole interval goes to the period containing its end date.
    #[default]
    EndDate,
    /// Interval is spread over the days it covers.
    Prorata,
}

/// Calendar month or year bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    /// `None` for a whole-year period.
    pub month: Option<u32>,
}

impl Period {
    pub fn year(year: i32) -> Self {
        Self { year, month: None }
    }

    pub fn month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
        }
    }

    pub fn containing(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Month => Self::month(date.year(), date.month()),
            Granularity::Year => Self::year(date.year()),
        }
    }

    /// Same period one year earlier.
    pub fn previous_year(self) -> Self {
        Self {
            year: self.year - 1,
            month: self.month,
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        let next_start = match self.month {
            Some(12) | None => NaiveDate::from_ymd_opt(self.year + 1, 1, 1),
            Some(month) => NaiveDate::from_ymd_opt(self.year, month + 1, 1),
        }?;
        next_start.pred_opt()
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.month {
            Some(month) => write!(f, "{:04}-{month:02}", self.year),
            None => write!(f, "{:04}", self.year),
        }
    }
}

pub type PeriodTotals = BTreeMap<Period, f64>;

/// Sums interval consumption per period.
pub fn aggregate_by_period(
    intervals: &[ConsumptionInterval],
    granularity: Granularity,
    attribution: Attribution,
) -> PeriodTotals {
    let mut totals = PeriodTotals::new();
    for interval in intervals {
        match attribution {
            Attribution::EndDate => {
                *totals
                    .entry(Period::containing(interval.end, granularity))
                    .or_insert(0.0) += interval.consumption;
            }
            Attribution::Prorata => spread_interval(interval, granularity, &mut totals),
        }
    }
    totals
}

/// Splits one interval over the periods covering days `start + 1 ..= end`.
fn spread_interval(
    interval: &ConsumptionInterval,
    granularity: Granularity,
    totals: &mut PeriodTotals,
) {
    if interval.days <= 0 {
        *totals
            .entry(Period::containing(interval.end, granularity))
            .or_insert(0.0) += interval.consumption;
        return;
    }
    let per_day = interval.consumption / interval.days as f64;
    let mut cursor = interval.start;
    while cursor < interval.end {
        let Some(first_day) = cursor.succ_opt() else {
            break;
        };
        let period = Period::containing(first_day, granularity);
        let segment_end = period
            .last_day()
            .map_or(interval.end, |last| last.min(interval.end));
        let days = (segment_end - cursor).num_days().max(1);
        *totals.entry(period).or_insert(0.0) += per_day * days as f64;
        cursor = cursor + Duration::days(days);
    }
}

/// Period totals of one meter, labelled for roll-ups and reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSeries {
    pub meter_id: RecordId,
    pub meter_name: String,
    pub unit: String,
    /// Category names from the root down to the meter's category.
    pub category_path: Vec<String>,
    pub totals: PeriodTotals,
}

/// Group key of a category roll-up.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RollupKey {
    pub path: Vec<String>,
    pub unit: String,
}

impl Display for RollupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.join(" / "))
    }
}

/// Sums meter series per category path truncated to `depth` levels.
pub fn rollup_by_category(
    series: &[MeterSeries],
    depth: usize,
) -> Result<BTreeMap<RollupKey, PeriodTotals>, ConsumptionError> {
    if depth == 0 {
        return Err(ConsumptionError::InvalidDepth(depth));
    }
    let mut rollup: BTreeMap<RollupKey, PeriodTotals> = BTreeMap::new();
    for meter in series {
        let key = RollupKey {
            path: meter.category_path.iter().take(depth).cloned().collect(),
            unit: meter.unit.clone(),
        };
        let bucket = rollup.entry(key).or_default();
        for (period, value) in &meter.totals {
            *bucket.entry(*period).or_insert(0.0) += value;
        }
    }
    Ok(rollup)
}

/// One row of a two-period comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub label: String,
    pub unit: String,
    pub base: f64,
    pub current: f64,
}

impl ComparisonRow {
    pub fn delta(&self) -> f64 {
        self.current - self.base
    }

    /// Relative change in percent, `None` when the base is zero.
    pub fn percent_change(&self) -> Option<f64> {
        if self.base == 0.0 {
            return None;
        }
        Some(self.delta() / self.base * 100.0)
    }
}

/// Builds a comparison row from period totals; missing periods count as 0.
pub fn compare_periods(
    label: impl Into<String>,
    unit: impl Into<String>,
    totals: &PeriodTotals,
    base: Period,
    current: Period,
) -> ComparisonRow {
    ComparisonRow {
        label: label.into(),
        unit: unit.into(),
        base: totals.get(&base).copied().unwrap_or(0.0),
        current: totals.get(&current).copied().unwrap_or(0.0),
    }
}

/// Fixed-width comparison table with a column per period.
pub fn render_comparison_table(
    rows: &[ComparisonRow],
    base_label: &str,
    current_label: &str,
) -> String {
    let mut table = TextTable::new([
        String::new(),
        "unit".to_string(),
        base_label.to_string(),
        current_label.to_string(),
        "delta".to_string(),
        "%".to_string(),
    ]);
    for column in 2..=5 {
        table.align(column, Alignment::Right);
    }
    for row in rows {
        table.push_row(vec![
            row.label.clone(),
            row.unit.clone(),
            format!("{:.2}", row.base),
            format!("{:.2}", row.current),
            format!("{:+.2}", row.delta()),
            row.percent_change()
                .map(|pct| format!("{pct:+.1}"))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

/// Horizontal bar chart of period totals, oldest period first.
pub fn render_period_chart(totals: &PeriodTotals, options: BarChartOptions) -> String {
    let entries: Vec<(String, f64)> = totals
        .iter()
        .map(|(period, value)| (period.to_string(), *value))
        .collect();
    render_bar_chart(&entries, options)
}

#[cfg(test)]
mod tests {
    use super::{
        aggregate_by_period, compare_periods, derive_consumption, render_comparison_table,
        rollup_by_category, Attribution, ComparisonRow, ConsumptionError, Granularity,
        MeterSeries, Period, PeriodTotals,
    };
    use crate::model::meter::Reading;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reading(y: i32, m: u32, d: u32, index: f64) -> Reading {
        Reading::new(1, date(y, m, d), index)
    }

    #[test]
    fn derive_sorts_and_flags_resets() {
        let intervals = derive_consumption(&[
            reading(2024, 3, 1, 150.0),
            reading(2024, 1, 1, 100.0),
            reading(2024, 4, 1, 20.0),
        ])
        .unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].start, date(2024, 1, 1));
        assert_eq!(intervals[0].days, 60);
        assert_eq!(intervals[0].consumption, 50.0);
        assert!(!intervals[0].reset);
        assert!(intervals[1].reset);
        assert_eq!(intervals[1].consumption, 20.0);
    }

    #[test]
    fn derive_rejects_duplicate_dates_and_mixed_meters() {
        let err = derive_consumption(&[reading(2024, 1, 1, 1.0), reading(2024, 1, 1, 2.0)])
            .unwrap_err();
        assert!(matches!(err, ConsumptionError::DuplicateDate { .. }));

        let mut other = reading(2024, 2, 1, 3.0);
        other.meter_id = 2;
        let err = derive_consumption(&[reading(2024, 1, 1, 1.0), other]).unwrap_err();
        assert_eq!(
            err,
            ConsumptionError::MixedMeters {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn single_reading_has_no_interval() {
        assert!(derive_consumption(&[reading(2024, 1, 1, 5.0)])
            .unwrap()
            .is_empty());
        assert!(derive_consumption(&[]).unwrap().is_empty());
    }

    #[test]
    fn end_date_attribution_puts_whole_interval_in_end_period() {
        let intervals =
            derive_consumption(&[reading(2023, 12, 1, 0.0), reading(2024, 1, 31, 62.0)]).unwrap();
        let totals = aggregate_by_period(&intervals, Granularity::Year, Attribution::EndDate);
        assert_eq!(totals.get(&Period::year(2024)), Some(&62.0));
        assert_eq!(totals.get(&Period::year(2023)), None);
    }

    #[test]
    fn prorata_attribution_splits_by_days() {
        // 61 days: Dec 2..=Dec 31 (30 days) then Jan 1..=Jan 31 (31 days).
        let intervals =
            derive_consumption(&[reading(2023, 12, 1, 0.0), reading(2024, 1, 31, 61.0)]).unwrap();
        let totals = aggregate_by_period(&intervals, Granularity::Month, Attribution::Prorata);
        let december = totals[&Period::month(2023, 12)];
        let january = totals[&Period::month(2024, 1)];
        assert!((december - 30.0).abs() < 1e-9);
        assert!((january - 31.0).abs() < 1e-9);
    }

    #[test]
    fn daily_average_divides_by_days() {
        let intervals =
            derive_consumption(&[reading(2024, 1, 1, 10.0), reading(2024, 1, 11, 30.0)]).unwrap();
        assert_eq!(intervals[0].daily_average(), 2.0);
    }

    #[test]
    fn rollup_truncates_paths_and_keeps_units_apart() {
        let mut totals = PeriodTotals::new();
        totals.insert(Period::year(2024), 10.0);
        let series = vec![
            MeterSeries {
                meter_id: 1,
                meter_name: "A".to_string(),
                unit: "m3".to_string(),
                category_path: vec!["Site".to_string(), "Water".to_string()],
                totals: totals.clone(),
            },
            MeterSeries {
                meter_id: 2,
                meter_name: "B".to_string(),
                unit: "m3".to_string(),
                category_path: vec!["Site".to_string(), "Garden".to_string()],
                totals: totals.clone(),
            },
            MeterSeries {
                meter_id: 3,
                meter_name: "C".to_string(),
                unit: "kWh".to_string(),
                category_path: vec!["Site".to_string()],
                totals,
            },
        ];

        let rollup = rollup_by_category(&series, 1).unwrap();
        assert_eq!(rollup.len(), 2);
        let water: f64 = rollup
            .iter()
            .find(|(key, _)| key.unit == "m3")
            .map(|(_, totals)| totals[&Period::year(2024)])
            .unwrap();
        assert_eq!(water, 20.0);

        assert_eq!(rollup_by_category(&series, 2).unwrap().len(), 3);
        assert_eq!(
            rollup_by_category(&series, 0).unwrap_err(),
            ConsumptionError::InvalidDepth(0)
        );
    }

    #[test]
    fn comparison_handles_zero_base() {
        let mut totals = PeriodTotals::new();
        totals.insert(Period::year(2024), 120.0);
        let row = compare_periods("A", "m3", &totals, Period::year(2023), Period::year(2024));
        assert_eq!(row.base, 0.0);
        assert_eq!(row.delta(), 120.0);
        assert_eq!(row.percent_change(), None);

        let row = ComparisonRow {
            label: "B".to_string(),
            unit: "m3".to_string(),
            base: 100.0,
            current: 80.0,
        };
        assert_eq!(row.percent_change(), Some(-20.0));
    }

    #[test]
    fn comparison_table_renders_dash_for_missing_percent() {
        let rendered = render_comparison_table(
            &[ComparisonRow {
                label: "Boiler".to_string(),
                unit: "kWh".to_string(),
                base: 0.0,
                current: 5.0,
            }],
            "2023",
            "2024",
        );
        let row = rendered.lines().last().unwrap();
        assert!(row.starts_with("Boiler"));
        assert!(row.contains("+5.00"));
        assert!(row.ends_with('-'));
    }

    #[test]
    fn period_bounds_and_display() {
        let feb = Period::month(2024, 2);
        assert_eq!(feb.to_string(), "2024-02");
        assert_eq!(feb.last_day(), Some(date(2024, 2, 29)));
        assert_eq!(Period::month(2024, 12).last_day(), Some(date(2024, 12, 31)));
        assert_eq!(Period::year(2024).previous_year(), Period::year(2023));
    }
}
