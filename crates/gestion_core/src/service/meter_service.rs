//! Meter use-case service: guarded reading entry and consumption reports.
//!
//! # Responsibility
//! - Enforce reading rules that need neighbouring readings.
//! - Feed repository data into the consumption engine.
//!
//! # Invariants
//! - A new reading never goes below the previous index nor above the next
//!   one unless the caller declares a meter reset.
//! - Readings are only recorded on active meters; stored readings may still
//!   be corrected after a meter is deactivated.
//! - Yearly reports keep inactive meters that consumed in either year.

use crate::model::meter::{Meter, Reading};
use crate::model::RecordId;
use crate::repo::meter_repo::{DateRange, MeterQuery, MeterRepository};
use crate::repo::RepoError;
use crate::service::consumption::{
    aggregate_by_period, compare_periods, derive_consumption, rollup_by_category, Attribution,
    ComparisonRow, ConsumptionError, ConsumptionInterval, Granularity, MeterSeries, Period,
    PeriodTotals,
};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum MeterServiceError {
    MeterNotFound(RecordId),
    MeterInactive(RecordId),
    /// Index is lower than the reading before it.
    IndexBelowPrevious {
        meter_id: RecordId,
        previous_date: NaiveDate,
        previous: f64,
        value: f64,
    },
    /// Index is higher than the reading after it.
    IndexAboveNext {
        meter_id: RecordId,
        next_date: NaiveDate,
        next: f64,
        value: f64,
    },
    Consumption(ConsumptionError),
    Repo(RepoError),
}

impl Display for MeterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MeterNotFound(id) => write!(f, "meter not found: {id}"),
            Self::MeterInactive(id) => write!(f, "meter {id} is inactive"),
            Self::IndexBelowPrevious {
                meter_id,
                previous_date,
                previous,
                value,
            } => write!(
                f,
                "index {value} of meter {meter_id} is below {previous} read on {previous_date}; \
                 record it as a reset if the meter was replaced"
            ),
            Self::IndexAboveNext {
                meter_id,
                next_date,
                next,
                value,
            } => write!(
                f,
                "index {value} of meter {meter_id} is above {next} read on {next_date}"
            ),
            Self::Consumption(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MeterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Consumption(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MeterServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "meter",
                id,
            } => Self::MeterNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ConsumptionError> for MeterServiceError {
    fn from(value: ConsumptionError) -> Self {
        Self::Consumption(value)
    }
}

pub type MeterServiceResult<T> = Result<T, MeterServiceError>;

/// Which rows a yearly comparison is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportGrouping {
    PerMeter,
    /// Category roll-up truncated to this many levels.
    CategoryDepth(usize),
}

/// Year-over-year comparison rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub base: Period,
    pub current: Period,
    pub rows: Vec<ComparisonRow>,
}

/// Meter service facade.
pub struct MeterService<R: MeterRepository> {
    repo: R,
}

impl<R: MeterRepository> MeterService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Records one reading after checking it against its neighbours.
    ///
    /// `allow_reset` accepts an index lower than the previous one; the
    /// interval ending on this reading is then counted from zero.
    pub fn record_reading(
        &self,
        reading: &Reading,
        allow_reset: bool,
    ) -> MeterServiceResult<RecordId> {
        let meter = self.require_meter(reading.meter_id)?;
        if !meter.active {
            return Err(MeterServiceError::MeterInactive(reading.meter_id));
        }
        if !allow_reset {
            self.check_neighbours(reading)?;
        }

        let id = self.repo.add_reading(reading)?;
        info!(
            "event=reading_record module=meters status=ok meter_id={} reset={}",
            reading.meter_id, allow_reset
        );
        Ok(id)
    }

    /// Corrects stored reading `reading.id`, with the same neighbour checks
    /// as [`MeterService::record_reading`].
    pub fn update_reading(&self, reading: &Reading, allow_reset: bool) -> MeterServiceResult<()> {
        let id = reading.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a reading without id".to_string())
        })?;
        let stored = self.repo.get_reading(id)?.ok_or(RepoError::NotFound {
            entity: "reading",
            id,
        })?;
        if stored.meter_id != reading.meter_id {
            return Err(RepoError::InvalidData(format!(
                "reading {id} belongs to meter {}, not {}",
                stored.meter_id, reading.meter_id
            ))
            .into());
        }
        if !allow_reset {
            self.check_neighbours(reading)?;
        }

        self.repo.update_reading(reading)?;
        info!(
            "event=reading_update module=meters status=ok meter_id={} reading_id={} reset={}",
            reading.meter_id, id, allow_reset
        );
        Ok(())
    }

    /// Neighbours of `reading`, skipping the stored row of `reading` itself.
    fn neighbours(
        &self,
        reading: &Reading,
    ) -> MeterServiceResult<(Option<Reading>, Option<Reading>)> {
        let own = |candidate: &Reading| reading.id.is_some() && candidate.id == reading.id;
        let previous = match self.repo.reading_before(reading.meter_id, reading.date)? {
            Some(candidate) if own(&candidate) => {
                self.repo.reading_before(reading.meter_id, candidate.date)?
            }
            other => other,
        };
        let next = match self.repo.reading_after(reading.meter_id, reading.date)? {
            Some(candidate) if own(&candidate) => {
                self.repo.reading_after(reading.meter_id, candidate.date)?
            }
            other => other,
        };
        Ok((previous, next))
    }

    fn check_neighbours(&self, reading: &Reading) -> MeterServiceResult<()> {
        let (previous, next) = self.neighbours(reading)?;
        if let Some(previous) = previous {
            if reading.index_value < previous.index_value {
                warn!(
                    "event=reading_record module=meters status=error reason=index_below_previous meter_id={}",
                    reading.meter_id
                );
                return Err(MeterServiceError::IndexBelowPrevious {
                    meter_id: reading.meter_id,
                    previous_date: previous.date,
                    previous: previous.index_value,
                    value: reading.index_value,
                });
            }
        }
        if let Some(next) = next {
            if reading.index_value > next.index_value {
                warn!(
                    "event=reading_record module=meters status=error reason=index_above_next meter_id={}",
                    reading.meter_id
                );
                return Err(MeterServiceError::IndexAboveNext {
                    meter_id: reading.meter_id,
                    next_date: next.date,
                    next: next.index_value,
                    value: reading.index_value,
                });
            }
        }
        Ok(())
    }

    /// Consumption intervals of one meter, optionally limited to intervals
    /// ending inside `range`.
    pub fn consumption(
        &self,
        meter_id: RecordId,
        range: Option<DateRange>,
    ) -> MeterServiceResult<Vec<ConsumptionInterval>> {
        self.require_meter(meter_id)?;
        let readings = self.repo.list_readings(meter_id, None)?;
        let mut intervals = derive_consumption(&readings)?;
        if let Some(range) = range {
            intervals.retain(|interval| range.contains(interval.end));
        }
        Ok(intervals)
    }

    /// Period totals of one meter.
    pub fn consumption_series(
        &self,
        meter_id: RecordId,
        granularity: Granularity,
        attribution: Attribution,
    ) -> MeterServiceResult<PeriodTotals> {
        let intervals = self.consumption(meter_id, None)?;
        Ok(aggregate_by_period(&intervals, granularity, attribution))
    }

    /// Compares `year` against the year before for every meter, or only
    /// meters under `category_id` when given. Inactive meters count when they
    /// consumed in one of the two years.
    pub fn yearly_comparison(
        &self,
        year: i32,
        category_id: Option<RecordId>,
        grouping: ReportGrouping,
        attribution: Attribution,
    ) -> MeterServiceResult<ComparisonReport> {
        let started_at = Instant::now();
        let current = Period::year(year);
        let base = current.previous_year();

        let meters = self.repo.list_meters(&MeterQuery {
            category_id,
            include_inactive: true,
        })?;
        let active: HashSet<RecordId> = meters
            .iter()
            .filter(|meter| meter.active)
            .filter_map(|meter| meter.id)
            .collect();
        let mut series = self.meter_series(&meters, Granularity::Year, attribution)?;
        series.retain(|meter| {
            active.contains(&meter.meter_id)
                || meter.totals.contains_key(&base)
                || meter.totals.contains_key(&current)
        });

        let rows = match grouping {
            ReportGrouping::PerMeter => series
                .iter()
                .map(|meter| {
                    compare_periods(
                        meter.meter_name.as_str(),
                        meter.unit.as_str(),
                        &meter.totals,
                        base,
                        current,
                    )
                })
                .collect(),
            ReportGrouping::CategoryDepth(depth) => rollup_by_category(&series, depth)?
                .into_iter()
                .map(|(key, totals)| {
                    compare_periods(key.to_string(), key.unit.as_str(), &totals, base, current)
                })
                .collect::<Vec<_>>(),
        };

        info!(
            "event=consumption_report module=meters status=ok kind=yearly year={} meters={} rows={} duration_ms={}",
            year,
            series.len(),
            rows.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ComparisonReport {
            base,
            current,
            rows,
        })
    }

    /// Month-by-month consumption of one meter in `year` against `year - 1`.
    pub fn monthly_profile(
        &self,
        meter_id: RecordId,
        year: i32,
        attribution: Attribution,
    ) -> MeterServiceResult<Vec<ComparisonRow>> {
        let meter = self.require_meter(meter_id)?;
        let totals = self.consumption_series(meter_id, Granularity::Month, attribution)?;
        let rows = (1..=12)
            .map(|month| {
                let current = Period::month(year, month);
                compare_periods(
                    format!("{month:02}"),
                    meter.unit.as_str(),
                    &totals,
                    current.previous_year(),
                    current,
                )
            })
            .collect();
        info!(
            "event=consumption_report module=meters status=ok kind=monthly meter_id={} year={}",
            meter_id, year
        );
        Ok(rows)
    }

    fn meter_series(
        &self,
        meters: &[Meter],
        granularity: Granularity,
        attribution: Attribution,
    ) -> MeterServiceResult<Vec<MeterSeries>> {
        let mut series = Vec::with_capacity(meters.len());
        for meter in meters {
            let Some(meter_id) = meter.id else {
                continue;
            };
            let readings = self.repo.list_readings(meter_id, None)?;
            let intervals = derive_consumption(&readings)?;
            series.push(MeterSeries {
                meter_id,
                meter_name: meter.name.clone(),
                unit: meter.unit.clone(),
                category_path: self.repo.category_path(meter.category_id)?,
                totals: aggregate_by_period(&intervals, granularity, attribution),
            });
        }
        Ok(series)
    }

    fn require_meter(&self, meter_id: RecordId) -> MeterServiceResult<Meter> {
        self.repo
            .get_meter(meter_id)?
            .ok_or(MeterServiceError::MeterNotFound(meter_id))
    }
}

impl ComparisonReport {
    pub fn base_label(&self) -> String {
        self.base.to_string()
    }

    pub fn current_label(&self) -> String {
        self.current.to_string()
    }
}
