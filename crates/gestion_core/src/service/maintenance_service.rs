//! Maintenance register use-case service: due dates and calendar views.
//!
//! # Responsibility
//! - Expand recurrence rules into concrete occurrence dates.
//! - Track completion (`last_done`, history, archiving).
//! - Build Monday-first month calendars of due entries.
//!
//! # Invariants
//! - Archived entries never appear as due, overdue or in calendars.
//! - An entry is archived on completion once it has no further occurrence.

use crate::model::maintenance::{MaintenanceEntry, MaintenanceRecord};
use crate::model::{RecordId, ValidationError};
use crate::repo::maintenance_repo::{MaintenanceQuery, MaintenanceRepository};
use crate::repo::{RepoError, RepoResult};
use chrono::{Datelike, NaiveDate};
use log::info;

/// Due dates of `entry` within `from..=to`, in order.
pub fn occurrences_in_range(
    entry: &MaintenanceEntry,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    let last_allowed = entry.until.map_or(to, |until| until.min(to));
    let rule = match entry.recurrence {
        Some(rule) if rule.interval() > 0 => rule,
        _ => {
            let start = entry.start_date;
            return if from <= start && start <= last_allowed {
                vec![start]
            } else {
                Vec::new()
            };
        }
    };

    let mut dates = Vec::new();
    let mut n = rule.index_lower_bound(entry.start_date, from);
    while let Some(date) = rule.nth(entry.start_date, n) {
        if date > last_allowed {
            break;
        }
        if date >= from {
            dates.push(date);
        }
        n += 1;
    }
    dates
}

/// First occurrence still to do: the start date when never done, otherwise
/// the first occurrence strictly after `last_done`.
pub fn next_due(entry: &MaintenanceEntry) -> Option<NaiveDate> {
    let Some(last_done) = entry.last_done else {
        return Some(entry.start_date);
    };
    let rule = entry.recurrence.filter(|rule| rule.interval() > 0)?;
    let after = last_done.succ_opt()?;
    let mut n = rule.index_lower_bound(entry.start_date, after);
    while let Some(date) = rule.nth(entry.start_date, n) {
        if entry.until.is_some_and(|until| date > until) {
            return None;
        }
        if date >= after {
            return Some(date);
        }
        n += 1;
    }
    None
}

/// Next due date when it falls strictly before `today`.
pub fn overdue_since(entry: &MaintenanceEntry, today: NaiveDate) -> Option<NaiveDate> {
    if entry.archived {
        return None;
    }
    next_due(entry).filter(|due| *due < today)
}

/// One entry due on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarItem {
    pub entry_id: Option<RecordId>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub items: Vec<CalendarItem>,
}

/// Month grid, one row per week, Monday first. Cells outside the month are
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[Option<CalendarDay>; 7]>,
}

const WEEKDAY_HEADERS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

impl MonthCalendar {
    pub fn build(year: i32, month: u32, entries: &[MaintenanceEntry]) -> RepoResult<Self> {
        let (first, last) = month_bounds(year, month).ok_or_else(|| {
            RepoError::Validation(ValidationError::new(
                "month",
                format!("{year}-{month:02} is not a calendar month"),
            ))
        })?;

        let mut days: Vec<CalendarDay> = first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| CalendarDay {
                date,
                items: Vec::new(),
            })
            .collect();
        for entry in entries.iter().filter(|entry| !entry.archived) {
            for date in occurrences_in_range(entry, first, last) {
                let index = (date - first).num_days() as usize;
                if let Some(day) = days.get_mut(index) {
                    day.items.push(CalendarItem {
                        entry_id: entry.id,
                        title: entry.title.clone(),
                    });
                }
            }
        }

        let lead = first.weekday().num_days_from_monday() as usize;
        let mut cells: Vec<Option<CalendarDay>> = vec![None; lead];
        cells.extend(days.into_iter().map(Some));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }
        let weeks = cells
            .chunks(7)
            .map(|week| std::array::from_fn(|i| week[i].clone()))
            .collect();
        Ok(Self { year, month, weeks })
    }

    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.weeks.iter().flatten().flatten()
    }

    /// Grid with `*` on busy days, followed by the agenda of the month.
    pub fn render(&self) -> String {
        let mut out = format!("{:04}-{:02}\n", self.year, self.month);
        let header: Vec<String> = WEEKDAY_HEADERS.iter().map(|d| format!("{d:<3}")).collect();
        out.push_str(header.join(" ").trim_end());
        out.push('\n');
        for week in &self.weeks {
            let cells: Vec<String> = week
                .iter()
                .map(|cell| match cell {
                    Some(day) => {
                        let marker = if day.items.is_empty() { ' ' } else { '*' };
                        format!("{:>2}{marker}", day.date.day())
                    }
                    None => "   ".to_string(),
                })
                .collect();
            out.push_str(cells.join(" ").trim_end());
            out.push('\n');
        }

        let agenda: Vec<String> = self
            .days()
            .flat_map(|day| {
                day.items
                    .iter()
                    .map(move |item| format!("{}  {}", day.date, item.title))
            })
            .collect();
        if !agenda.is_empty() {
            out.push('\n');
            for line in agenda {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Result of marking an entry done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub history_id: RecordId,
    pub archived: bool,
    pub next_due: Option<NaiveDate>,
}

/// Overdue entry with the date it was due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueEntry {
    pub entry: MaintenanceEntry,
    pub due: NaiveDate,
}

pub struct MaintenanceService<R: MaintenanceRepository> {
    repo: R,
}

impl<R: MaintenanceRepository> MaintenanceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_entry(&self, entry: &MaintenanceEntry) -> RepoResult<RecordId> {
        let id = self.repo.create_entry(entry)?;
        info!("event=maintenance_create module=maintenance status=ok id={id}");
        Ok(id)
    }

    pub fn update_entry(&self, entry: &MaintenanceEntry) -> RepoResult<()> {
        self.repo.update_entry(entry)?;
        info!(
            "event=maintenance_update module=maintenance status=ok id={}",
            entry.id.unwrap_or_default()
        );
        Ok(())
    }

    pub fn get_entry(&self, id: RecordId) -> RepoResult<Option<MaintenanceEntry>> {
        self.repo.get_entry(id)
    }

    pub fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        self.repo.delete_entry(id)?;
        info!("event=maintenance_delete module=maintenance status=ok id={id}");
        Ok(())
    }

    pub fn search_entries(&self, query: &MaintenanceQuery) -> RepoResult<Vec<MaintenanceEntry>> {
        self.repo.search_entries(query)
    }

    pub fn history(&self, id: RecordId) -> RepoResult<Vec<MaintenanceRecord>> {
        self.repo.history(id)
    }

    pub fn next_due(&self, id: RecordId) -> RepoResult<Option<NaiveDate>> {
        Ok(next_due(&self.require_entry(id)?))
    }

    /// Records an occurrence done on `done_on`; archives the entry when no
    /// occurrence remains after it.
    pub fn mark_done(
        &self,
        id: RecordId,
        done_on: NaiveDate,
        comment: &str,
    ) -> RepoResult<Completion> {
        let mut entry = self.require_entry(id)?;
        entry.last_done = Some(entry.last_done.map_or(done_on, |last| last.max(done_on)));
        let upcoming = next_due(&entry);
        let archive = upcoming.is_none();

        let history_id = self.repo.record_completion(id, done_on, comment, archive)?;
        info!("event=maintenance_done module=maintenance status=ok id={id} archived={archive}");
        Ok(Completion {
            history_id,
            archived: archive,
            next_due: upcoming,
        })
    }

    /// Active entries whose next due date is before `today`, oldest first.
    pub fn overdue(&self, today: NaiveDate) -> RepoResult<Vec<OverdueEntry>> {
        let entries = self.repo.search_entries(&MaintenanceQuery::default())?;
        let mut overdue: Vec<OverdueEntry> = entries
            .into_iter()
            .filter_map(|entry| {
                overdue_since(&entry, today).map(|due| OverdueEntry { entry, due })
            })
            .collect();
        overdue.sort_by(|a, b| a.due.cmp(&b.due).then(a.entry.id.cmp(&b.entry.id)));
        Ok(overdue)
    }

    pub fn calendar(&self, year: i32, month: u32) -> RepoResult<MonthCalendar> {
        let entries = self.repo.search_entries(&MaintenanceQuery::default())?;
        MonthCalendar::build(year, month, &entries)
    }

    fn require_entry(&self, id: RecordId) -> RepoResult<MaintenanceEntry> {
        self.repo.get_entry(id)?.ok_or(RepoError::NotFound {
            entity: "maintenance entry",
            id,
        })
    }
}
