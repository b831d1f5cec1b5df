//! `gestion maintenance ...`

use crate::output::{export, open, print_records, today, ExportArgs};
use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Args, Subcommand};
use gestion_core::db::Store;
use gestion_core::model::maintenance::{MaintenanceEntry, Recurrence};
use gestion_core::repo::maintenance_repo::{MaintenanceQuery, SqliteMaintenanceRepository};
use gestion_core::repo::RepoError;
use gestion_core::service::maintenance_service::MaintenanceService;
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum MaintenanceCommand {
    /// Register a maintenance operation
    Add {
        title: String,
        /// First due date
        start: NaiveDate,
        #[command(flatten)]
        fields: EntryFields,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Make the entry a one-off operation
        #[arg(long, conflicts_with = "every")]
        once: bool,
        #[command(flatten)]
        fields: EntryFields,
    },
    /// Show an entry with its next due date and history
    Show {
        id: i64,
    },
    Delete {
        id: i64,
    },
    List {
        #[command(flatten)]
        filter: EntryFilter,
    },
    /// Record that an occurrence was done
    Done {
        id: i64,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Entries whose next occurrence is past
    Overdue {
        /// Reference date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Month calendar of due occurrences
    Calendar {
        year: Option<i32>,
        month: Option<u32>,
    },
    Export {
        #[command(flatten)]
        filter: EntryFilter,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct EntryFields {
    #[arg(long)]
    equipment: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Repeat rule such as `3 months`, `2w` or `1y`
    #[arg(long, value_parser = parse_recurrence)]
    every: Option<Recurrence>,
    /// Last date an occurrence may fall on
    #[arg(long)]
    until: Option<NaiveDate>,
    #[arg(long)]
    notes: Option<String>,
}

impl EntryFields {
    fn apply(self, entry: &mut MaintenanceEntry) {
        if let Some(equipment) = self.equipment {
            entry.equipment = equipment;
        }
        if let Some(category) = self.category {
            entry.category = category;
        }
        if let Some(rule) = self.every {
            entry.recurrence = Some(rule);
        }
        if let Some(until) = self.until {
            entry.until = Some(until);
        }
        if let Some(notes) = self.notes {
            entry.notes = notes;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct EntryFilter {
    /// Equipment name contains
    #[arg(long)]
    equipment: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Title or notes contain
    #[arg(long)]
    text: Option<String>,
    /// Include archived entries
    #[arg(long)]
    all: bool,
}

impl EntryFilter {
    fn into_query(self) -> MaintenanceQuery {
        MaintenanceQuery {
            equipment: self.equipment,
            category: self.category,
            text: self.text,
            include_archived: self.all,
        }
    }
}

fn parse_recurrence(text: &str) -> Result<Recurrence, String> {
    Recurrence::parse(text)
        .ok_or_else(|| format!("`{text}` is not a repeat rule; try `3 months` or `2w`"))
}

pub fn run(config: &AppConfig, command: MaintenanceCommand) -> Result<()> {
    let conn = open(config, Store::Maintenance)?;
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn)?);

    match command {
        MaintenanceCommand::Add {
            title,
            start,
            fields,
        } => {
            let mut entry = MaintenanceEntry::new(title, start);
            fields.apply(&mut entry);
            let id = service.create_entry(&entry)?;
            println!("maintenance entry {id} created");
        }
        MaintenanceCommand::Update {
            id,
            title,
            start,
            once,
            fields,
        } => {
            let mut entry = service.get_entry(id)?.ok_or(RepoError::NotFound {
                entity: "maintenance entry",
                id,
            })?;
            if let Some(title) = title {
                entry.title = title;
            }
            if let Some(start) = start {
                entry.start_date = start;
            }
            if once {
                entry.recurrence = None;
            }
            fields.apply(&mut entry);
            service.update_entry(&entry)?;
            println!("maintenance entry {id} updated");
        }
        MaintenanceCommand::Show { id } => {
            let Some(entry) = service.get_entry(id)? else {
                bail!("maintenance entry {id} not found");
            };
            print_entry(&entry);
            match service.next_due(id)? {
                Some(due) => println!("next due:   {due}"),
                None => println!("next due:   -"),
            }
            let history = service.history(id)?;
            if !history.is_empty() {
                println!("history:");
                for record in &history {
                    if record.comment.is_empty() {
                        println!("  {}", record.done_on);
                    } else {
                        println!("  {}  {}", record.done_on, record.comment);
                    }
                }
            }
        }
        MaintenanceCommand::Delete { id } => {
            service.delete_entry(id)?;
            println!("maintenance entry {id} deleted");
        }
        MaintenanceCommand::List { filter } => {
            let entries = service.search_entries(&filter.into_query())?;
            print_records(&entries);
        }
        MaintenanceCommand::Done { id, date, comment } => {
            let completion = service.mark_done(id, date.unwrap_or_else(today), &comment)?;
            match completion.next_due {
                Some(due) => println!("entry {id} done; next due {due}"),
                None if completion.archived => println!("entry {id} done and archived"),
                None => println!("entry {id} done"),
            }
        }
        MaintenanceCommand::Overdue { date } => {
            let overdue = service.overdue(date.unwrap_or_else(today))?;
            if overdue.is_empty() {
                println!("(nothing overdue)");
            }
            for item in &overdue {
                println!(
                    "{}  [{}] {}",
                    item.due,
                    item.entry.id.unwrap_or_default(),
                    item.entry.title
                );
            }
        }
        MaintenanceCommand::Calendar { year, month } => {
            let now = today();
            let calendar = service.calendar(
                year.unwrap_or_else(|| now.year()),
                month.unwrap_or_else(|| now.month()),
            )?;
            print!("{}", calendar.render());
        }
        MaintenanceCommand::Export { filter, output } => {
            let entries = service.search_entries(&filter.into_query())?;
            export(config, &entries, &output)?;
        }
    }
    Ok(())
}

fn print_entry(entry: &MaintenanceEntry) {
    let or_dash = |date: Option<NaiveDate>| date.map_or_else(|| "-".to_string(), |d| d.to_string());
    println!("id:         {}", entry.id.unwrap_or_default());
    println!("title:      {}", entry.title);
    println!("equipment:  {}", entry.equipment);
    println!("category:   {}", entry.category);
    println!("start:      {}", entry.start_date);
    println!(
        "repeat:     {}",
        entry
            .recurrence
            .map_or_else(|| "once".to_string(), |rule| rule.to_string())
    );
    println!("until:      {}", or_dash(entry.until));
    println!("last done:  {}", or_dash(entry.last_done));
    println!("archived:   {}", if entry.archived { "yes" } else { "no" });
    if !entry.notes.is_empty() {
        println!("notes:      {}", entry.notes);
    }
}
