//! `gestion meters ...`

use crate::output::{export, open, print_records, ExportArgs};
use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use gestion_core::db::Store;
use gestion_core::export::{render_bar_chart, Alignment, BarChartOptions, TextTable};
use gestion_core::model::meter::{Category, CategoryNode, Meter, Reading};
use gestion_core::repo::meter_repo::{
    DateRange, MeterQuery, MeterRepository, SqliteMeterRepository,
};
use gestion_core::service::consumption::{
    render_comparison_table, render_period_chart, Attribution, ComparisonRow, Granularity,
};
use gestion_core::service::meter_service::{MeterService, ReportGrouping};
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum MetersCommand {
    /// Create a category, optionally under a parent
    AddCategory {
        name: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    RenameCategory {
        id: i64,
        name: String,
    },
    /// Move a category under another one, or to the top level
    MoveCategory {
        id: i64,
        #[arg(long)]
        parent: Option<i64>,
    },
    DeleteCategory {
        id: i64,
    },
    /// Print the category tree
    Tree,
    /// Create a meter
    Add {
        name: String,
        #[arg(long)]
        category: i64,
        #[arg(long)]
        unit: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Activate or deactivate a meter
    SetActive {
        id: i64,
        /// true | false
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    Delete {
        id: i64,
    },
    List {
        /// Meters in this category and below
        #[arg(long)]
        category: Option<i64>,
        /// Include inactive meters
        #[arg(long)]
        all: bool,
    },
    /// Record an index reading
    Read {
        /// Meter id or name
        meter: String,
        date: NaiveDate,
        index: f64,
        /// Accept an index below the previous one (meter replaced)
        #[arg(long)]
        reset: bool,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Readings {
        meter: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Correct a stored reading
    UpdateReading {
        id: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        index: Option<f64>,
        #[arg(long)]
        comment: Option<String>,
        /// Accept an index outside its neighbours (meter replaced)
        #[arg(long)]
        reset: bool,
    },
    DeleteReading {
        id: i64,
    },
    /// Consumption between consecutive readings
    Consumption {
        meter: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Consumption per month or year of one meter
    Series {
        meter: i64,
        #[arg(long)]
        yearly: bool,
        #[arg(long)]
        prorata: bool,
        #[arg(long)]
        chart: bool,
    },
    /// Year against previous year, per meter or per category
    Report {
        year: i32,
        /// Only meters under this category
        #[arg(long)]
        category: Option<i64>,
        /// Roll up by category path truncated to this depth
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        prorata: bool,
        #[arg(long)]
        chart: bool,
    },
    /// Monthly consumption of a meter against the previous year
    Profile {
        meter: i64,
        year: i32,
        #[arg(long)]
        prorata: bool,
        #[arg(long)]
        chart: bool,
    },
    /// Export the readings of one meter
    Export {
        meter: i64,
        #[command(flatten)]
        output: ExportArgs,
    },
}

fn attribution(prorata: bool) -> Attribution {
    if prorata {
        Attribution::Prorata
    } else {
        Attribution::EndDate
    }
}

pub fn run(config: &AppConfig, command: MetersCommand) -> Result<()> {
    let conn = open(config, Store::Meters)?;
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn)?);
    let repo = service.repo();

    match command {
        MetersCommand::AddCategory { name, parent } => {
            let id = repo.create_category(&Category::new(name, parent))?;
            println!("category {id} created");
        }
        MetersCommand::RenameCategory { id, name } => {
            repo.rename_category(id, &name)?;
            println!("category {id} renamed");
        }
        MetersCommand::MoveCategory { id, parent } => {
            repo.move_category(id, parent)?;
            println!("category {id} moved");
        }
        MetersCommand::DeleteCategory { id } => {
            repo.delete_category(id)?;
            println!("category {id} deleted");
        }
        MetersCommand::Tree => {
            let tree = repo.category_tree()?;
            if tree.is_empty() {
                println!("(no categories)");
            }
            for node in &tree {
                print_node(node, 0);
            }
        }
        MetersCommand::Add {
            name,
            category,
            unit,
            notes,
        } => {
            let mut meter = Meter::new(name, category, unit);
            meter.notes = notes;
            let id = repo.create_meter(&meter)?;
            println!("meter {id} created");
        }
        MetersCommand::Update {
            id,
            name,
            category,
            unit,
            notes,
        } => {
            let Some(mut meter) = repo.get_meter(id)? else {
                bail!("meter {id} not found");
            };
            if let Some(name) = name {
                meter.name = name;
            }
            if let Some(category) = category {
                meter.category_id = category;
            }
            if let Some(unit) = unit {
                meter.unit = unit;
            }
            if let Some(notes) = notes {
                meter.notes = notes;
            }
            repo.update_meter(&meter)?;
            println!("meter {id} updated");
        }
        MetersCommand::SetActive { id, active } => {
            repo.set_meter_active(id, active)?;
            println!(
                "meter {id} {}",
                if active { "activated" } else { "deactivated" }
            );
        }
        MetersCommand::Delete { id } => {
            repo.delete_meter(id)?;
            println!("meter {id} and its readings deleted");
        }
        MetersCommand::List { category, all } => {
            let meters = repo.list_meters(&MeterQuery {
                category_id: category,
                include_inactive: all,
            })?;
            print_meters(repo, &meters)?;
        }
        MetersCommand::Read {
            meter,
            date,
            index,
            reset,
            comment,
        } => {
            let mut reading = Reading::new(resolve_meter(repo, &meter)?, date, index);
            reading.comment = comment;
            let id = service.record_reading(&reading, reset)?;
            println!("reading {id} recorded");
        }
        MetersCommand::Readings { meter, from, to } => {
            let readings = repo.list_readings(meter, DateRange::between(from, to))?;
            print_records(&readings);
        }
        MetersCommand::UpdateReading {
            id,
            date,
            index,
            comment,
            reset,
        } => {
            let Some(mut reading) = repo.get_reading(id)? else {
                bail!("reading {id} not found");
            };
            if let Some(date) = date {
                reading.date = date;
            }
            if let Some(index) = index {
                reading.index_value = index;
            }
            if let Some(comment) = comment {
                reading.comment = comment;
            }
            service.update_reading(&reading, reset)?;
            println!("reading {id} updated");
        }
        MetersCommand::DeleteReading { id } => {
            repo.delete_reading(id)?;
            println!("reading {id} deleted");
        }
        MetersCommand::Consumption { meter, from, to } => {
            let intervals = service.consumption(meter, DateRange::between(from, to))?;
            let mut table = TextTable::new(
                ["from", "to", "days", "consumption", "per day", ""]
                    .into_iter()
                    .map(str::to_string),
            );
            for column in 2..=4 {
                table.align(column, Alignment::Right);
            }
            for interval in &intervals {
                table.push_row(vec![
                    interval.start.to_string(),
                    interval.end.to_string(),
                    interval.days.to_string(),
                    format!("{:.2}", interval.consumption),
                    format!("{:.3}", interval.daily_average()),
                    if interval.reset { "reset" } else { "" }.to_string(),
                ]);
            }
            print!("{table}");
        }
        MetersCommand::Series {
            meter,
            yearly,
            prorata,
            chart,
        } => {
            let granularity = if yearly {
                Granularity::Year
            } else {
                Granularity::Month
            };
            let totals = service.consumption_series(meter, granularity, attribution(prorata))?;
            if chart {
                print!("{}", render_period_chart(&totals, BarChartOptions::default()));
            } else {
                for (period, value) in &totals {
                    println!("{period}  {value:.2}");
                }
            }
        }
        MetersCommand::Report {
            year,
            category,
            depth,
            prorata,
            chart,
        } => {
            let grouping = depth.map_or(ReportGrouping::PerMeter, ReportGrouping::CategoryDepth);
            let report =
                service.yearly_comparison(year, category, grouping, attribution(prorata))?;
            print!(
                "{}",
                render_comparison_table(
                    &report.rows,
                    &report.base_label(),
                    &report.current_label()
                )
            );
            if chart {
                println!();
                print!("{}", current_chart(&report.rows));
            }
        }
        MetersCommand::Profile {
            meter,
            year,
            prorata,
            chart,
        } => {
            let rows = service.monthly_profile(meter, year, attribution(prorata))?;
            let base_label = (year - 1).to_string();
            print!(
                "{}",
                render_comparison_table(&rows, &base_label, &year.to_string())
            );
            if chart {
                println!();
                print!("{}", current_chart(&rows));
            }
        }
        MetersCommand::Export { meter, output } => {
            let readings = repo.list_readings(meter, None)?;
            export(config, &readings, &output)?;
        }
    }
    Ok(())
}

/// Numeric keys are ids; anything else is looked up by meter name.
fn resolve_meter(repo: &impl MeterRepository, key: &str) -> Result<i64> {
    if let Ok(id) = key.trim().parse::<i64>() {
        return Ok(id);
    }
    match repo.get_meter_by_name(key)? {
        Some(Meter { id: Some(id), .. }) => Ok(id),
        _ => bail!("no meter named `{}`", key.trim()),
    }
}

fn current_chart(rows: &[ComparisonRow]) -> String {
    let entries: Vec<(String, f64)> = rows
        .iter()
        .map(|row| (row.label.clone(), row.current))
        .collect();
    render_bar_chart(&entries, BarChartOptions::default())
}

fn print_node(node: &CategoryNode, depth: usize) {
    println!(
        "{}{} [{}]",
        "  ".repeat(depth),
        node.category.name,
        node.category.id.unwrap_or_default()
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn print_meters(repo: &impl MeterRepository, meters: &[Meter]) -> Result<()> {
    if meters.is_empty() {
        println!("(no records)");
        return Ok(());
    }
    let mut table = TextTable::new(
        ["id", "name", "category", "unit", "active", "last reading"]
            .into_iter()
            .map(str::to_string),
    );
    table.align(0, Alignment::Right);
    for meter in meters {
        let id = meter.id.unwrap_or_default();
        let last = repo
            .latest_reading(id)?
            .map(|reading| format!("{} {}", reading.date, reading.index_value))
            .unwrap_or_default();
        table.push_row(vec![
            id.to_string(),
            meter.name.clone(),
            repo.category_path(meter.category_id)?.join(" / "),
            meter.unit.clone(),
            if meter.active { "yes" } else { "no" }.to_string(),
            last,
        ]);
    }
    print!("{table}");
    Ok(())
}
