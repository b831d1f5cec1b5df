//! Shared argument parsers and output helpers.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use gestion_core::db::{open_store, Connection, Store};
use gestion_core::export::{export_to_path, records_table, CsvOptions, ExportFormat};
use gestion_core::model::money::{parse_cents, Cents};
use gestion_core::{AppConfig, Tabular};
use std::path::PathBuf;

/// `--format` / `--output` options of every `export` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// csv | text
    #[arg(long, default_value = "csv")]
    pub format: ExportFormat,

    /// Target file; bare names go to the export directory
    #[arg(long, short)]
    pub output: PathBuf,

    /// CSV field delimiter
    #[arg(long, default_value_t = ';')]
    pub delimiter: char,
}

pub fn open(config: &AppConfig, store: Store) -> Result<Connection> {
    open_store(&config.data_dir, store)
        .with_context(|| format!("failed to open the {} store", store.as_str()))
}

pub fn print_records<T: Tabular>(records: &[T]) {
    if records.is_empty() {
        println!("(no records)");
        return;
    }
    print!("{}", records_table(records));
}

pub fn export<T: Tabular>(config: &AppConfig, records: &[T], args: &ExportArgs) -> Result<()> {
    if !args.delimiter.is_ascii() {
        bail!("delimiter `{}` must be a single ASCII character", args.delimiter);
    }
    let path = config.export_path(&args.output);
    let options = CsvOptions {
        delimiter: args.delimiter as u8,
    };
    export_to_path(records, args.format, options, &path)
        .with_context(|| format!("failed to export to `{}`", path.display()))?;
    println!("{} record(s) written to {}", records.len(), path.display());
    Ok(())
}

pub fn parse_money(text: &str) -> Result<Cents, String> {
    parse_cents("amount", text).map_err(|err| err.to_string())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
