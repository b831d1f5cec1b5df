//! Text and CSV export of register records.
//!
//! # Responsibility
//! - Render record lists as fixed-width text tables for terminal output.
//! - Serialize record lists to CSV for spreadsheets.
//!
//! # Invariants
//! - Both formats use the same row order as the caller's list.
//! - Export never mutates storage.

mod chart;
mod csv_export;
mod table;

pub use chart::{render_bar_chart, BarChartOptions};
pub use csv_export::{export_records, export_to_path, write_csv, CsvOptions, ExportFormat};
pub use table::{Alignment, TextTable};

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ExportResult<T> = Result<T, ExportError>;

/// Record that can be rendered as a table row and as a CSV row.
pub trait Tabular {
    /// Table column headers.
    const HEADERS: &'static [&'static str];
    /// Column indexes rendered right-aligned.
    const NUMERIC_COLUMNS: &'static [usize] = &[];
    /// Flattened projection written to CSV.
    type CsvRow: serde::Serialize;

    fn cells(&self) -> Vec<String>;
    fn csv_row(&self) -> Self::CsvRow;
}

/// Builds a text table from a list of records.
pub fn records_table<T: Tabular>(records: &[T]) -> TextTable {
    let mut table = TextTable::new(T::HEADERS.iter().map(|header| header.to_string()));
    for index in T::NUMERIC_COLUMNS {
        table.align(*index, Alignment::Right);
    }
    for record in records {
        table.push_row(record.cells());
    }
    table
}

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// Requested output format name is unknown.
    UnknownFormat(String),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "export i/o failed: {err}"),
            Self::Csv(err) => write!(f, "csv export failed: {err}"),
            Self::UnknownFormat(value) => {
                write!(f, "unknown export format `{value}`; expected csv|text")
            }
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::UnknownFormat(_) => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ExportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}
