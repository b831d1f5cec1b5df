//! CSV and text export entry points.

use super::{records_table, ExportError, ExportResult, Tabular};
use log::{error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Output format selected by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Text,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "text" | "txt" => Ok(Self::Text),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// CSV writer options.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// Field delimiter. Spreadsheets in comma-decimal locales expect `;`.
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b';' }
    }
}

/// Writes records as CSV (header row first) to `writer`.
pub fn write_csv<T: Tabular, W: Write>(
    records: &[T],
    options: CsvOptions,
    writer: W,
) -> ExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_writer(writer);
    for record in records {
        csv_writer.serialize(record.csv_row())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes records in `format` to `writer`.
pub fn export_records<T: Tabular, W: Write>(
    records: &[T],
    format: ExportFormat,
    options: CsvOptions,
    mut writer: W,
) -> ExportResult<()> {
    match format {
        ExportFormat::Csv => write_csv(records, options, writer),
        ExportFormat::Text => {
            write!(writer, "{}", records_table(records))?;
            writer.flush()?;
            Ok(())
        }
    }
}

/// Writes records in `format` to a file, replacing it when it exists.
///
/// # Side effects
/// - Creates missing parent directories.
/// - Emits `export_write` logging events with row count and status.
pub fn export_to_path<T: Tabular>(
    records: &[T],
    format: ExportFormat,
    options: CsvOptions,
    path: impl AsRef<Path>,
) -> ExportResult<()> {
    let path = path.as_ref();
    let result = (|| -> ExportResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        export_records(records, format, options, BufWriter::new(file))
    })();

    match &result {
        Ok(()) => info!(
            "event=export_write module=export status=ok format={:?} rows={}",
            format,
            records.len()
        ),
        Err(err) => error!(
            "event=export_write module=export status=error format={:?} rows={} error={}",
            format,
            records.len(),
            err
        ),
    }
    result
}
