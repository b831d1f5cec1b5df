//! Document library (Bibliothèque) model and file naming convention.
//!
//! # Responsibility
//! - Define library records indexed by year/category/project.
//! - Build and parse `site-nomenclature-issuer-subject-version[.ext]` names.
//!
//! # Invariants
//! - Name segments never contain `-` or whitespace once sanitized.
//! - `site`, `nomenclature` and `issuer` are uppercase; `subject` keeps case.
//! - Versions render as `V` followed by at least two digits, up to
//!   [`MAX_VERSION`].

use super::{require_non_blank, RecordId, ValidationError};
use crate::export::Tabular;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Vv](\d{1,4})$").expect("valid version regex"));
static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,10}$").expect("valid extension regex"));

const SEGMENT_COUNT: usize = 5;
/// Highest version `parse_version` reads back (four digits).
pub const MAX_VERSION: u32 = 9999;

/// Naming convention violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// A segment is empty after sanitizing.
    EmptySegment(&'static str),
    /// File name does not split into the five expected segments.
    SegmentCount { name: String, found: usize },
    InvalidVersion(String),
    InvalidExtension(String),
}

impl Display for NamingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySegment(segment) => write!(f, "name segment `{segment}` is empty"),
            Self::SegmentCount { name, found } => write!(
                f,
                "`{name}` has {found} segments; expected site-nomenclature-issuer-subject-version"
            ),
            Self::InvalidVersion(value) => {
                write!(f, "`{value}` is not a version; expected V01, V02, ...")
            }
            Self::InvalidExtension(value) => write!(f, "`{value}` is not a valid file extension"),
        }
    }
}

impl Error for NamingError {}

/// Parsed or to-be-built document file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentName {
    pub site: String,
    pub nomenclature: String,
    pub issuer: String,
    pub subject: String,
    pub version: u32,
    pub extension: Option<String>,
}

impl DocumentName {
    /// Renders the canonical file name, sanitizing every segment.
    pub fn build(&self) -> Result<String, NamingError> {
        if self.version > MAX_VERSION {
            return Err(NamingError::InvalidVersion(format_version(self.version)));
        }
        let site = sanitize_segment("site", &self.site, true)?;
        let nomenclature = sanitize_segment("nomenclature", &self.nomenclature, true)?;
        let issuer = sanitize_segment("issuer", &self.issuer, true)?;
        let subject = sanitize_segment("subject", &self.subject, false)?;
        let mut name = format!(
            "{site}-{nomenclature}-{issuer}-{subject}-{}",
            format_version(self.version)
        );
        if let Some(extension) = self.extension.as_deref() {
            name.push('.');
            name.push_str(&normalize_extension(extension)?);
        }
        Ok(name)
    }

    /// Splits a file name back into its segments.
    pub fn parse(file_name: &str) -> Result<Self, NamingError> {
        let file_name = file_name.trim();
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('-') => (stem, Some(normalize_extension(ext)?)),
            _ => (file_name, None),
        };

        let segments: Vec<&str> = stem.split('-').collect();
        if segments.len() != SEGMENT_COUNT {
            return Err(NamingError::SegmentCount {
                name: file_name.to_string(),
                found: segments.len(),
            });
        }

        let names = ["site", "nomenclature", "issuer", "subject"];
        for (segment, field) in segments.iter().zip(names) {
            if segment.trim().is_empty() {
                return Err(NamingError::EmptySegment(field));
            }
        }

        Ok(Self {
            site: segments[0].to_string(),
            nomenclature: segments[1].to_string(),
            issuer: segments[2].to_string(),
            subject: segments[3].to_string(),
            version: parse_version(segments[4])?,
            extension,
        })
    }
}

/// Renders a version number as `V01`.
pub fn format_version(version: u32) -> String {
    format!("V{version:02}")
}

/// Parses `V01` / `v7` into a number.
pub fn parse_version(text: &str) -> Result<u32, NamingError> {
    VERSION_RE
        .captures(text.trim())
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| NamingError::InvalidVersion(text.to_string()))
}

fn sanitize_segment(
    field: &'static str,
    value: &str,
    uppercase: bool,
) -> Result<String, NamingError> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), "_");
    let cleaned = collapsed.replace(['-', '/', '\\', '.'], "_");
    let cleaned = cleaned.trim_matches('_').to_string();
    if cleaned.is_empty() {
        return Err(NamingError::EmptySegment(field));
    }
    Ok(if uppercase {
        cleaned.to_uppercase()
    } else {
        cleaned
    })
}

fn normalize_extension(value: &str) -> Result<String, NamingError> {
    let trimmed = value.trim().trim_start_matches('.');
    if !EXTENSION_RE.is_match(trimmed) {
        return Err(NamingError::InvalidExtension(value.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Library record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<RecordId>,
    pub year: i32,
    pub category: String,
    pub project: String,
    pub name: DocumentName,
    pub notes: String,
}

impl Document {
    pub fn new(year: i32, category: impl Into<String>, name: DocumentName) -> Self {
        Self {
            id: None,
            year,
            category: category.into(),
            project: String::new(),
            name,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("category", &self.category)?;
        if !(1900..=2999).contains(&self.year) {
            return Err(ValidationError::new(
                "year",
                format!("{} is outside 1900..=2999", self.year),
            ));
        }
        self.file_name()
            .map_err(|err| ValidationError::new("name", err.to_string()))?;
        Ok(())
    }

    pub fn file_name(&self) -> Result<String, NamingError> {
        self.name.build()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentExportRow {
    pub id: Option<RecordId>,
    pub year: i32,
    pub category: String,
    pub project: String,
    pub file_name: String,
    pub site: String,
    pub nomenclature: String,
    pub issuer: String,
    pub subject: String,
    pub version: String,
    pub notes: String,
}

impl Tabular for Document {
    const HEADERS: &'static [&'static str] =
        &["id", "year", "category", "project", "file name"];
    const NUMERIC_COLUMNS: &'static [usize] = &[0, 1];
    type CsvRow = DocumentExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.year.to_string(),
            self.category.clone(),
            self.project.clone(),
            self.file_name().unwrap_or_default(),
        ]
    }

    fn csv_row(&self) -> DocumentExportRow {
        DocumentExportRow {
            id: self.id,
            year: self.year,
            category: self.category.clone(),
            project: self.project.clone(),
            file_name: self.file_name().unwrap_or_default(),
            site: self.name.site.clone(),
            nomenclature: self.name.nomenclature.clone(),
            issuer: self.name.issuer.clone(),
            subject: self.name.subject.clone(),
            version: format_version(self.name.version),
            notes: self.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format_version, parse_version, DocumentName, NamingError, MAX_VERSION};

    fn name() -> DocumentName {
        DocumentName {
            site: "lyon nord".to_string(),
            nomenclature: "pv".to_string(),
            issuer: "bureau-veritas".to_string(),
            subject: "Controle electrique".to_string(),
            version: 3,
            extension: Some(".PDF".to_string()),
        }
    }

    #[test]
    fn build_sanitizes_segments() {
        assert_eq!(
            name().build().unwrap(),
            "LYON_NORD-PV-BUREAU_VERITAS-Controle_electrique-V03.pdf"
        );
    }

    #[test]
    fn parse_reads_back_built_name() {
        let parsed = DocumentName::parse("LYON_NORD-PV-BUREAU_VERITAS-Controle-v12.pdf").unwrap();
        assert_eq!(parsed.site, "LYON_NORD");
        assert_eq!(parsed.subject, "Controle");
        assert_eq!(parsed.version, 12);
        assert_eq!(parsed.extension.as_deref(), Some("pdf"));
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        let err = DocumentName::parse("A-B-C-V01").unwrap_err();
        assert!(matches!(err, NamingError::SegmentCount { found: 4, .. }));
    }

    #[test]
    fn empty_segment_is_reported() {
        let mut bad = name();
        bad.issuer = " - ".to_string();
        assert_eq!(bad.build().unwrap_err(), NamingError::EmptySegment("issuer"));
    }

    #[test]
    fn version_past_four_digits_cannot_be_built() {
        let mut last = name();
        last.version = MAX_VERSION;
        assert!(last.build().unwrap().contains("-V9999"));

        last.version = MAX_VERSION + 1;
        assert_eq!(
            last.build().unwrap_err(),
            NamingError::InvalidVersion("V10000".to_string())
        );
    }

    #[test]
    fn version_format_round_trip() {
        assert_eq!(format_version(7), "V07");
        assert_eq!(format_version(123), "V123");
        assert_eq!(parse_version("v07").unwrap(), 7);
        assert!(parse_version("07").is_err());
    }
}
