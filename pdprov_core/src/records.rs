//! Import records and the CSV reader that produces them
//!
//! Rows come in two layouts. Positional files have no header and carry the
//! columns `name, email, base_role, title, country_code, phone_number, teams,
//! team_role_overrides` in that order; trailing columns may be left out.
//! Header-keyed files name their columns and may order them freely.

use crate::error::{Error, IoError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Separator for multi-valued cells (teams, role overrides)
pub const LIST_SEPARATOR: char = ';';

/// One row of input: a user plus the teams and channels they should get
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub name: Option<String>,
    /// Reconciliation key
    pub email: String,
    pub base_role: Option<String>,
    pub title: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    /// Team names in input order; blank entries keep their slot
    pub teams: Vec<String>,
    /// Positional role overrides, aligned with `teams`; may be shorter
    pub team_role_overrides: Vec<String>,
}

impl ImportRecord {
    /// Create a record with only the reconciliation key set
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    /// Phone number and country code, when both are present
    pub fn phone(&self) -> Option<(&str, &str)> {
        match (self.country_code.as_deref(), self.phone_number.as_deref()) {
            (Some(country), Some(number)) => Some((country, number)),
            _ => None,
        }
    }
}

/// Row the reader could not turn into a record
#[derive(Debug, Serialize)]
pub struct RowRejected {
    /// 1-based line in the source, when known
    pub line: Option<u64>,
    /// Raw cells as read
    pub cells: Vec<String>,
    #[serde(serialize_with = "crate::error::serialize_error")]
    pub error: Error,
}

impl RowRejected {
    pub fn new(line: Option<u64>, cells: Vec<String>, error: impl Into<Error>) -> Self {
        Self {
            line,
            cells,
            error: error.into(),
        }
    }
}

/// Column layout of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderMode {
    /// No header row; fixed column order
    #[default]
    Positional,
    /// First row names the columns
    Headers,
}

impl ReaderMode {
    pub fn from_has_headers(has_headers: bool) -> Self {
        if has_headers {
            Self::Headers
        } else {
            Self::Positional
        }
    }
}

/// Where each field lives in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    name: Option<usize>,
    email: usize,
    base_role: Option<usize>,
    title: Option<usize>,
    country_code: Option<usize>,
    phone_number: Option<usize>,
    teams: Option<usize>,
    team_role_overrides: Option<usize>,
}

const POSITIONAL_WIDTH: usize = 8;

impl ColumnLayout {
    fn positional() -> Self {
        Self {
            name: Some(0),
            email: 1,
            base_role: Some(2),
            title: Some(3),
            country_code: Some(4),
            phone_number: Some(5),
            teams: Some(6),
            team_role_overrides: Some(7),
        }
    }

    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| {
            headers.iter().position(|header| {
                let header = header.trim().to_lowercase();
                aliases.iter().any(|alias| header == *alias)
            })
        };

        let email = find(&["email"]).ok_or_else(|| IoError::missing_column("email"))?;

        Ok(Self {
            name: find(&["name"]),
            email,
            base_role: find(&["base_role", "role"]),
            title: find(&["title", "job_title"]),
            country_code: find(&["country_code"]),
            phone_number: find(&["phone_number", "phone"]),
            teams: find(&["teams", "team"]),
            team_role_overrides: find(&["team_role_overrides", "team_roles"]),
        })
    }
}

/// CSV reader producing [`ImportRecord`]s
pub struct RecordReader<R> {
    inner: csv::Reader<R>,
    layout: ColumnLayout,
}

impl RecordReader<File> {
    /// Open a CSV file
    ///
    /// A missing or unreadable file is an I/O error carrying the path.
    pub fn from_path(path: &Path, mode: ReaderMode) -> Result<Self> {
        let file = File::open(path).map_err(|e| IoError::from_std(e).with_path(path))?;
        Self::from_reader(file, mode).map_err(|err| match err {
            Error::Io(io) => Error::Io(io.with_path(path)),
            other => other,
        })
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any reader; in header mode the header row is read immediately
    pub fn from_reader(reader: R, mode: ReaderMode) -> Result<Self> {
        let mut inner = csv::ReaderBuilder::new()
            .has_headers(mode == ReaderMode::Headers)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let layout = match mode {
            ReaderMode::Positional => ColumnLayout::positional(),
            ReaderMode::Headers => ColumnLayout::from_headers(inner.headers()?)?,
        };

        Ok(Self { inner, layout })
    }

    /// Iterate over rows in source order
    pub fn records(self) -> Records<R> {
        Records {
            rows: self.inner.into_records(),
            layout: self.layout,
        }
    }
}

/// Iterator over the rows of a [`RecordReader`]
pub struct Records<R> {
    rows: csv::StringRecordsIntoIter<R>,
    layout: ColumnLayout,
}

impl<R: Read> Iterator for Records<R> {
    type Item = std::result::Result<ImportRecord, RowRejected>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(match row {
            Ok(row) => parse_row(&row, &self.layout),
            Err(err) => {
                let line = err.position().map(|p| p.line());
                Err(RowRejected::new(line, Vec::new(), err))
            }
        })
    }
}

fn parse_row(
    row: &csv::StringRecord,
    layout: &ColumnLayout,
) -> std::result::Result<ImportRecord, RowRejected> {
    let line = row.position().map(|p| p.line());
    let cells: Vec<String> = row.iter().map(str::to_string).collect();
    let cell = |index: Option<usize>| {
        index
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    if *layout == ColumnLayout::positional() && row.len() > POSITIONAL_WIDTH {
        log::warn!(
            "Row at line {} has {} columns, expected at most {POSITIONAL_WIDTH}; extra columns ignored",
            line.unwrap_or_default(),
            row.len()
        );
    }

    let Some(email) = cell(Some(layout.email)) else {
        return Err(RowRejected::new(
            line,
            cells,
            ValidationError::missing_field("email"),
        ));
    };
    if !is_plausible_email(&email) {
        return Err(RowRejected::new(
            line,
            cells,
            ValidationError::invalid_field("email", "must look like name@domain"),
        ));
    }

    Ok(ImportRecord {
        name: cell(layout.name),
        email,
        base_role: cell(layout.base_role),
        title: cell(layout.title),
        country_code: cell(layout.country_code),
        phone_number: cell(layout.phone_number),
        teams: split_list(cell(layout.teams).as_deref()),
        team_role_overrides: split_list(cell(layout.team_role_overrides).as_deref()),
    })
}

/// Split a `;`-separated cell, keeping empty slots
pub fn split_list(cell: Option<&str>) -> Vec<String> {
    match cell {
        Some(value) if !value.trim().is_empty() => value
            .split(LIST_SEPARATOR)
            .map(|item| item.trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
