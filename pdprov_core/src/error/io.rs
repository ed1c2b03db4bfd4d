//! Local file error types (record sources, activation files)

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Local file error with the path it concerns
#[derive(Error, Debug)]
#[error("{}", format_io_error(self))]
pub struct IoError {
    /// The kind of I/O error
    pub kind: IoErrorKind,
    /// Path associated with the error (if any)
    pub path: Option<PathBuf>,
    /// Underlying I/O error (if any)
    #[source]
    pub source: Option<std::io::Error>,
}

/// Kind of I/O error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoErrorKind {
    /// File not found
    FileNotFound,
    /// Permission denied
    PermissionDenied,
    /// A required CSV column is absent from the header
    MissingColumn(String),
    /// Generic I/O error
    Other,
}

impl IoError {
    /// Create a file not found error
    pub fn file_not_found(path: &Path) -> Self {
        Self {
            kind: IoErrorKind::FileNotFound,
            path: Some(path.to_path_buf()),
            source: None,
        }
    }

    /// Create a missing column error
    pub fn missing_column(column: &str) -> Self {
        Self {
            kind: IoErrorKind::MissingColumn(column.to_string()),
            path: None,
            source: None,
        }
    }

    /// Create an I/O error from a standard I/O error
    pub fn from_std(source: std::io::Error) -> Self {
        let kind = match source.kind() {
            std::io::ErrorKind::NotFound => IoErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => IoErrorKind::PermissionDenied,
            _ => IoErrorKind::Other,
        };

        Self {
            kind,
            path: None,
            source: Some(source),
        }
    }

    /// Attach the path the error concerns
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

fn format_io_error(error: &IoError) -> String {
    let path = error
        .path
        .as_ref()
        .map(|p| format!(": {}", p.display()))
        .unwrap_or_default();

    match &error.kind {
        IoErrorKind::FileNotFound => format!("File not found{path}"),
        IoErrorKind::PermissionDenied => format!("Permission denied{path}"),
        IoErrorKind::MissingColumn(column) => format!("Missing column '{column}'{path}"),
        IoErrorKind::Other => match &error.source {
            Some(source) => format!("I/O error{path}: {source}"),
            None => format!("I/O error{path}"),
        },
    }
}
