//! Error types for the provisioning core library
//!
//! Errors are grouped into the categories an operator can act on, and every
//! error knows whether it ends the whole run or only the record it was raised
//! for (see [`Error::scope`]).

use thiserror::Error;

pub mod directory;
pub mod io;
pub mod transport;
pub mod validation;

pub use self::directory::DirectoryError;
pub use self::io::{IoError, IoErrorKind};
pub use self::transport::{TransportError, TransportErrorKind};
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the provisioning core library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing field in an input record
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The directory service answered, but not with success
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The directory service could not be reached or its answer not read
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local file errors (input records, activation files)
    #[error(transparent)]
    Io(#[from] IoError),

    /// The operator answered "no" at a confirmation gate
    #[error("Declined by operator: {prompt}")]
    PolicyDeclined { prompt: String, stage: DeclineStage },

    /// Missing credential, input source or invalid setting
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Where a confirmation gate was declined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineStage {
    /// The confirmation asked once before the batch starts
    BeforeRun,
    /// A confirmation asked while a single record was being processed
    DuringRecord,
}

/// Flat classification of [`Error`], one entry per taxonomy member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Api,
    Transport,
    Io,
    PolicyDeclined,
    Configuration,
}

/// How far an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Caught at the record boundary; the batch continues with the next record
    Record,
    /// Aborts the run before (or instead of) processing further records
    Run,
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a declined-confirmation error
    pub fn policy_declined(prompt: impl Into<String>, stage: DeclineStage) -> Self {
        Self::PolicyDeclined {
            prompt: prompt.into(),
            stage,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Directory(DirectoryError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Directory(DirectoryError::Conflict { .. }) => ErrorKind::Conflict,
            Self::Directory(DirectoryError::Unauthorized { .. }) => ErrorKind::Unauthorized,
            Self::Directory(DirectoryError::Api { .. }) => ErrorKind::Api,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Io(_) => ErrorKind::Io,
            Self::PolicyDeclined { .. } => ErrorKind::PolicyDeclined,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Decide whether this error is record-scoped or run-fatal
    ///
    /// | kind                     | scope  |
    /// |--------------------------|--------|
    /// | configuration            | run    |
    /// | declined before the run  | run    |
    /// | declined inside a record | record |
    /// | local I/O                | run    |
    /// | everything else          | record |
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Configuration { .. } | Self::Io(_) => ErrorScope::Run,
            Self::PolicyDeclined {
                stage: DeclineStage::BeforeRun,
                ..
            } => ErrorScope::Run,
            Self::PolicyDeclined {
                stage: DeclineStage::DuringRecord,
                ..
            } => ErrorScope::Record,
            Self::Validation(_) | Self::Directory(_) | Self::Transport(_) => ErrorScope::Record,
        }
    }

    /// Whether this error should abort the run
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }
}

/// Serialize an error for reports as `{kind, scope, message}`
pub fn serialize_error<S>(error: &Error, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeStruct;

    let mut state = serializer.serialize_struct("Error", 3)?;
    state.serialize_field("kind", &error.kind())?;
    state.serialize_field("scope", &error.scope())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io_err) => Self::Io(IoError::from_std(io_err)),
            _ => Self::Validation(ValidationError::malformed_row(line, &message)),
        }
    }
}
