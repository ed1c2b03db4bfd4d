//! Errors reported by the directory service itself

use thiserror::Error;

/// The directory service answered, but not with success
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Lookup target does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// Create rejected because the entity already exists
    #[error("Conflict during {operation}: {message}")]
    Conflict { operation: String, message: String },

    /// Credential rejected or lacks permission
    #[error("Unauthorized during {operation} (HTTP {status})")]
    Unauthorized { operation: String, status: u16 },

    /// Any other non-success answer
    #[error("Directory API error during {operation}: {status} - {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },
}

impl DirectoryError {
    /// Create a not found error
    pub fn not_found(entity: &str, key: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Create a conflict error
    pub fn conflict(operation: &str, message: &str) -> Self {
        Self::Conflict {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(operation: &str, status: u16) -> Self {
        Self::Unauthorized {
            operation: operation.to_string(),
            status,
        }
    }

    /// Create a generic API error with status and message
    pub fn api(operation: &str, status: u16, message: &str) -> Self {
        Self::Api {
            operation: operation.to_string(),
            status,
            message: message.to_string(),
        }
    }

    /// HTTP status behind this error, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => None,
            Self::Conflict { .. } => None,
            Self::Unauthorized { status, .. } | Self::Api { status, .. } => Some(*status),
        }
    }
}
