//! Validation related error types

use thiserror::Error;

/// Input record validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Field present but unusable
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Base role outside the default team role table
    #[error("Unknown base role '{role}'")]
    UnknownBaseRole { role: String },

    /// Team role override that is not manager, responder or observer
    #[error("Unknown team role '{role}'; expected manager, responder or observer")]
    UnknownTeamRole { role: String },

    /// Row the reader could not turn into a record
    #[error("Malformed row{}: {message}", line_suffix(.line))]
    MalformedRow { line: Option<u64>, message: String },
}

impl ValidationError {
    /// Create a missing field error
    pub fn missing_field(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an unknown base role error
    pub fn unknown_base_role(role: &str) -> Self {
        Self::UnknownBaseRole {
            role: role.to_string(),
        }
    }

    /// Create an unknown team role error
    pub fn unknown_team_role(role: &str) -> Self {
        Self::UnknownTeamRole {
            role: role.to_string(),
        }
    }

    /// Create a malformed row error
    pub fn malformed_row(line: Option<u64>, message: &str) -> Self {
        Self::MalformedRow {
            line,
            message: message.to_string(),
        }
    }
}

fn line_suffix(line: &Option<u64>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_error() {
        let error = ValidationError::missing_field("email");
        assert!(error.to_string().contains("Missing required field"));
        assert!(error.to_string().contains("email"));
    }

    #[test]
    fn test_invalid_field_error() {
        let error = ValidationError::invalid_field("email", "must contain '@'");
        assert!(error.to_string().contains("email"));
        assert!(error.to_string().contains("must contain '@'"));
    }

    #[test]
    fn test_unknown_roles() {
        assert!(
            ValidationError::unknown_base_role("superuser")
                .to_string()
                .contains("superuser")
        );
        assert!(
            ValidationError::unknown_team_role("boss")
                .to_string()
                .contains("manager, responder or observer")
        );
    }

    #[test]
    fn test_malformed_row_mentions_line() {
        let error = ValidationError::malformed_row(Some(7), "bad quoting");
        assert_eq!(error.to_string(), "Malformed row at line 7: bad quoting");

        let error = ValidationError::malformed_row(None, "bad quoting");
        assert_eq!(error.to_string(), "Malformed row: bad quoting");
    }
}
