//! Transport related error types

use thiserror::Error;

/// The directory service could not be reached, or its answer could not be read
#[derive(Error, Debug)]
#[error("{} during {operation}: {message}", kind_label(.kind))]
pub struct TransportError {
    /// What went wrong on the wire
    pub kind: TransportErrorKind,
    /// Directory operation that was in flight
    pub operation: String,
    /// Human readable detail
    pub message: String,
    /// Underlying client error (if any)
    #[source]
    pub source: Option<reqwest::Error>,
}

/// Kind of transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, TLS failure
    Connect,
    /// Request timeout elapsed
    Timeout,
    /// Response body was not the expected JSON
    Decode,
    /// Anything else
    Other,
}

impl TransportError {
    fn new(kind: TransportErrorKind, operation: &str, message: &str) -> Self {
        Self {
            kind,
            operation: operation.to_string(),
            message: message.to_string(),
            source: None,
        }
    }

    /// Create a connection error
    pub fn connect(operation: &str, message: &str) -> Self {
        Self::new(TransportErrorKind::Connect, operation, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, message: &str) -> Self {
        Self::new(TransportErrorKind::Timeout, operation, message)
    }

    /// Create a body decode error
    pub fn decode(operation: &str, message: &str) -> Self {
        Self::new(TransportErrorKind::Decode, operation, message)
    }

    /// Create a generic transport error
    pub fn other(operation: &str, message: &str) -> Self {
        Self::new(TransportErrorKind::Other, operation, message)
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(operation: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_decode() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Other
        };

        Self {
            kind,
            operation: operation.to_string(),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

fn kind_label(kind: &TransportErrorKind) -> &'static str {
    match kind {
        TransportErrorKind::Connect => "Connection failed",
        TransportErrorKind::Timeout => "Request timed out",
        TransportErrorKind::Decode => "Unreadable response",
        TransportErrorKind::Other => "Transport error",
    }
}
