//! Test utilities for directory provisioning
//!
//! This crate provides an in-memory directory, record builders and fixtures
//! for testing the reconciliation engine and its callers.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{ImportRecordBuilder, fixtures};
pub use mocks::{
    MockCall, MockDirectoryClient, MockFailure, MockMembership, MockOperation, RecordingObserver,
};
