//! Builders and fixtures for import records

mod records;

pub use records::{ImportRecordBuilder, fixtures};
