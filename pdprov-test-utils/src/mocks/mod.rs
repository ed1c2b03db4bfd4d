//! Mock implementations for testing

mod directory;
mod observer;

pub use directory::{MockCall, MockDirectoryClient, MockFailure, MockMembership, MockOperation};
pub use observer::RecordingObserver;
