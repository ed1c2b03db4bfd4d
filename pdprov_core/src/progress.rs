//! Progress reporting for batch runs
//!
//! Lets the engine report each record as it finishes without knowing how the
//! caller displays it.

use crate::engine::ProcessingOutcome;
use crate::records::RowRejected;

/// Event emitted while a batch runs
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// A record is about to be processed
    Started { position: usize, email: &'a str },
    /// A record finished, successfully or not
    Finished(&'a ProcessingOutcome),
    /// A row was rejected by the reader
    Rejected(&'a RowRejected),
}

/// Receives [`RunEvent`]s
pub trait RunObserver: Send + Sync {
    fn report(&self, event: RunEvent<'_>);
}

/// Discards every event
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn report(&self, _event: RunEvent<'_>) {}
}
