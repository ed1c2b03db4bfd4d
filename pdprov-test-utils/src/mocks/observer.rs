//! Observer that keeps a transcript of a run

use pdprov_core::progress::{RunEvent, RunObserver};
use std::sync::Mutex;

/// Records a one-line description of every event
#[derive(Default)]
pub struct RecordingObserver {
    lines: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl RunObserver for RecordingObserver {
    fn report(&self, event: RunEvent<'_>) {
        let line = match event {
            RunEvent::Started { position, email } => format!("started {position} {email}"),
            RunEvent::Finished(outcome) => {
                format!("finished {} {:?}", outcome.record.email, outcome.status())
            }
            RunEvent::Rejected(rejected) => {
                format!("rejected line {}", rejected.line.unwrap_or_default())
            }
        };
        self.lines.lock().unwrap().push(line);
    }
}
