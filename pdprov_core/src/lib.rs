//! Directory Provisioning Core Library
//!
//! Bulk onboarding of users into an incident-management directory: the
//! reconciliation engine, team role resolution, the directory client
//! contract with its REST adapter, CSV record reading and the webhook
//! subscription inventory.

pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod gate;
pub mod inventory;
pub mod progress;
pub mod records;
pub mod roles;
pub mod secret;

// Re-export main types
pub use context::RunContext;
pub use directory::{
    ContactChannel, ContactMethod, DirectoryClient, DirectoryUser, NotificationRule,
    RestClientConfig, RestDirectoryClient, SubscriptionClient, Team, WebhookSubscription,
};
pub use engine::{
    BatchReport, ChannelOutcome, EngineConfig, ProcessingOutcome, ReconciliationEngine,
    RecordStatus, Step, Summary, TeamOutcome,
};
pub use error::{Error, ErrorKind, ErrorScope, Result};
pub use gate::{AutoConfirm, ConfirmationGate, PromptGate};
pub use progress::{NullObserver, RunEvent, RunObserver};
pub use records::{ImportRecord, ReaderMode, RecordReader, RowRejected};
pub use roles::TeamRole;
pub use secret::SecretToken;
