//! Webhook subscription inventory
//!
//! Exports inactive subscriptions to an activation file
//! (`subscription_id,description`), and re-enables the subscriptions listed
//! in such a file.

use crate::directory::{SubscriptionClient, WebhookSubscription};
use crate::error::{Error, IoError, Result, serialize_error};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Column holding the subscription id in an activation file
pub const SUBSCRIPTION_ID_COLUMN: &str = "subscription_id";
/// Default activation file name
pub const DEFAULT_ACTIVATION_FILE: &str = "inactive_subscriptions.csv";

/// Subscriptions that are currently disabled
pub async fn find_inactive(client: &dyn SubscriptionClient) -> Result<Vec<WebhookSubscription>> {
    let all = client.list_webhook_subscriptions().await?;
    let total = all.len();
    let inactive: Vec<WebhookSubscription> = all.into_iter().filter(|s| !s.active).collect();
    log::info!("{} of {total} webhook subscriptions are inactive", inactive.len());
    Ok(inactive)
}

/// Write an activation file
pub fn write_activation_file<W: Write>(writer: W, subscriptions: &[WebhookSubscription]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([SUBSCRIPTION_ID_COLUMN, "description"])?;
    for subscription in subscriptions {
        csv.write_record([
            subscription.id.as_str(),
            subscription.description.as_deref().unwrap_or_default(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write an activation file at `path`, replacing it if present
pub fn write_activation_path(path: &Path, subscriptions: &[WebhookSubscription]) -> Result<()> {
    let file = File::create(path).map_err(|e| IoError::from_std(e).with_path(path))?;
    write_activation_file(file, subscriptions).map_err(|err| attach_path(err, path))
}

/// Subscription ids listed in an activation file, in file order
pub fn read_activation_file<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let column = csv
        .headers()?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(SUBSCRIPTION_ID_COLUMN))
        .ok_or_else(|| IoError::missing_column(SUBSCRIPTION_ID_COLUMN))?;

    let mut ids = Vec::new();
    for row in csv.records() {
        let row = row?;
        match row.get(column).map(str::trim) {
            Some(id) if !id.is_empty() => ids.push(id.to_string()),
            _ => log::warn!(
                "Skipping activation row at line {} without a subscription id",
                row.position().map(|p| p.line()).unwrap_or_default()
            ),
        }
    }
    Ok(ids)
}

/// Read the activation file at `path`
pub fn read_activation_path(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| IoError::from_std(e).with_path(path))?;
    read_activation_file(file).map_err(|err| attach_path(err, path))
}

fn attach_path(err: Error, path: &Path) -> Error {
    match err {
        Error::Io(io) => Error::Io(io.with_path(path)),
        other => other,
    }
}

/// Subscription that could not be activated
#[derive(Debug, Serialize)]
pub struct ActivationFailure {
    pub id: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Error,
}

/// Result of activating a list of subscriptions
#[derive(Debug, Default, Serialize)]
pub struct ActivationReport {
    pub activated: Vec<String>,
    pub failed: Vec<ActivationFailure>,
}

/// Activate every listed subscription; one failure does not stop the rest
pub async fn activate_all(client: &dyn SubscriptionClient, ids: &[String]) -> ActivationReport {
    let mut report = ActivationReport::default();

    for id in ids {
        match client.activate_webhook_subscription(id).await {
            Ok(()) => {
                log::info!("Activated webhook subscription {id}");
                report.activated.push(id.clone());
            }
            Err(error) => {
                log::error!("Failed to activate webhook subscription {id}: {error}");
                report.failed.push(ActivationFailure {
                    id: id.clone(),
                    error,
                });
            }
        }
    }

    report
}
