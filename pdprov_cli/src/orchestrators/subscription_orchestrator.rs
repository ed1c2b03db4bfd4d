//! Webhook subscription commands
//!
//! Exports inactive subscriptions to an activation file and re-activates the
//! subscriptions listed in one.

use super::OutputFormat;
use anyhow::{Context, Result};
use colored::*;
use pdprov_core::inventory::{self, ActivationReport};
use pdprov_core::{ConfirmationGate, RunContext, SubscriptionClient, WebhookSubscription};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// What `subscriptions export` did
#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub output: String,
    pub inactive: Vec<WebhookSubscription>,
    /// Present when activation was requested and confirmed
    pub activation: Option<ActivationReport>,
}

/// Orchestrator for the subscriptions commands
pub struct SubscriptionOrchestrator {
    client: Arc<dyn SubscriptionClient>,
    context: RunContext,
    format: OutputFormat,
}

impl SubscriptionOrchestrator {
    pub fn new(client: Arc<dyn SubscriptionClient>, context: RunContext, format: OutputFormat) -> Self {
        Self {
            client,
            context,
            format,
        }
    }

    /// Write the inactive subscriptions to `output`, then optionally activate them
    pub async fn export(
        &self,
        output: &Path,
        activate: bool,
        gate: &dyn ConfirmationGate,
    ) -> Result<ExportResult> {
        let inactive = inventory::find_inactive(self.client.as_ref())
            .await
            .context("Failed to list webhook subscriptions")?;
        inventory::write_activation_path(output, &inactive)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        if self.format == OutputFormat::Human {
            if inactive.is_empty() {
                println!("{}", "No inactive webhook subscriptions".green());
            } else {
                println!(
                    "Found {} inactive webhook subscription(s):",
                    inactive.len().to_string().bold()
                );
                for subscription in &inactive {
                    println!(
                        "  {} {}",
                        subscription.id.cyan(),
                        subscription.description.as_deref().unwrap_or("")
                    );
                }
            }
            println!("Activation file written to: {}", output.display());
        }

        let mut activation = None;
        if activate && !inactive.is_empty() {
            let prompt = format!(
                "Activate {} webhook subscription(s) in {}?",
                inactive.len(),
                self.context.account_label()
            );
            if gate.confirm(&prompt) {
                let ids: Vec<String> = inactive.iter().map(|s| s.id.clone()).collect();
                let report = inventory::activate_all(self.client.as_ref(), &ids).await;
                if self.format == OutputFormat::Human {
                    display_activation(&report);
                }
                activation = Some(report);
            } else if self.format == OutputFormat::Human {
                println!("Activation skipped.");
            }
        }

        let result = ExportResult {
            output: output.display().to_string(),
            inactive,
            activation,
        };
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Ok(result)
    }

    /// Activate every subscription listed in `input`
    pub async fn activate(&self, input: &Path) -> Result<ActivationReport> {
        let ids = inventory::read_activation_path(input)
            .with_context(|| format!("Failed to read activation file {}", input.display()))?;
        log::info!("Activating {} webhook subscription(s) from {}", ids.len(), input.display());

        let report = inventory::activate_all(self.client.as_ref(), &ids).await;
        match self.format {
            OutputFormat::Human => display_activation(&report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        }
        Ok(report)
    }
}

fn display_activation(report: &ActivationReport) {
    println!();
    println!("{}", "Activation Complete".green().bold());
    println!("  {} Activated: {}", "✓".green(), report.activated.len());
    println!("  {} Failed:    {}", "✗".red(), report.failed.len());

    for failure in &report.failed {
        println!("    {}: {}", failure.id, failure.error.to_string().red());
    }
}
