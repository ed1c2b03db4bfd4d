//! Import command orchestrator
//!
//! Reads the input file, runs the reconciliation engine over it and renders
//! the outcome of every record.

use super::OutputFormat;
use anyhow::{Context, Result};
use colored::*;
use log::debug;
use pdprov_core::{
    BatchReport, ConfirmationGate, DirectoryClient, EngineConfig, NullObserver,
    ProcessingOutcome, ReaderMode, ReconciliationEngine, RecordReader, RecordStatus, RowRejected,
    RunContext, RunEvent, RunObserver, TeamOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Import command options
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub path: PathBuf,
    pub mode: ReaderMode,
    pub format: OutputFormat,
}

/// Orchestrator for the import command
pub struct ImportOrchestrator {
    engine: ReconciliationEngine,
    options: ImportOptions,
}

impl ImportOrchestrator {
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        gate: Arc<dyn ConfirmationGate>,
        config: EngineConfig,
        context: RunContext,
        options: ImportOptions,
    ) -> Self {
        debug!("Creating import orchestrator with {config:?} and {options:?}");

        let observer: Arc<dyn RunObserver> = match options.format {
            OutputFormat::Human => Arc::new(ConsoleObserver),
            OutputFormat::Json => Arc::new(NullObserver),
        };
        let engine = ReconciliationEngine::new(client, gate, config, context).with_observer(observer);

        Self { engine, options }
    }

    /// Run the import and print the results
    ///
    /// Records that fail are reported but do not make this fail; a declined
    /// run or an input file that cannot be read does.
    pub async fn run(mut self) -> Result<BatchReport> {
        let path = self.options.path.clone();
        let reader = RecordReader::from_path(&path, self.options.mode)
            .with_context(|| format!("Failed to open input file {}", path.display()))?;

        if self.options.format == OutputFormat::Human {
            eprintln!("{}", format!("Importing {}...", path.display()).cyan().bold());
        }

        let start = Instant::now();
        let mut report = self.engine.run(reader.records()).await?;
        let elapsed = start.elapsed();

        match self.options.format {
            OutputFormat::Human => display_report(&report, elapsed),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        }

        if let Some(error) = report.aborted.take() {
            return Err(anyhow::Error::new(error).context("Import stopped before the end of the input"));
        }
        Ok(report)
    }
}

/// Prints one line per record on stderr as the run goes
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { position, email } => debug!("Record {position}: {email}"),
            RunEvent::Finished(outcome) => eprintln!("{}", outcome_line(outcome)),
            RunEvent::Rejected(row) => eprintln!("{}", rejected_line(row)),
        }
    }
}

/// One-line description of a finished record
pub fn outcome_line(outcome: &ProcessingOutcome) -> String {
    let email = &outcome.record.email;
    match (outcome.status(), &outcome.failure) {
        (RecordStatus::Failed, Some(failure)) => {
            let done = describe_work(outcome);
            if done.is_empty() {
                format!("  {} {email}: {}", "✗".red(), failure.to_string().red())
            } else {
                format!(
                    "  {} {email}: {} (done before failing: {done})",
                    "✗".red(),
                    failure.to_string().red()
                )
            }
        }
        (RecordStatus::SucceededWithSkips, _) => {
            let skipped: Vec<&str> = outcome
                .teams
                .iter()
                .filter_map(|t| match t {
                    TeamOutcome::Skipped { team_name, .. } => Some(team_name.as_str()),
                    _ => None,
                })
                .collect();
            format!(
                "  {} {email}: {}; skipped missing team(s) {}",
                "~".yellow(),
                describe_work(outcome),
                skipped.join(", ").yellow()
            )
        }
        _ => format!("  {} {email}: {}", "✓".green(), describe_work(outcome)),
    }
}

fn rejected_line(row: &RowRejected) -> String {
    match row.line {
        Some(line) => format!("  {} line {line}: {}", "✗".red(), row.error.to_string().red()),
        None => format!("  {} {}", "✗".red(), row.error.to_string().red()),
    }
}

fn describe_work(outcome: &ProcessingOutcome) -> String {
    let mut parts = Vec::new();

    match &outcome.user {
        Some(user) if user.created => parts.push("created user".to_string()),
        Some(_) => parts.push("found user".to_string()),
        None => {}
    }

    let memberships = outcome.memberships_added();
    if memberships > 0 {
        parts.push(format!("joined {memberships} team(s)"));
    }
    let teams_created = outcome.teams_created();
    if teams_created > 0 {
        parts.push(format!("created {teams_created} team(s)"));
    }
    let methods = outcome.contact_methods_created();
    if methods > 0 {
        parts.push(format!("added {methods} contact method(s)"));
    }
    let rules = outcome.notification_rules_created();
    if rules > 0 {
        parts.push(format!("added {rules} notification rule(s)"));
    }

    parts.join(", ")
}

fn display_report(report: &BatchReport, elapsed: Duration) {
    let summary = &report.summary;

    println!();
    println!("{}", "Import Complete".green().bold());
    println!("{}", "===============".green());
    println!();
    println!("  Records:              {}", summary.total().to_string().bold());
    println!("  {} Succeeded:          {}", "✓".green(), summary.succeeded);
    println!(
        "  {} With skipped teams:  {}",
        "~".yellow(),
        summary.succeeded_with_skips
    );
    println!("  {} Failed:             {}", "✗".red(), summary.failed);
    println!("  {} Rejected rows:      {}", "✗".red(), summary.rejected);
    println!();
    println!(
        "  Users created: {}, found: {}",
        summary.users_created, summary.users_found
    );
    println!(
        "  Memberships added: {}, teams created: {}, teams skipped: {}",
        summary.memberships_added, summary.teams_created, summary.teams_skipped
    );
    println!(
        "  Contact methods added: {}, already present: {}, notification rules: {}",
        summary.contact_methods_created,
        summary.contact_methods_present,
        summary.notification_rules_created
    );

    let failures: Vec<&ProcessingOutcome> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Failed records:".red().bold());
        for outcome in failures {
            if let Some(failure) = &outcome.failure {
                println!("  {}: {failure}", outcome.record.email);
            }
        }
    }

    if let Some(error) = &report.aborted {
        println!();
        println!("{} {error}", "Stopped:".red().bold());
    }

    println!();
    println!("Time: {:.2}s", elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdprov_core::engine::{RecordFailure, Step, UserResolution};
    use pdprov_core::error::TransportError;
    use pdprov_core::{ContactChannel, ImportRecord, TeamRole};
    use pdprov_core::ChannelOutcome;

    fn found_user(outcome: &mut ProcessingOutcome) {
        outcome.user = Some(UserResolution {
            user_id: "PU1".to_string(),
            email: outcome.record.email.clone(),
            created: false,
            matches: 1,
        });
    }

    #[test]
    fn test_outcome_line_success() {
        let mut outcome = ProcessingOutcome::new(ImportRecord::new("ada@example.com"));
        found_user(&mut outcome);
        outcome.teams.push(TeamOutcome::Joined {
            index: 0,
            team_name: "Ops".to_string(),
            team_id: "PT1".to_string(),
            role: TeamRole::Responder,
            team_created: true,
        });
        outcome.channels.push(ChannelOutcome::Created {
            channel: ContactChannel::Phone,
            contact_method_id: "PC1".to_string(),
            rule_delays: vec![0, 3],
        });

        let line = outcome_line(&outcome);
        assert!(line.contains("ada@example.com"));
        assert!(line.contains("found user"));
        assert!(line.contains("joined 1 team(s)"));
        assert!(line.contains("created 1 team(s)"));
        assert!(line.contains("added 2 notification rule(s)"));
    }

    #[test]
    fn test_outcome_line_lists_skipped_teams() {
        let mut outcome = ProcessingOutcome::new(ImportRecord::new("ada@example.com"));
        found_user(&mut outcome);
        outcome.teams.push(TeamOutcome::Skipped {
            index: 1,
            team_name: "Infra".to_string(),
        });

        let line = outcome_line(&outcome);
        assert!(line.contains("skipped missing team(s)"));
        assert!(line.contains("Infra"));
    }

    #[test]
    fn test_outcome_line_failure_mentions_partial_work() {
        let mut outcome = ProcessingOutcome::new(ImportRecord::new("ada@example.com"));
        found_user(&mut outcome);
        outcome.failure = Some(RecordFailure::new(
            Step::FindTeam,
            TransportError::timeout("find team", "timed out"),
        ));

        let line = outcome_line(&outcome);
        assert!(line.contains("find team failed"));
        assert!(line.contains("done before failing: found user"));
    }
}
