//! Record reconciliation
//!
//! For every record the engine finds or creates the user, reconciles team
//! memberships, then provisions SMS and phone notifications. A failure ends
//! only the record it happened in; work already done stays in place and is
//! reported.

pub mod outcome;

pub use outcome::{
    BatchReport, ChannelOutcome, ProcessingOutcome, RecordFailure, RecordStatus, Step, Summary,
    TeamOutcome, UserResolution,
};

use crate::context::RunContext;
use crate::directory::{
    CONTACT_METHOD_LABEL, ContactChannel, DirectoryClient, DirectoryUser, Team,
    normalize_team_name,
};
use crate::error::{DeclineStage, Error, Result, ValidationError};
use crate::gate::ConfirmationGate;
use crate::progress::{NullObserver, RunEvent, RunObserver};
use crate::records::{ImportRecord, RowRejected};
use crate::roles::{self, DEFAULT_BASE_ROLE};
use outcome::AtStep;
use std::collections::HashMap;
use std::sync::Arc;

/// Title given to new users when the record has none
pub const DEFAULT_TITLE: &str = " ";

/// Run-level policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Create teams that do not exist yet; otherwise skip them
    pub create_missing_teams: bool,
    /// Ask the gate once before the first record
    pub confirm_before_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            create_missing_teams: true,
            confirm_before_run: false,
        }
    }
}

/// Reconciles import records against the directory, one at a time
pub struct ReconciliationEngine {
    client: Arc<dyn DirectoryClient>,
    gate: Arc<dyn ConfirmationGate>,
    observer: Arc<dyn RunObserver>,
    config: EngineConfig,
    context: RunContext,
    /// Teams resolved during this run, keyed by normalized name
    team_cache: HashMap<String, Team>,
}

impl ReconciliationEngine {
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        gate: Arc<dyn ConfirmationGate>,
        config: EngineConfig,
        context: RunContext,
    ) -> Self {
        Self {
            client,
            gate,
            observer: Arc::new(NullObserver),
            config,
            context,
            team_cache: HashMap::new(),
        }
    }

    /// Report progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process a batch in source order
    ///
    /// Declining the pre-run confirmation is the only way this returns an
    /// error. A run-fatal error from the row source stops the batch and is
    /// returned in [`BatchReport::aborted`] with everything processed so far.
    pub async fn run<I>(&mut self, rows: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = std::result::Result<ImportRecord, RowRejected>>,
    {
        if self.config.confirm_before_run {
            let prompt = format!(
                "Provision users, teams and notification rules in {}?",
                self.context.account_label()
            );
            if !self.gate.confirm(&prompt) {
                log::warn!("Run declined before processing any record");
                return Err(Error::policy_declined(prompt, DeclineStage::BeforeRun));
            }
        }

        let mut outcomes = Vec::new();
        let mut rejected = Vec::new();
        let mut aborted = None;

        for row in rows {
            match row {
                Ok(record) => {
                    self.observer.report(RunEvent::Started {
                        position: outcomes.len() + rejected.len() + 1,
                        email: &record.email,
                    });
                    let outcome = self.process(record).await;
                    self.observer.report(RunEvent::Finished(&outcome));
                    outcomes.push(outcome);
                }
                Err(row) if row.error.is_fatal() => {
                    log::error!("Stopping run: {}", row.error);
                    aborted = Some(row.error);
                    break;
                }
                Err(row) => {
                    log::warn!(
                        "Rejected row at line {}: {} ({:?})",
                        row.line.unwrap_or_default(),
                        row.error,
                        row.cells
                    );
                    self.observer.report(RunEvent::Rejected(&row));
                    rejected.push(row);
                }
            }
        }

        let report = BatchReport::new(outcomes, rejected, aborted);
        log::info!("Run finished: {:?}", report.summary);
        Ok(report)
    }

    /// Reconcile one record; failures are captured in the outcome
    pub async fn process(&mut self, record: ImportRecord) -> ProcessingOutcome {
        let mut outcome = ProcessingOutcome::new(record);
        let record = outcome.record.clone();

        if let Err(failure) = self.reconcile(&record, &mut outcome).await {
            log::error!(
                "Record {} failed at {}: {} (record: {:?})",
                record.email,
                failure.step,
                failure.error,
                record
            );
            outcome.failure = Some(failure);
        } else {
            log::info!("Record {} reconciled ({:?})", record.email, outcome.status());
        }
        outcome
    }

    async fn reconcile(
        &mut self,
        record: &ImportRecord,
        outcome: &mut ProcessingOutcome,
    ) -> std::result::Result<(), RecordFailure> {
        let (user, created) = self.resolve_user(record, outcome).await?;
        self.reconcile_teams(record, &user, outcome).await?;
        self.provision_channels(record, &user, created, outcome).await
    }

    async fn resolve_user(
        &self,
        record: &ImportRecord,
        outcome: &mut ProcessingOutcome,
    ) -> std::result::Result<(DirectoryUser, bool), RecordFailure> {
        let email = record.email.trim();
        if email.is_empty() {
            return Err(ValidationError::missing_field("email")).at(Step::FindUser);
        }

        let matches = self
            .client
            .find_user_by_email(email)
            .await
            .at(Step::FindUser)?;
        let match_count = matches.len();

        if let Some(user) = matches.into_iter().next() {
            if match_count > 1 {
                log::warn!(
                    "{match_count} directory users match {email}; using the first ({})",
                    user.id
                );
            }
            log::debug!("Found existing user {} for {email}", user.id);
            outcome.user = Some(UserResolution {
                user_id: user.id.clone(),
                email: user.email.clone(),
                created: false,
                matches: match_count,
            });
            return Ok((user, false));
        }

        let name = non_blank(record.name.as_deref())
            .ok_or_else(|| ValidationError::missing_field("name"))
            .at(Step::CreateUser)?;
        let role = non_blank(record.base_role.as_deref())
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_BASE_ROLE.to_string());
        if !roles::is_known_base_role(&role) {
            return Err(ValidationError::unknown_base_role(&role)).at(Step::CreateUser);
        }
        let title = record.title.as_deref().unwrap_or(DEFAULT_TITLE);

        if let Some(field) = shifted_column(record) {
            let prompt = format!(
                "{field} for {email} is not numeric; the title column may have shifted. Create the user anyway?"
            );
            if !self.gate.confirm(&prompt) {
                return Err(Error::policy_declined(prompt, DeclineStage::DuringRecord))
                    .at(Step::CreateUser);
            }
        }

        let user = self
            .client
            .create_user(name, email, &role, title)
            .await
            .at(Step::CreateUser)?;
        log::info!("Created user {} for {email}", user.id);

        outcome.user = Some(UserResolution {
            user_id: user.id.clone(),
            email: user.email.clone(),
            created: true,
            matches: 0,
        });
        Ok((user, true))
    }

    async fn reconcile_teams(
        &mut self,
        record: &ImportRecord,
        user: &DirectoryUser,
        outcome: &mut ProcessingOutcome,
    ) -> std::result::Result<(), RecordFailure> {
        let base_role = non_blank(record.base_role.as_deref())
            .or_else(|| non_blank(user.role.as_deref()))
            .unwrap_or(DEFAULT_BASE_ROLE)
            .to_string();

        for (index, raw_name) in record.teams.iter().enumerate() {
            let team_name = raw_name.trim();
            if team_name.is_empty() {
                continue;
            }

            let role =
                roles::resolve(&base_role, index, &record.team_role_overrides).at(Step::ResolveRole)?;

            let (team, team_created) = match self.lookup_team(team_name).await.at(Step::FindTeam)? {
                Some(team) => (team, false),
                None if self.config.create_missing_teams => {
                    let team = self
                        .client
                        .create_team(team_name)
                        .await
                        .at(Step::CreateTeam)?;
                    log::info!("Created team {} ({})", team.name, team.id);
                    self.team_cache
                        .insert(normalize_team_name(team_name), team.clone());
                    (team, true)
                }
                None => {
                    log::info!("Team {team_name} does not exist; skipping membership for {}", user.email);
                    outcome.teams.push(TeamOutcome::Skipped {
                        index,
                        team_name: team_name.to_string(),
                    });
                    continue;
                }
            };

            if let Err(error) = self.client.add_user_to_team(&team.id, &user.id, role).await {
                if team_created {
                    outcome.teams.push(TeamOutcome::CreatedNotJoined {
                        index,
                        team_name: team.name.clone(),
                        team_id: team.id.clone(),
                    });
                }
                return Err(RecordFailure::new(Step::AddMembership, error));
            }
            log::debug!("Added {} to team {} as {role}", user.email, team.name);

            outcome.teams.push(TeamOutcome::Joined {
                index,
                team_name: team.name.clone(),
                team_id: team.id.clone(),
                role,
                team_created,
            });
        }

        Ok(())
    }

    /// Cache first, then an exact case-insensitive match from the directory
    async fn lookup_team(&mut self, name: &str) -> Result<Option<Team>> {
        let key = normalize_team_name(name);
        if let Some(team) = self.team_cache.get(&key) {
            return Ok(Some(team.clone()));
        }

        let found = self
            .client
            .find_teams_by_name(name)
            .await?
            .into_iter()
            .find(|team| team.matches_name(name));

        if let Some(team) = &found {
            self.team_cache.insert(key, team.clone());
        }
        Ok(found)
    }

    async fn provision_channels(
        &self,
        record: &ImportRecord,
        user: &DirectoryUser,
        user_created: bool,
        outcome: &mut ProcessingOutcome,
    ) -> std::result::Result<(), RecordFailure> {
        let phone = record.phone().and_then(|(country, number)| {
            Some((non_blank(Some(country))?, non_blank(Some(number))?))
        });
        let Some((country_code, number)) = phone else {
            log::debug!("No phone number for {}; skipping notifications", user.email);
            outcome.channels.extend(
                ContactChannel::ALL
                    .iter()
                    .map(|&channel| ChannelOutcome::Skipped { channel }),
            );
            return Ok(());
        };

        let existing = if user_created {
            Vec::new()
        } else {
            self.client
                .list_contact_methods(&user.id)
                .await
                .at(Step::ListContactMethods)?
        };

        for channel in ContactChannel::ALL {
            if let Some(method) = existing.iter().find(|m| m.is_same(channel, number)) {
                log::debug!("{channel} contact method already present for {}", user.email);
                outcome.channels.push(ChannelOutcome::AlreadyPresent {
                    channel,
                    contact_method_id: method.id.clone(),
                });
                continue;
            }

            let method = self
                .client
                .add_contact_method(&user.id, channel, number, country_code, CONTACT_METHOD_LABEL)
                .await
                .at(Step::AddContactMethod)?;

            let mut rule_delays = Vec::new();
            let mut failure = None;
            for &delay in channel.rule_delays() {
                match self
                    .client
                    .add_notification_rule(&user.id, &method.id, channel, delay)
                    .await
                {
                    Ok(_) => rule_delays.push(delay),
                    Err(error) => {
                        failure = Some(RecordFailure::new(Step::AddNotificationRule, error));
                        break;
                    }
                }
            }

            outcome.channels.push(ChannelOutcome::Created {
                channel,
                contact_method_id: method.id,
                rule_delays,
            });
            if let Some(failure) = failure {
                return Err(failure);
            }
        }

        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Name of a phone field that holds something other than a number
///
/// Digits are required once `+`, `-`, `(`, `)`, `.` and spaces are removed.
fn shifted_column(record: &ImportRecord) -> Option<&'static str> {
    let is_anomalous = |value: Option<&str>| {
        non_blank(value).is_some_and(|v| {
            let stripped: String = v
                .chars()
                .filter(|c| !matches!(c, '+' | '-' | '(' | ')' | '.' | ' '))
                .collect();
            stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit())
        })
    };

    if is_anomalous(record.country_code.as_deref()) {
        Some("Country code")
    } else if is_anomalous(record.phone_number.as_deref()) {
        Some("Phone number")
    } else {
        None
    }
}
