//! What the engine did for each record, and for the whole batch

use crate::directory::ContactChannel;
use crate::error::{Error, ErrorKind, serialize_error};
use crate::records::{ImportRecord, RowRejected};
use crate::roles::TeamRole;
use serde::Serialize;
use std::fmt;

/// Reconciliation step a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FindUser,
    CreateUser,
    ResolveRole,
    FindTeam,
    CreateTeam,
    AddMembership,
    ListContactMethods,
    AddContactMethod,
    AddNotificationRule,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FindUser => "find user",
            Self::CreateUser => "create user",
            Self::ResolveRole => "resolve team role",
            Self::FindTeam => "find team",
            Self::CreateTeam => "create team",
            Self::AddMembership => "add team membership",
            Self::ListContactMethods => "list contact methods",
            Self::AddContactMethod => "add contact method",
            Self::AddNotificationRule => "add notification rule",
        };
        f.write_str(label)
    }
}

/// Error that ended a record, with the step it ended in
#[derive(Debug, Serialize)]
pub struct RecordFailure {
    pub step: Step,
    #[serde(serialize_with = "serialize_error")]
    pub error: Error,
}

impl RecordFailure {
    pub fn new(step: Step, error: impl Into<Error>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

/// Attach a [`Step`] to a failing result
pub(crate) trait AtStep<T> {
    fn at(self, step: Step) -> Result<T, RecordFailure>;
}

impl<T, E: Into<Error>> AtStep<T> for Result<T, E> {
    fn at(self, step: Step) -> Result<T, RecordFailure> {
        self.map_err(|e| RecordFailure::new(step, e))
    }
}

/// How the user of a record was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResolution {
    pub user_id: String,
    pub email: String,
    pub created: bool,
    /// Number of directory users matching the email
    pub matches: usize,
}

/// What happened for one team of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TeamOutcome {
    /// Membership pushed with the resolved role
    Joined {
        index: usize,
        team_name: String,
        team_id: String,
        role: TeamRole,
        team_created: bool,
    },
    /// Team was created but the membership call failed
    CreatedNotJoined {
        index: usize,
        team_name: String,
        team_id: String,
    },
    /// Team does not exist and creation is disabled
    Skipped { index: usize, team_name: String },
}

impl TeamOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// What happened for one notification channel of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ChannelOutcome {
    /// Contact method created, with the rules created for it so far
    Created {
        channel: ContactChannel,
        contact_method_id: String,
        rule_delays: Vec<u32>,
    },
    /// Same contact method was already on the user
    AlreadyPresent {
        channel: ContactChannel,
        contact_method_id: String,
    },
    /// Record has no phone number or no country code
    Skipped { channel: ContactChannel },
}

/// Final state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Succeeded,
    SucceededWithSkips,
    Failed,
}

/// Everything the engine did for one record
#[derive(Debug, Serialize)]
pub struct ProcessingOutcome {
    pub record: ImportRecord,
    pub user: Option<UserResolution>,
    pub teams: Vec<TeamOutcome>,
    pub channels: Vec<ChannelOutcome>,
    pub failure: Option<RecordFailure>,
}

impl ProcessingOutcome {
    pub fn new(record: ImportRecord) -> Self {
        Self {
            record,
            user: None,
            teams: Vec::new(),
            channels: Vec::new(),
            failure: None,
        }
    }

    pub fn status(&self) -> RecordStatus {
        if self.failure.is_some() {
            RecordStatus::Failed
        } else if self.teams.iter().any(TeamOutcome::is_skipped) {
            RecordStatus::SucceededWithSkips
        } else {
            RecordStatus::Succeeded
        }
    }

    /// Kind of the failure, if the record failed
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.error.kind())
    }

    pub fn memberships_added(&self) -> usize {
        self.teams
            .iter()
            .filter(|t| matches!(t, TeamOutcome::Joined { .. }))
            .count()
    }

    pub fn teams_created(&self) -> usize {
        self.teams
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    TeamOutcome::Joined { team_created: true, .. }
                        | TeamOutcome::CreatedNotJoined { .. }
                )
            })
            .count()
    }

    pub fn contact_methods_created(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c, ChannelOutcome::Created { .. }))
            .count()
    }

    pub fn notification_rules_created(&self) -> usize {
        self.channels
            .iter()
            .map(|c| match c {
                ChannelOutcome::Created { rule_delays, .. } => rule_delays.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Counters over a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub succeeded: usize,
    pub succeeded_with_skips: usize,
    pub failed: usize,
    pub rejected: usize,
    pub users_created: usize,
    pub users_found: usize,
    pub memberships_added: usize,
    pub teams_created: usize,
    pub teams_skipped: usize,
    pub contact_methods_created: usize,
    pub contact_methods_present: usize,
    pub notification_rules_created: usize,
}

impl Summary {
    fn add(&mut self, outcome: &ProcessingOutcome) {
        match outcome.status() {
            RecordStatus::Succeeded => self.succeeded += 1,
            RecordStatus::SucceededWithSkips => self.succeeded_with_skips += 1,
            RecordStatus::Failed => self.failed += 1,
        }
        match &outcome.user {
            Some(user) if user.created => self.users_created += 1,
            Some(_) => self.users_found += 1,
            None => {}
        }
        self.memberships_added += outcome.memberships_added();
        self.teams_created += outcome.teams_created();
        self.teams_skipped += outcome.teams.iter().filter(|t| t.is_skipped()).count();
        self.contact_methods_created += outcome.contact_methods_created();
        self.contact_methods_present += outcome
            .channels
            .iter()
            .filter(|c| matches!(c, ChannelOutcome::AlreadyPresent { .. }))
            .count();
        self.notification_rules_created += outcome.notification_rules_created();
    }

    /// Records seen, including rejected rows
    pub fn total(&self) -> usize {
        self.succeeded + self.succeeded_with_skips + self.failed + self.rejected
    }
}

/// Result of a batch run
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ProcessingOutcome>,
    pub rejected: Vec<RowRejected>,
    /// Error that stopped the run part way, if any
    #[serde(serialize_with = "serialize_optional_error")]
    pub aborted: Option<Error>,
    pub summary: Summary,
}

impl BatchReport {
    pub fn new(
        outcomes: Vec<ProcessingOutcome>,
        rejected: Vec<RowRejected>,
        aborted: Option<Error>,
    ) -> Self {
        let mut summary = Summary {
            rejected: rejected.len(),
            ..Default::default()
        };
        for outcome in &outcomes {
            summary.add(outcome);
        }

        Self {
            outcomes,
            rejected,
            aborted,
            summary,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status() == RecordStatus::Failed)
    }
}

fn serialize_optional_error<S>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(error) => serialize_error(error, serializer),
        None => serializer.serialize_none(),
    }
}
