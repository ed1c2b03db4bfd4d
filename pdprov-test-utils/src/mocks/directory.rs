//! In-memory directory for testing

use pdprov_core::directory::{
    ContactChannel, ContactMethod, ContactMethodReference, DirectoryClient, DirectoryUser,
    NotificationRule, SubscriptionClient, Team, WebhookSubscription,
};
use pdprov_core::error::{DirectoryError, TransportError};
use pdprov_core::{Error, Result, TeamRole};
use std::collections::HashMap;
use std::sync::Mutex;

/// Directory operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    FindUserByEmail,
    CreateUser,
    ListContactMethods,
    AddContactMethod,
    AddNotificationRule,
    FindTeamsByName,
    CreateTeam,
    AddUserToTeam,
    ListWebhookSubscriptions,
    ActivateWebhookSubscription,
}

/// A call received by the mock, with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FindUserByEmail(String),
    CreateUser {
        name: String,
        email: String,
        role: String,
        title: String,
    },
    ListContactMethods(String),
    AddContactMethod {
        user_id: String,
        channel: ContactChannel,
        address: String,
        country_code: String,
        label: String,
    },
    AddNotificationRule {
        user_id: String,
        contact_method_id: String,
        channel: ContactChannel,
        delay_minutes: u32,
    },
    FindTeamsByName(String),
    CreateTeam(String),
    AddUserToTeam {
        team_id: String,
        user_id: String,
        role: TeamRole,
    },
    ListWebhookSubscriptions,
    ActivateWebhookSubscription(String),
}

impl MockCall {
    pub fn operation(&self) -> MockOperation {
        match self {
            Self::FindUserByEmail(_) => MockOperation::FindUserByEmail,
            Self::CreateUser { .. } => MockOperation::CreateUser,
            Self::ListContactMethods(_) => MockOperation::ListContactMethods,
            Self::AddContactMethod { .. } => MockOperation::AddContactMethod,
            Self::AddNotificationRule { .. } => MockOperation::AddNotificationRule,
            Self::FindTeamsByName(_) => MockOperation::FindTeamsByName,
            Self::CreateTeam(_) => MockOperation::CreateTeam,
            Self::AddUserToTeam { .. } => MockOperation::AddUserToTeam,
            Self::ListWebhookSubscriptions => MockOperation::ListWebhookSubscriptions,
            Self::ActivateWebhookSubscription(_) => MockOperation::ActivateWebhookSubscription,
        }
    }

    /// Argument failures are matched against
    fn key(&self) -> &str {
        match self {
            Self::FindUserByEmail(email) => email,
            Self::CreateUser { email, .. } => email,
            Self::ListContactMethods(user_id) => user_id,
            Self::AddContactMethod { user_id, .. } => user_id,
            Self::AddNotificationRule { user_id, .. } => user_id,
            Self::FindTeamsByName(name) => name,
            Self::CreateTeam(name) => name,
            Self::AddUserToTeam { team_id, .. } => team_id,
            Self::ListWebhookSubscriptions => "",
            Self::ActivateWebhookSubscription(id) => id,
        }
    }
}

/// Error the mock should return
#[derive(Debug, Clone)]
pub enum MockFailure {
    Transport(String),
    Timeout,
    NotFound,
    Conflict(String),
    Unauthorized,
    Api(u16, String),
}

impl MockFailure {
    fn to_error(&self, call: &MockCall) -> Error {
        let operation = format!("{:?}", call.operation());
        match self {
            Self::Transport(message) => TransportError::connect(&operation, message).into(),
            Self::Timeout => TransportError::timeout(&operation, "request timed out").into(),
            Self::NotFound => DirectoryError::not_found(&operation, call.key()).into(),
            Self::Conflict(message) => DirectoryError::conflict(&operation, message).into(),
            Self::Unauthorized => DirectoryError::unauthorized(&operation, 401).into(),
            Self::Api(status, message) => DirectoryError::api(&operation, *status, message).into(),
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: MockOperation,
    /// Only calls whose key matches (case-insensitive); `None` matches all
    key: Option<String>,
    failure: MockFailure,
}

/// Membership stored by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockMembership {
    pub team_id: String,
    pub user_id: String,
    pub role: TeamRole,
}

#[derive(Debug, Default)]
struct MockState {
    users: Vec<DirectoryUser>,
    teams: Vec<Team>,
    contact_methods: HashMap<String, Vec<ContactMethod>>,
    notification_rules: HashMap<String, Vec<NotificationRule>>,
    memberships: Vec<MockMembership>,
    subscriptions: Vec<WebhookSubscription>,
    calls: Vec<MockCall>,
    failures: Vec<InjectedFailure>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }

    /// Record the call, then return the injected failure for it if any
    fn enter(&mut self, call: MockCall) -> Result<()> {
        let failure = self
            .failures
            .iter()
            .find(|f| {
                f.operation == call.operation()
                    && f.key
                        .as_deref()
                        .is_none_or(|key| key.eq_ignore_ascii_case(call.key()))
            })
            .map(|f| f.failure.to_error(&call));
        self.calls.push(call);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// In-memory [`DirectoryClient`] and [`SubscriptionClient`]
///
/// Keeps users, teams, memberships and notification setup in memory,
/// records every call, and can be told to fail specific calls.
///
/// ```rust,no_run
/// use pdprov_test_utils::{MockDirectoryClient, MockFailure, MockOperation};
///
/// let mock = MockDirectoryClient::new()
///     .with_user("Ada", "ada@example.com", "user")
///     .with_team("Ops");
/// mock.fail_when(MockOperation::FindTeamsByName, "Infra", MockFailure::Timeout);
/// ```
#[derive(Debug, Default)]
pub struct MockDirectoryClient {
    state: Mutex<MockState>,
}

impl MockDirectoryClient {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing user
    pub fn with_user(self, name: &str, email: &str, role: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("PU");
            state.users.push(DirectoryUser {
                id,
                email: email.to_string(),
                name: name.to_string(),
                role: Some(role.to_string()),
            });
        }
        self
    }

    /// Seed an existing team
    pub fn with_team(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("PT");
            state.teams.push(Team {
                id,
                name: name.to_string(),
            });
        }
        self
    }

    /// Seed a contact method on an existing user
    pub fn with_contact_method(self, email: &str, channel: ContactChannel, address: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("PC");
            let user_id = state
                .users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .map(|u| u.id.clone())
                .expect("seed the user before its contact methods");
            state
                .contact_methods
                .entry(user_id)
                .or_default()
                .push(ContactMethod {
                    id,
                    contact_type: channel.contact_method_type().to_string(),
                    address: address.to_string(),
                    label: Some("Mobile".to_string()),
                });
        }
        self
    }

    /// Seed a webhook subscription
    pub fn with_subscription(self, id: &str, description: &str, active: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .push(WebhookSubscription {
                id: id.to_string(),
                description: Some(description.to_string()),
                active,
            });
        self
    }

    /// Fail every call to `operation`
    pub fn fail_always(&self, operation: MockOperation, failure: MockFailure) {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            operation,
            key: None,
            failure,
        });
    }

    /// Fail calls to `operation` whose key argument matches `key`
    ///
    /// The key is the email for user calls, the team name for team lookups and
    /// creation, the team id for memberships, the user id for contact and
    /// notification calls, and the subscription id for activation.
    pub fn fail_when(&self, operation: MockOperation, key: &str, failure: MockFailure) {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            operation,
            key: Some(key.to_string()),
            failure,
        });
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls to `operation`
    pub fn call_count(&self, operation: MockOperation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn users(&self) -> Vec<DirectoryUser> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn user_by_email(&self, email: &str) -> Option<DirectoryUser> {
        self.users()
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn teams(&self) -> Vec<Team> {
        self.state.lock().unwrap().teams.clone()
    }

    pub fn memberships(&self) -> Vec<MockMembership> {
        self.state.lock().unwrap().memberships.clone()
    }

    pub fn contact_methods_for(&self, user_id: &str) -> Vec<ContactMethod> {
        self.state
            .lock()
            .unwrap()
            .contact_methods
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn notification_rules_for(&self, user_id: &str) -> Vec<NotificationRule> {
        self.state
            .lock()
            .unwrap()
            .notification_rules
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscriptions(&self) -> Vec<WebhookSubscription> {
        self.state.lock().unwrap().subscriptions.clone()
    }
}

#[async_trait::async_trait]
impl DirectoryClient for MockDirectoryClient {
    async fn find_user_by_email(&self, email: &str) -> Result<Vec<DirectoryUser>> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::FindUserByEmail(email.to_string()))?;
        Ok(state
            .users
            .iter()
            .filter(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        role: &str,
        title: &str,
    ) -> Result<DirectoryUser> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::CreateUser {
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            title: title.to_string(),
        })?;

        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(DirectoryError::conflict("create user", "Email has already been taken").into());
        }

        let user = DirectoryUser {
            id: state.next_id("PU"),
            email: email.to_string(),
            name: name.to_string(),
            role: Some(role.to_string()),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn list_contact_methods(&self, user_id: &str) -> Result<Vec<ContactMethod>> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::ListContactMethods(user_id.to_string()))?;
        Ok(state
            .contact_methods
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_contact_method(
        &self,
        user_id: &str,
        channel: ContactChannel,
        address: &str,
        country_code: &str,
        label: &str,
    ) -> Result<ContactMethod> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::AddContactMethod {
            user_id: user_id.to_string(),
            channel,
            address: address.to_string(),
            country_code: country_code.to_string(),
            label: label.to_string(),
        })?;

        let method = ContactMethod {
            id: state.next_id("PC"),
            contact_type: channel.contact_method_type().to_string(),
            address: address.to_string(),
            label: Some(label.to_string()),
        };
        state
            .contact_methods
            .entry(user_id.to_string())
            .or_default()
            .push(method.clone());
        Ok(method)
    }

    async fn add_notification_rule(
        &self,
        user_id: &str,
        contact_method_id: &str,
        channel: ContactChannel,
        delay_minutes: u32,
    ) -> Result<NotificationRule> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::AddNotificationRule {
            user_id: user_id.to_string(),
            contact_method_id: contact_method_id.to_string(),
            channel,
            delay_minutes,
        })?;

        let rule = NotificationRule {
            id: state.next_id("PN"),
            start_delay_in_minutes: delay_minutes,
            contact_method: ContactMethodReference {
                id: contact_method_id.to_string(),
                contact_type: channel.contact_method_type().to_string(),
            },
        };
        state
            .notification_rules
            .entry(user_id.to_string())
            .or_default()
            .push(rule.clone());
        Ok(rule)
    }

    async fn find_teams_by_name(&self, name: &str) -> Result<Vec<Team>> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::FindTeamsByName(name.to_string()))?;

        // Substring match, like the service's query parameter
        let query = name.trim().to_lowercase();
        Ok(state
            .teams
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn create_team(&self, name: &str) -> Result<Team> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::CreateTeam(name.to_string()))?;

        if state.teams.iter().any(|t| t.matches_name(name)) {
            return Err(DirectoryError::conflict("create team", "Name has already been taken").into());
        }

        let team = Team {
            id: state.next_id("PT"),
            name: name.to_string(),
        };
        state.teams.push(team.clone());
        Ok(team)
    }

    async fn add_user_to_team(&self, team_id: &str, user_id: &str, role: TeamRole) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::AddUserToTeam {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            role,
        })?;

        if !state.teams.iter().any(|t| t.id == team_id) {
            return Err(DirectoryError::not_found("team", team_id).into());
        }

        // Re-adding a member updates their role
        state
            .memberships
            .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
        state.memberships.push(MockMembership {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            role,
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionClient for MockDirectoryClient {
    async fn list_webhook_subscriptions(&self) -> Result<Vec<WebhookSubscription>> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::ListWebhookSubscriptions)?;
        Ok(state.subscriptions.clone())
    }

    async fn activate_webhook_subscription(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.enter(MockCall::ActivateWebhookSubscription(id.to_string()))?;

        match state.subscriptions.iter_mut().find(|s| s.id == id) {
            Some(subscription) => {
                subscription.active = true;
                Ok(())
            }
            None => Err(DirectoryError::not_found("webhook subscription", id).into()),
        }
    }
}
