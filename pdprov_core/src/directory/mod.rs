//! Access to the remote directory service
//!
//! The engine only talks to the [`DirectoryClient`] contract. The REST adapter
//! in [`http`] implements it over HTTPS; tests use the in-memory mock from
//! `pdprov-test-utils`.

pub mod http;
pub mod models;

pub use http::{DEFAULT_API_BASE_URL, RestClientConfig, RestDirectoryClient};
pub use models::{
    CONTACT_METHOD_LABEL, ContactChannel, ContactMethod, ContactMethodReference, DirectoryUser,
    NotificationRule, Team, WebhookSubscription, normalize_team_name,
};

use crate::error::Result;
use crate::roles::TeamRole;

/// Users, teams and notification setup in the directory
#[async_trait::async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Users whose email matches; the service may return more than one
    async fn find_user_by_email(&self, email: &str) -> Result<Vec<DirectoryUser>>;

    /// Create a user with the given base role and job title
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        role: &str,
        title: &str,
    ) -> Result<DirectoryUser>;

    /// Contact methods already attached to a user
    async fn list_contact_methods(&self, user_id: &str) -> Result<Vec<ContactMethod>>;

    /// Attach a contact method to a user
    async fn add_contact_method(
        &self,
        user_id: &str,
        channel: ContactChannel,
        address: &str,
        country_code: &str,
        label: &str,
    ) -> Result<ContactMethod>;

    /// Add a notification rule that uses a contact method after `delay_minutes`
    async fn add_notification_rule(
        &self,
        user_id: &str,
        contact_method_id: &str,
        channel: ContactChannel,
        delay_minutes: u32,
    ) -> Result<NotificationRule>;

    /// Teams whose name matches the query; callers filter for exact matches
    async fn find_teams_by_name(&self, name: &str) -> Result<Vec<Team>>;

    /// Create a team
    async fn create_team(&self, name: &str) -> Result<Team>;

    /// Add a user to a team, or update their role there
    async fn add_user_to_team(&self, team_id: &str, user_id: &str, role: TeamRole) -> Result<()>;
}

/// Webhook subscription inventory
#[async_trait::async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Every subscription, across all pages
    async fn list_webhook_subscriptions(&self) -> Result<Vec<WebhookSubscription>>;

    /// Mark a subscription active
    async fn activate_webhook_subscription(&self, id: &str) -> Result<()>;
}
