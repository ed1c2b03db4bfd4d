//! REST adapter for the directory service
//!
//! Speaks the PagerDuty-style v2 REST API: token authentication, JSON bodies
//! wrapped in a singular envelope (`{"user": {...}}`), list responses wrapped
//! in a plural one with offset pagination.

use crate::context::RunContext;
use crate::directory::models::{
    ContactChannel, ContactMethod, DirectoryUser, NotificationRule, Team, WebhookSubscription,
};
use crate::directory::{DirectoryClient, SubscriptionClient};
use crate::error::{DirectoryError, Error, Result, TransportError};
use crate::roles::TeamRole;
use crate::secret::SecretToken;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// Public API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.pagerduty.com";

const API_ACCEPT: &str = "application/vnd.pagerduty+json;version=2";
const PAGE_SIZE: usize = 100;
const BODY_SNIPPET_LIMIT: usize = 400;

/// Connection settings for [`RestDirectoryClient`]
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub base_url: String,
    pub token: SecretToken,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RestClientConfig {
    pub fn new(token: SecretToken) -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a request is doing, for error messages
#[derive(Debug, Clone, Copy)]
struct Call<'a> {
    operation: &'a str,
    entity: &'a str,
    key: &'a str,
}

impl<'a> Call<'a> {
    fn new(operation: &'a str, entity: &'a str, key: &'a str) -> Self {
        Self {
            operation,
            entity,
            key,
        }
    }
}

/// HTTPS implementation of [`DirectoryClient`] and [`SubscriptionClient`]
pub struct RestDirectoryClient {
    http: reqwest::Client,
    config: RestClientConfig,
    context: RunContext,
}

impl RestDirectoryClient {
    /// Build a client; a blank token is a configuration error
    pub fn new(config: RestClientConfig, context: RunContext) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::configuration("API token is not set"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::from_reqwest("build HTTP client", e))?;

        Ok(Self {
            http,
            config,
            context,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let is_write = method != Method::GET;
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header(
                AUTHORIZATION,
                format!("Token token={}", self.config.token.expose()),
            )
            .header(ACCEPT, API_ACCEPT)
            .header(CONTENT_TYPE, "application/json");

        if is_write && let Some(from) = &self.context.requester_identity {
            builder = builder.header("From", from.as_str());
        }
        builder
    }

    async fn send_raw(&self, call: Call<'_>, builder: RequestBuilder) -> Result<Vec<u8>> {
        log::debug!("Directory request: {} ({})", call.operation, call.key);

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(call.operation, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(call.operation, e))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        log::debug!(
            "Directory request {} failed with {status}: {}",
            call.operation,
            snippet(&body)
        );
        Err(map_error_status(call, status, &body))
    }

    async fn send<O: DeserializeOwned>(&self, call: Call<'_>, builder: RequestBuilder) -> Result<O> {
        let body = self.send_raw(call, builder).await?;
        decode(call, &body)
    }

    /// Fetch every page of a list endpoint
    async fn get_all<T: DeserializeOwned>(
        &self,
        call: Call<'_>,
        path: &str,
        list_key: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let limit = PAGE_SIZE.to_string();
            let offset_param = offset.to_string();
            let builder = self.request(Method::GET, path).query(query).query(&[
                ("limit", limit.as_str()),
                ("offset", offset_param.as_str()),
            ]);

            let page: Value = self.send(call, builder).await?;
            let batch: Vec<T> = match page.get(list_key) {
                Some(list) => serde_json::from_value(list.clone())
                    .map_err(|e| TransportError::decode(call.operation, &e.to_string()))?,
                None => {
                    return Err(TransportError::decode(
                        call.operation,
                        &format!("response has no '{list_key}' list"),
                    )
                    .into());
                }
            };

            let fetched = batch.len();
            items.extend(batch);

            let more = page.get("more").and_then(Value::as_bool).unwrap_or(false);
            if !more || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        Ok(items)
    }
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: DirectoryUser,
}

#[derive(Deserialize)]
struct ContactMethodEnvelope {
    contact_method: ContactMethod,
}

#[derive(Deserialize)]
struct NotificationRuleEnvelope {
    notification_rule: NotificationRule,
}

#[derive(Deserialize)]
struct TeamEnvelope {
    team: Team,
}

#[async_trait::async_trait]
impl DirectoryClient for RestDirectoryClient {
    async fn find_user_by_email(&self, email: &str) -> Result<Vec<DirectoryUser>> {
        let call = Call::new("find user", "user", email);
        let users: Vec<DirectoryUser> = self
            .get_all(call, "/users", "users", &[("query", email)])
            .await?;

        // The query also matches names and partial emails
        Ok(users
            .into_iter()
            .filter(|user| user.email.trim().eq_ignore_ascii_case(email.trim()))
            .collect())
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        role: &str,
        title: &str,
    ) -> Result<DirectoryUser> {
        let call = Call::new("create user", "user", email);
        let body = json!({
            "user": {
                "type": "user",
                "name": name,
                "email": email,
                "role": role,
                "job_title": title,
            }
        });
        let envelope: UserEnvelope = self
            .send(call, self.request(Method::POST, "/users").json(&body))
            .await?;
        Ok(envelope.user)
    }

    async fn list_contact_methods(&self, user_id: &str) -> Result<Vec<ContactMethod>> {
        let call = Call::new("list contact methods", "user", user_id);
        let path = format!("/users/{user_id}/contact_methods");
        let page: Value = self.send(call, self.request(Method::GET, &path)).await?;
        let list = page.get("contact_methods").cloned().unwrap_or(Value::Null);
        if list.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(list)
            .map_err(|e| TransportError::decode(call.operation, &e.to_string()).into())
    }

    async fn add_contact_method(
        &self,
        user_id: &str,
        channel: ContactChannel,
        address: &str,
        country_code: &str,
        label: &str,
    ) -> Result<ContactMethod> {
        let call = Call::new("add contact method", "user", user_id);
        let path = format!("/users/{user_id}/contact_methods");
        let body = json!({
            "contact_method": {
                "type": channel.contact_method_type(),
                "address": address,
                "label": label,
                "country_code": country_code_value(country_code),
            }
        });
        let envelope: ContactMethodEnvelope = self
            .send(call, self.request(Method::POST, &path).json(&body))
            .await?;
        Ok(envelope.contact_method)
    }

    async fn add_notification_rule(
        &self,
        user_id: &str,
        contact_method_id: &str,
        channel: ContactChannel,
        delay_minutes: u32,
    ) -> Result<NotificationRule> {
        let call = Call::new("add notification rule", "user", user_id);
        let path = format!("/users/{user_id}/notification_rules");
        let body = json!({
            "notification_rule": {
                "type": "assignment_notification_rule",
                "start_delay_in_minutes": delay_minutes,
                "contact_method": {
                    "id": contact_method_id,
                    "type": channel.contact_method_type(),
                },
                "urgency": "high",
            }
        });
        let envelope: NotificationRuleEnvelope = self
            .send(call, self.request(Method::POST, &path).json(&body))
            .await?;
        Ok(envelope.notification_rule)
    }

    async fn find_teams_by_name(&self, name: &str) -> Result<Vec<Team>> {
        let call = Call::new("find team", "team", name);
        self.get_all(call, "/teams", "teams", &[("query", name.trim())])
            .await
    }

    async fn create_team(&self, name: &str) -> Result<Team> {
        let call = Call::new("create team", "team", name);
        let body = json!({
            "team": {
                "type": "team",
                "name": name,
            }
        });
        let envelope: TeamEnvelope = self
            .send(call, self.request(Method::POST, "/teams").json(&body))
            .await?;
        Ok(envelope.team)
    }

    async fn add_user_to_team(&self, team_id: &str, user_id: &str, role: TeamRole) -> Result<()> {
        let call = Call::new("add team membership", "team", team_id);
        let path = format!("/teams/{team_id}/users/{user_id}");
        let body = json!({ "role": role.as_str() });
        self.send_raw(call, self.request(Method::PUT, &path).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionClient for RestDirectoryClient {
    async fn list_webhook_subscriptions(&self) -> Result<Vec<WebhookSubscription>> {
        let call = Call::new("list webhook subscriptions", "webhook subscription", "*");
        self.get_all(call, "/webhook_subscriptions", "webhook_subscriptions", &[])
            .await
    }

    async fn activate_webhook_subscription(&self, id: &str) -> Result<()> {
        let call = Call::new("activate webhook subscription", "webhook subscription", id);
        let path = format!("/webhook_subscriptions/{id}");
        let body = json!({ "webhook_subscription": { "active": true } });
        self.send_raw(call, self.request(Method::PUT, &path).json(&body))
            .await?;
        Ok(())
    }
}

/// Error body of the v2 API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorObject,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorObject {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<String>,
}

fn map_error_status(call: Call<'_>, status: StatusCode, body: &[u8]) -> Error {
    let message = error_message(body);
    let lowered = message.to_lowercase();
    let mentions_existing =
        lowered.contains("taken") || lowered.contains("already exist") || lowered.contains("existing");

    let error = match status {
        StatusCode::NOT_FOUND => DirectoryError::not_found(call.entity, call.key),
        StatusCode::CONFLICT => DirectoryError::conflict(call.operation, &message),
        StatusCode::BAD_REQUEST if mentions_existing => {
            DirectoryError::conflict(call.operation, &message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DirectoryError::unauthorized(call.operation, status.as_u16())
        }
        _ => DirectoryError::api(call.operation, status.as_u16(), &message),
    };
    error.into()
}

fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() || !parsed.error.errors.is_empty() => {
            let mut message = parsed.error.message;
            if !parsed.error.errors.is_empty() {
                if !message.is_empty() {
                    message.push_str(": ");
                }
                message.push_str(&parsed.error.errors.join("; "));
            }
            message
        }
        _ => snippet(body),
    }
}

fn decode<O: DeserializeOwned>(call: Call<'_>, body: &[u8]) -> Result<O> {
    serde_json::from_slice(body).map_err(|e| {
        TransportError::decode(call.operation, &format!("{e}: {}", snippet(body))).into()
    })
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(BODY_SNIPPET_LIMIT)]).into_owned()
}

/// Country codes go out as numbers when they are numeric
fn country_code_value(country_code: &str) -> Value {
    let trimmed = country_code.trim().trim_start_matches('+');
    match trimmed.parse::<u32>() {
        Ok(code) => json!(code),
        Err(_) => json!(country_code.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn call() -> Call<'static> {
        Call::new("create user", "user", "ada@example.com")
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StatusCode::NOT_FOUND, "{}", ErrorKind::NotFound),
            (StatusCode::CONFLICT, "{}", ErrorKind::Conflict),
            (
                StatusCode::BAD_REQUEST,
                r#"{"error":{"message":"Invalid Input Provided","errors":["Email has already been taken."]}}"#,
                ErrorKind::Conflict,
            ),
            (
                StatusCode::BAD_REQUEST,
                r#"{"error":{"message":"Invalid Input Provided","errors":["Name cannot be empty."]}}"#,
                ErrorKind::Api,
            ),
            (StatusCode::UNAUTHORIZED, "{}", ErrorKind::Unauthorized),
            (StatusCode::FORBIDDEN, "{}", ErrorKind::Unauthorized),
            (StatusCode::INTERNAL_SERVER_ERROR, "boom", ErrorKind::Api),
        ];

        for (status, body, expected) in cases {
            let error = map_error_status(call(), status, body.as_bytes());
            assert_eq!(error.kind(), expected, "{status}: {error}");
        }
    }

    #[test]
    fn test_error_message_joins_details() {
        let body = br#"{"error":{"message":"Invalid Input Provided","errors":["a","b"]}}"#;
        assert_eq!(error_message(body), "Invalid Input Provided: a; b");
        assert_eq!(error_message(b"plain text"), "plain text");
    }

    #[test]
    fn test_country_code_value() {
        assert_eq!(country_code_value("1"), json!(1));
        assert_eq!(country_code_value("+44"), json!(44));
        assert_eq!(country_code_value("US"), json!("US"));
    }

    #[test]
    fn test_blank_token_is_configuration_error() {
        let result = RestDirectoryClient::new(
            RestClientConfig::new(SecretToken::new("  ")),
            RunContext::default(),
        );
        match result {
            Err(error) => assert_eq!(error.kind(), ErrorKind::Configuration),
            Ok(_) => panic!("blank token should be rejected"),
        }
    }
}
