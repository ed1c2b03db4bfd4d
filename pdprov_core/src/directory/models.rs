//! Directory entities as the service returns them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label given to every contact method this tool creates
pub const CONTACT_METHOD_LABEL: &str = "Mobile";

/// User account in the remote directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Team in the remote directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

impl Team {
    /// Case-insensitive exact match, surrounding whitespace ignored
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_team_name(&self.name) == normalize_team_name(name)
    }
}

/// Key used to compare team names
pub fn normalize_team_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Notification channel provisioned from a phone number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Sms,
    Phone,
}

impl ContactChannel {
    /// Channels in provisioning order
    pub const ALL: [ContactChannel; 2] = [ContactChannel::Sms, ContactChannel::Phone];

    /// Contact method type on the wire
    pub fn contact_method_type(&self) -> &'static str {
        match self {
            Self::Sms => "sms_contact_method",
            Self::Phone => "phone_contact_method",
        }
    }

    /// Notification rule delays created for this channel, in minutes
    pub fn rule_delays(&self) -> &'static [u32] {
        match self {
            Self::Sms => &[0],
            Self::Phone => &[0, 3],
        }
    }
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sms => f.write_str("sms"),
            Self::Phone => f.write_str("phone"),
        }
    }
}

/// Contact method attached to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub contact_type: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl ContactMethod {
    /// Whether this contact method is the given channel at the given address
    pub fn is_same(&self, channel: ContactChannel, address: &str) -> bool {
        self.contact_type == channel.contact_method_type() && digits(&self.address) == digits(address)
    }
}

fn digits(address: &str) -> String {
    address.chars().filter(char::is_ascii_digit).collect()
}

/// Reference to a contact method inside a notification rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMethodReference {
    pub id: String,
    #[serde(rename = "type")]
    pub contact_type: String,
}

/// Escalation rule tying a contact method to a delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: String,
    pub start_delay_in_minutes: u32,
    pub contact_method: ContactMethodReference,
}

/// Outbound event subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
}
