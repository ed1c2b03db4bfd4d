//! Team role resolution
//!
//! A user's directory-wide base role decides the default role they get on
//! every team; a record may override it per team, positionally.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base role given to new users when the record leaves it blank
pub const DEFAULT_BASE_ROLE: &str = "user";

/// Per-team permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Manager,
    Responder,
    Observer,
}

impl TeamRole {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Responder => "responder",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "manager" => Ok(Self::Manager),
            "responder" => Ok(Self::Responder),
            "observer" => Ok(Self::Observer),
            _ => Err(ValidationError::unknown_team_role(s.trim())),
        }
    }
}

/// Default team role for a base role, `None` when the base role is unknown
pub fn default_team_role(base_role: &str) -> Option<TeamRole> {
    match normalize(base_role).as_str() {
        "owner" | "admin" | "user" => Some(TeamRole::Manager),
        "limited_user" => Some(TeamRole::Responder),
        "read_only_user" | "read_only_limited_user" | "observer" => Some(TeamRole::Observer),
        _ => None,
    }
}

/// Whether `base_role` appears in the default role table
pub fn is_known_base_role(base_role: &str) -> bool {
    default_team_role(base_role).is_some()
}

/// Resolve the effective role for the team at `team_index`
///
/// First match wins:
/// 1. read-only base roles are always observers
/// 2. owners and admins are always managers
/// 3. a single non-empty override applies to every team
/// 4. the override at `team_index`, or the base role default when that slot
///    is empty or missing
pub fn resolve(
    base_role: &str,
    team_index: usize,
    overrides: &[String],
) -> Result<TeamRole, ValidationError> {
    let base = normalize(base_role);

    if base.contains("read_only") {
        return Ok(TeamRole::Observer);
    }
    if base == "owner" || base == "admin" {
        return Ok(TeamRole::Manager);
    }

    let default =
        default_team_role(&base).ok_or_else(|| ValidationError::unknown_base_role(base_role.trim()))?;

    let entry = if overrides.len() == 1 {
        overrides.first()
    } else {
        overrides.get(team_index)
    };

    match entry.map(|e| e.trim()) {
        Some(value) if !value.is_empty() => value.parse(),
        _ => Ok(default),
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn overrides(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_read_only_is_always_observer() {
        let roles = overrides(&["manager", "manager"]);
        for index in 0..3 {
            assert_eq!(
                resolve("read_only_user", index, &roles).unwrap(),
                TeamRole::Observer
            );
            assert_eq!(
                resolve("read_only_limited_user", index, &roles).unwrap(),
                TeamRole::Observer
            );
        }
    }

    #[test]
    fn test_admin_and_owner_are_always_manager() {
        let roles = overrides(&["observer"]);
        assert_eq!(resolve("admin", 0, &roles).unwrap(), TeamRole::Manager);
        assert_eq!(resolve("owner", 4, &roles).unwrap(), TeamRole::Manager);
    }

    #[test]
    fn test_single_override_applies_to_every_team() {
        let roles = overrides(&["responder"]);
        for index in 0..5 {
            assert_eq!(resolve("user", index, &roles).unwrap(), TeamRole::Responder);
        }
    }

    #[test]
    fn test_positional_overrides_with_gaps() {
        let roles = overrides(&["responder", "", "observer"]);
        let resolved: Vec<TeamRole> = (0..3)
            .map(|index| resolve("user", index, &roles).unwrap())
            .collect();
        assert_eq!(
            resolved,
            vec![TeamRole::Responder, TeamRole::Manager, TeamRole::Observer]
        );
    }

    #[test]
    fn test_index_beyond_overrides_uses_default() {
        let roles = overrides(&["observer", "observer"]);
        assert_eq!(
            resolve("limited_user", 2, &roles).unwrap(),
            TeamRole::Responder
        );
        assert_eq!(resolve("limited_user", 0, &[]).unwrap(), TeamRole::Responder);
    }

    #[test]
    fn test_single_empty_override_uses_default() {
        let roles = overrides(&[""]);
        assert_eq!(resolve("user", 0, &roles).unwrap(), TeamRole::Manager);
        assert_eq!(resolve("user", 1, &roles).unwrap(), TeamRole::Manager);
    }

    #[test]
    fn test_roles_are_case_and_space_insensitive() {
        let roles = overrides(&[" Responder "]);
        assert_eq!(resolve(" USER ", 0, &roles).unwrap(), TeamRole::Responder);
        assert_eq!(
            resolve("Read_Only_User", 0, &[]).unwrap(),
            TeamRole::Observer
        );
    }

    #[test]
    fn test_unknown_base_role_is_rejected() {
        let error = resolve("superuser", 0, &[]).unwrap_err();
        assert_eq!(error, ValidationError::unknown_base_role("superuser"));
        assert!(!is_known_base_role("superuser"));
        assert!(is_known_base_role("limited_user"));
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let roles = overrides(&["boss", "responder"]);
        assert_eq!(
            resolve("user", 0, &roles).unwrap_err(),
            ValidationError::unknown_team_role("boss")
        );
        assert_eq!(resolve("user", 1, &roles).unwrap(), TeamRole::Responder);
    }

    #[test]
    fn test_team_role_display_and_parse() {
        for role in [TeamRole::Manager, TeamRole::Responder, TeamRole::Observer] {
            assert_eq!(role.to_string().parse::<TeamRole>().unwrap(), role);
        }
    }

    fn any_override() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("manager".to_string()),
            Just("responder".to_string()),
            Just("observer".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn prop_read_only_ignores_overrides(
            roles in proptest::collection::vec(any_override(), 0..6),
            index in 0usize..8,
        ) {
            prop_assert_eq!(resolve("read_only_user", index, &roles).unwrap(), TeamRole::Observer);
        }

        #[test]
        fn prop_admin_ignores_overrides(
            roles in proptest::collection::vec(any_override(), 0..6),
            index in 0usize..8,
        ) {
            prop_assert_eq!(resolve("admin", index, &roles).unwrap(), TeamRole::Manager);
        }

        #[test]
        fn prop_known_base_roles_always_resolve(
            base in prop_oneof![
                Just("user"),
                Just("limited_user"),
                Just("observer"),
            ],
            roles in proptest::collection::vec(any_override(), 0..6),
            index in 0usize..8,
        ) {
            prop_assert!(resolve(base, index, &roles).is_ok());
        }
    }
}
