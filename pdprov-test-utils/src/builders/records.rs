//! Import record builder

use pdprov_core::ImportRecord;

/// Builder for [`ImportRecord`]s
#[derive(Debug, Clone)]
pub struct ImportRecordBuilder {
    record: ImportRecord,
}

impl ImportRecordBuilder {
    /// Start a record for `email` with a name derived from it
    pub fn new(email: &str) -> Self {
        let name = email.split('@').next().unwrap_or(email).replace('.', " ");
        Self {
            record: ImportRecord {
                name: Some(name),
                ..ImportRecord::new(email)
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.record.name = Some(name.to_string());
        self
    }

    pub fn without_name(mut self) -> Self {
        self.record.name = None;
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.record.base_role = Some(role.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.record.title = Some(title.to_string());
        self
    }

    /// Set country code and phone number
    pub fn with_phone(mut self, country_code: &str, number: &str) -> Self {
        self.record.country_code = Some(country_code.to_string());
        self.record.phone_number = Some(number.to_string());
        self
    }

    pub fn with_teams(mut self, teams: &[&str]) -> Self {
        self.record.teams = teams.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_team_roles(mut self, roles: &[&str]) -> Self {
        self.record.team_role_overrides = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn build(self) -> ImportRecord {
        self.record
    }
}

/// Ready-made records
pub mod fixtures {
    use super::ImportRecordBuilder;
    use pdprov_core::ImportRecord;

    /// Responder with both notification channels and two teams
    pub fn responder_with_phone(email: &str) -> ImportRecord {
        ImportRecordBuilder::new(email)
            .with_role("limited_user")
            .with_title("Engineer")
            .with_phone("1", "5550100")
            .with_teams(&["Ops", "Infra"])
            .build()
    }

    /// Plain user on one team, without a phone
    pub fn user_on_team(email: &str, team: &str) -> ImportRecord {
        ImportRecordBuilder::new(email).with_teams(&[team]).build()
    }

    /// `count` simple records `user1@example.com`, `user2@example.com`, ...
    pub fn numbered_users(count: usize, team: &str) -> Vec<ImportRecord> {
        (1..=count)
            .map(|i| user_on_team(&format!("user{i}@example.com"), team))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let record = ImportRecordBuilder::new("ada.lovelace@example.com").build();
        assert_eq!(record.email, "ada.lovelace@example.com");
        assert_eq!(record.name.as_deref(), Some("ada lovelace"));
        assert_eq!(record.base_role, None);
        assert_eq!(record.phone(), None);
    }

    #[test]
    fn test_fixtures() {
        let record = fixtures::responder_with_phone("ada@example.com");
        assert_eq!(record.phone(), Some(("1", "5550100")));
        assert_eq!(fixtures::numbered_users(3, "Ops").len(), 3);
    }
}
