//! Per-run context shared by the engine and the REST adapter

use serde::{Deserialize, Serialize};

/// Who is running the import, and against which account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Email of the operator, sent as the `From` header on writes
    pub requester_identity: Option<String>,
    /// Account label shown in confirmation prompts
    pub account: Option<String>,
}

impl RunContext {
    pub fn new(requester_identity: Option<String>, account: Option<String>) -> Self {
        Self {
            requester_identity: requester_identity.filter(|s| !s.trim().is_empty()),
            account: account.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Account label, or a generic fallback
    pub fn account_label(&self) -> &str {
        self.account.as_deref().unwrap_or("the configured account")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_dropped() {
        let context = RunContext::new(Some("  ".to_string()), Some("acme".to_string()));
        assert_eq!(context.requester_identity, None);
        assert_eq!(context.account_label(), "acme");
        assert_eq!(RunContext::default().account_label(), "the configured account");
    }
}
