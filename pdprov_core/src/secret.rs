//! API token holder that zeros its memory when dropped

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// API token for the directory service
///
/// Never prints its value through `Debug` or `Display`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken {
    inner: String,
}

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            inner: token.trim().to_string(),
        }
    }

    /// Read the token for use in an authorization header
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretToken(***)")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl PartialEq for SecretToken {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.inner.as_bytes(), other.inner.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Eq for SecretToken {}

impl From<String> for SecretToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_not_printed() {
        let token = SecretToken::new("u+abcdef");
        assert_eq!(format!("{token:?}"), "SecretToken(***)");
        assert_eq!(format!("{token}"), "***");
        assert_eq!(token.expose(), "u+abcdef");
    }

    #[test]
    fn test_token_is_trimmed() {
        let token = SecretToken::new("  u+abcdef\n");
        assert_eq!(token.expose(), "u+abcdef");
        assert!(SecretToken::new("   ").is_empty());
    }

    #[test]
    fn test_equality() {
        assert_eq!(SecretToken::from("a"), SecretToken::from("a".to_string()));
        assert_ne!(SecretToken::from("a"), SecretToken::from("b"));
        assert_ne!(SecretToken::from("abc"), SecretToken::from("ab"));
        // compared after trimming
        assert_eq!(SecretToken::from(" abc "), SecretToken::from("abc"));
    }
}
