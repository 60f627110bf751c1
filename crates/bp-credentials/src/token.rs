// token.rs — Opaque push token.

use std::fmt;

/// A push-capable access token for a hosted repository.
///
/// Formatting never prints the value. Callers that need the raw token (to
/// build a remote URL, for example) must call [`SecretToken::expose`], and
/// should scrub it from any text they log afterwards with
/// [`SecretToken::redact`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Replace every occurrence of the token in `text` with `***`.
    pub fn redact(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        text.replace(self.0.as_str(), "***")
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_hides_value() {
        let token = SecretToken::new("ghp_supersecret");
        assert_eq!(format!("{}", token), "***");
        assert_eq!(format!("{:?}", token), "SecretToken(***)");
        assert!(!format!("{:?}", Some(&token)).contains("supersecret"));
    }

    #[test]
    fn expose_returns_raw_value() {
        let token = SecretToken::new("abc123");
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn redact_scrubs_embedded_token() {
        let token = SecretToken::new("abc123");
        let msg = "fatal: unable to access 'https://abc123@github.com/acme/data.git/'";
        assert_eq!(
            token.redact(msg),
            "fatal: unable to access 'https://***@github.com/acme/data.git/'"
        );
    }

    #[test]
    fn whitespace_token_is_empty() {
        assert!(SecretToken::new("  \n").is_empty());
        assert!(!SecretToken::new("x").is_empty());
    }
}
