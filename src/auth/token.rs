use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before `expiry` at which a token already counts as expired.
const EXPIRY_DELTA_SECS: i64 = 10;

/// OAuth access token as returned by the token endpoint and written to disk.
///
/// # Example
/// ```
/// use oauth_login::auth::Token;
/// use chrono::{Duration, Utc};
///
/// let token = Token {
///     access_token: "gho_123".to_string(),
///     token_type: "bearer".to_string(),
///     refresh_token: None,
///     expiry: Some(Utc::now() + Duration::hours(1)),
///     expires_in: Some(3600),
///     scope: Some("read:user".to_string()),
/// };
/// assert!(token.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    /// Whether the token carries an access token that is not about to expire.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    /// A token without expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_DELTA_SECS) < now,
            None => false,
        }
    }

    /// Scopes granted by the provider, split on commas or whitespace.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|raw| {
                raw.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
