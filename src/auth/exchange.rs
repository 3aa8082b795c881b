use chrono::{DateTime, Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use super::callback::AuthorizationCode;
use super::request::AuthorizationRequest;
use super::token::Token;
use crate::config::LoginConfig;
use crate::error::{LoginError, Result};

/// Swaps an authorization code for a token at the provider's token endpoint.
///
/// Single attempt, no retries.
///
/// # Example
/// ```no_run
/// use oauth_login::auth::TokenExchanger;
/// use oauth_login::config::LoginConfig;
///
/// let config = LoginConfig::new("client-id", "client-secret");
/// let exchanger = TokenExchanger::new(&config)?;
/// # Ok::<(), oauth_login::error::LoginError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenExchanger {
    pub fn new(config: &LoginConfig) -> Result<Self> {
        if config.insecure_skip_verify {
            warn!(
                token_url = %config.endpoints.token_url,
                "TLS certificate verification is DISABLED for the token exchange"
            );
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| LoginError::config_invalid("http client", e.to_string()))?;
        Ok(Self {
            client,
            token_url: config.endpoints.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Exchange `code`, which must come from the callback of `request`.
    pub async fn exchange(
        &self,
        code: &AuthorizationCode,
        request: &AuthorizationRequest,
    ) -> Result<Token> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", request.redirect_uri()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(verifier) = request.code_verifier() {
            form.push(("code_verifier", verifier));
        }

        debug!(token_url = %self.token_url, "exchanging authorization code");
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = resp.text().await?;
        let payload = parse_token_response(&content_type, &body);

        if !status.is_success() {
            let reason = payload
                .ok()
                .and_then(|p| p.error_message())
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(LoginError::ExchangeFailed(format!(
                "Token endpoint returned status {status}: {reason}"
            )));
        }

        let payload = payload?;
        if let Some(reason) = payload.error_message() {
            return Err(LoginError::ExchangeFailed(format!(
                "Provider rejected the code: {reason}"
            )));
        }
        payload.into_token()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<serde_json::Value>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_deref().filter(|e| !e.is_empty())?;
        Some(match self.error_description.as_deref() {
            Some(description) if !description.is_empty() => format!("{error} ({description})"),
            _ => error.to_string(),
        })
    }

    fn into_token(self) -> Result<Token> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                LoginError::ExchangeFailed("Token response missing access_token".to_string())
            })?;
        let expires_in = self
            .expires_in
            .map(|value| parse_expires_in(&value))
            .transpose()?
            .filter(|secs| *secs != 0);
        let expiry = expires_in.map(expiry_after).transpose()?;
        Ok(Token {
            access_token,
            token_type: self
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "bearer".to_string()),
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expiry,
            expires_in,
            scope: self.scope.filter(|s| !s.is_empty()),
        })
    }
}

fn expiry_after(secs: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(secs)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| {
            LoginError::ExchangeFailed(format!("Token response expires_in out of range: {secs}"))
        })
}

/// Accepts JSON bodies as well as form-encoded ones, which some providers
/// still send when they ignore `Accept`.
fn parse_token_response(content_type: &str, body: &str) -> Result<TokenResponse> {
    let form_encoded = content_type.starts_with("application/x-www-form-urlencoded")
        || content_type.starts_with("text/plain");
    if !form_encoded {
        return serde_json::from_str(body).map_err(|e| {
            LoginError::ExchangeFailed(format!("Malformed token response: {e}"))
        });
    }

    let url = Url::parse(&format!("http://localhost/?{}", body.trim()))
        .map_err(|e| LoginError::ExchangeFailed(format!("Malformed token response: {e}")))?;
    let mut payload = TokenResponse::default();
    for (key, value) in url.query_pairs() {
        let value = value.into_owned();
        match key.as_ref() {
            "access_token" => payload.access_token = Some(value),
            "token_type" => payload.token_type = Some(value),
            "refresh_token" => payload.refresh_token = Some(value),
            "expires_in" => payload.expires_in = Some(serde_json::Value::String(value)),
            "scope" => payload.scope = Some(value),
            "error" => payload.error = Some(value),
            "error_description" => payload.error_description = Some(value),
            _ => {}
        }
    }
    Ok(payload)
}

fn parse_expires_in(value: &serde_json::Value) -> Result<i64> {
    if let Some(secs) = value.as_i64() {
        return Ok(secs);
    }
    if let Some(text) = value.as_str() {
        if text.is_empty() {
            return Ok(0);
        }
        return text.parse().map_err(|_| {
            LoginError::ExchangeFailed(format!("Token response expires_in invalid: {text}"))
        });
    }
    if value.is_null() {
        return Ok(0);
    }
    Err(LoginError::ExchangeFailed(format!(
        "Token response expires_in invalid: {value}"
    )))
}
