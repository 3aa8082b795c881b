//! Configuration system (layered: CLI overrides > env > `.env` file > defaults).

use std::collections::BTreeSet;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::auth::store::DEFAULT_TOKEN_PATH;
use crate::error::{LoginError, Result};

pub const CLIENT_ID_VAR: &str = "GITHUB_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "GITHUB_CLIENT_SECRET";

const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const DEFAULT_SCOPES: &[&str] = &["read:org", "read:user", "read:project", "public_repo", "gist"];

/// Fixed local port the provider redirects back to.
pub const DEFAULT_CALLBACK_PORT: u16 = 9999;
pub const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";

/// Provider endpoint metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

/// Where the callback listener binds and what the redirect URI looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackConfig {
    pub port: u16,
    pub path: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            path: DEFAULT_CALLBACK_PATH.to_string(),
        }
    }
}

impl CallbackConfig {
    /// Loopback address to bind. Port `0` asks the OS for a free port.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    /// Redirect URI for a listener actually bound to `port`.
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://localhost:{port}{}", self.path)
    }
}

/// Everything a login run needs.
#[derive(Clone)]
pub struct LoginConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
    pub endpoints: ProviderEndpoints,
    pub callback: CallbackConfig,
    pub token_path: PathBuf,
    /// Skip TLS certificate verification on the token exchange. Opt-in only.
    pub insecure_skip_verify: bool,
    /// `None` waits for the callback indefinitely.
    pub callback_timeout: Option<Duration>,
    pub use_pkce: bool,
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("scopes", &self.scopes)
            .field("endpoints", &self.endpoints)
            .field("callback", &self.callback)
            .field("token_path", &self.token_path)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("callback_timeout", &self.callback_timeout)
            .field("use_pkce", &self.use_pkce)
            .finish()
    }
}

impl LoginConfig {
    /// Config with the default provider and the given credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            endpoints: ProviderEndpoints::default(),
            callback: CallbackConfig::default(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            insecure_skip_verify: false,
            callback_timeout: None,
            use_pkce: true,
        }
    }

    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            debug!(error = %err, "no .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, map, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let client_id =
            get(CLIENT_ID_VAR).ok_or_else(|| LoginError::ConfigMissing(CLIENT_ID_VAR.into()))?;
        let client_secret = get(CLIENT_SECRET_VAR)
            .ok_or_else(|| LoginError::ConfigMissing(CLIENT_SECRET_VAR.into()))?;
        let mut config = Self::new(client_id, client_secret);

        if let Some(raw) = get("OAUTH_SCOPES") {
            config.scopes = parse_scopes(&raw);
        }
        if let Some(url) = get("OAUTH_AUTHORIZE_URL") {
            config.endpoints.authorize_url = url;
        }
        if let Some(url) = get("OAUTH_TOKEN_URL") {
            config.endpoints.token_url = url;
        }
        if let Some(raw) = get("OAUTH_CALLBACK_PORT") {
            config.callback.port = raw
                .parse()
                .map_err(|e| LoginError::config_invalid("OAUTH_CALLBACK_PORT", format!("{e}")))?;
        }
        if let Some(path) = get("OAUTH_TOKEN_PATH") {
            config.token_path = PathBuf::from(path);
        }
        if let Some(raw) = get("OAUTH_INSECURE_SKIP_VERIFY") {
            config.insecure_skip_verify = parse_bool("OAUTH_INSECURE_SKIP_VERIFY", &raw)?;
        }
        if let Some(raw) = get("OAUTH_CALLBACK_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|e| {
                LoginError::config_invalid("OAUTH_CALLBACK_TIMEOUT_SECS", format!("{e}"))
            })?;
            config.callback_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(raw) = get("OAUTH_USE_PKCE") {
            config.use_pkce = parse_bool("OAUTH_USE_PKCE", &raw)?;
        }

        if config.scopes.is_empty() {
            return Err(LoginError::config_invalid(
                "OAUTH_SCOPES",
                "at least one scope is required",
            ));
        }
        Ok(config)
    }
}

fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LoginError::config_invalid(
            key,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
