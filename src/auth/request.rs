use std::collections::BTreeSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::config::ProviderEndpoints;
use crate::error::{LoginError, Result};

/// PKCE verifier and its S256 challenge.
#[derive(Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = URL_SAFE_NO_PAD.encode(random_bytes::<32>());
        let challenge = compute_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl std::fmt::Debug for Pkce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkce")
            .field("verifier", &"..")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// The parameters of one authorization attempt. Built once per run.
///
/// # Example
/// ```
/// use oauth_login::auth::AuthorizationRequest;
/// use oauth_login::config::ProviderEndpoints;
///
/// let request = AuthorizationRequest::new(
///     "abc",
///     ["read:user"],
///     "http://localhost:9999/oauth/callback",
/// );
/// let url = request.authorize_url(&ProviderEndpoints::default())?;
/// assert!(url.contains("client_id=abc"));
/// # Ok::<(), oauth_login::error::LoginError>(())
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    client_id: String,
    scopes: BTreeSet<String>,
    redirect_uri: String,
    state: String,
    pkce: Option<Pkce>,
}

impl AuthorizationRequest {
    /// New request with a fresh random `state` and no PKCE.
    pub fn new<S: Into<String>>(
        client_id: impl Into<String>,
        scopes: impl IntoIterator<Item = S>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            redirect_uri: redirect_uri.into(),
            state: generate_state(),
            pkce: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_pkce(mut self, pkce: Pkce) -> Self {
        self.pkce = Some(pkce);
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn code_verifier(&self) -> Option<&str> {
        self.pkce.as_ref().map(|p| p.verifier.as_str())
    }

    /// Provider consent URL for this request.
    pub fn authorize_url(&self, endpoints: &ProviderEndpoints) -> Result<String> {
        let mut url = Url::parse(&endpoints.authorize_url).map_err(|e| {
            LoginError::config_invalid("OAUTH_AUTHORIZE_URL", format!("{e}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("access_type", "offline")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code");
            if !self.scopes.is_empty() {
                let scope = self.scopes.iter().map(String::as_str).collect::<Vec<_>>();
                query.append_pair("scope", &scope.join(" "));
            }
            query.append_pair("state", &self.state);
            if let Some(pkce) = &self.pkce {
                query
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }
        Ok(url.into())
    }
}

/// Random per-run anti-forgery value (64 hex chars).
pub fn generate_state() -> String {
    hex_encode(&random_bytes::<32>())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len();
        chunk.copy_from_slice(&id.as_bytes()[..len]);
    }
    buf
}

fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
