#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use oauth_login::auth::{BrowserLauncher, LoginEvent, LoginEventSink, Token, TokenStore};
use oauth_login::config::LoginConfig;
use oauth_login::error::{LoginError, Result};
use reqwest::Url;

#[derive(Default)]
pub struct InMemoryTokenStore {
    token: Mutex<Option<Token>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Token> {
        self.token.lock().expect("store lock poisoned").clone()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Result<Option<Token>> {
        Ok(self.get())
    }

    fn save(&self, token: &Token) -> Result<()> {
        *self.token.lock().expect("store lock poisoned") = Some(token.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

type QueryFor = dyn Fn(&str) -> String + Send + Sync;

/// Stands in for the user's browser and the provider: on `open`, it
/// "redirects" to the callback with a query built from the request's state.
pub struct RedirectingBrowser {
    query_for: Box<QueryFor>,
    opened: Mutex<Vec<String>>,
    responses: Arc<Mutex<Vec<u16>>>,
}

impl RedirectingBrowser {
    pub fn new(query_for: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            query_for: Box::new(query_for),
            opened: Mutex::new(Vec::new()),
            responses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Redirect with `code` and the request's own state.
    pub fn with_code(code: &str) -> Self {
        let code = code.to_string();
        Self::new(move |state| format!("code={code}&state={state}"))
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("browser lock poisoned").clone()
    }

    pub fn responses(&self) -> Vec<u16> {
        self.responses.lock().expect("browser lock poisoned").clone()
    }
}

impl BrowserLauncher for RedirectingBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.opened
            .lock()
            .expect("browser lock poisoned")
            .push(url.to_string());

        let params = query_map(url);
        let state = params.get("state").cloned().unwrap_or_default();
        let redirect_uri = params
            .get("redirect_uri")
            .cloned()
            .expect("authorize url carries redirect_uri")
            .replacen("localhost", "127.0.0.1", 1);
        let target = format!("{redirect_uri}?{}", (self.query_for)(&state));
        let responses = self.responses.clone();
        tokio::spawn(async move {
            if let Ok(resp) = reqwest::get(&target).await {
                responses
                    .lock()
                    .expect("browser lock poisoned")
                    .push(resp.status().as_u16());
            }
        });
        Ok(())
    }
}

/// Browser that cannot be launched.
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Err(LoginError::BrowserLaunchFailed("no browser available".to_string()))
    }
}

/// Browser that opens but never comes back.
pub struct SilentBrowser;

impl BrowserLauncher for SilentBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

pub fn query_map(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .expect("valid url")
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Config pointed at a mock token endpoint, an ephemeral callback port and
/// a token file under `dir`.
pub fn test_config(token_url: &str, dir: &Path) -> LoginConfig {
    let mut config = LoginConfig::new("abc", "client-secret");
    config.scopes = ["read:user".to_string()].into_iter().collect();
    config.endpoints.token_url = token_url.to_string();
    config.callback.port = 0;
    config.token_path = dir.join("token.json");
    config
}

/// Event sink that records every event.
pub fn recording_sink() -> (LoginEventSink, Arc<Mutex<Vec<LoginEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: LoginEventSink = Arc::new(move |event: &LoginEvent| {
        captured
            .lock()
            .expect("events lock poisoned")
            .push(event.clone());
    });
    (sink, events)
}

pub fn token(access_token: &str) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "bearer".to_string(),
        refresh_token: None,
        expiry: None,
        expires_in: None,
        scope: None,
    }
}
