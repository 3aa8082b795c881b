//! The login run: listen, authorize, wait, exchange, validate, persist.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use super::browser::{BrowserLauncher, SystemBrowser};
use super::callback::{CallbackListener, CallbackServer};
use super::exchange::TokenExchanger;
use super::request::{generate_state, AuthorizationRequest, Pkce};
use super::store::{FileTokenStore, TokenStore};
use super::token::Token;
use crate::config::LoginConfig;
use crate::error::{LoginError, Result};

/// Progress notifications emitted during a run.
#[derive(Debug, Clone)]
pub enum LoginEvent {
    Listening { addr: SocketAddr },
    AuthorizeUrl { url: String },
    BrowserOpened,
    WaitingForCallback,
    CallbackReceived,
    TokenSaved { location: String },
}

/// Callback receiving [`LoginEvent`]s.
pub type LoginEventSink = Arc<dyn Fn(&LoginEvent) + Send + Sync>;

/// One interactive authorization-code login.
///
/// # Example
/// ```no_run
/// use oauth_login::auth::LoginFlow;
/// use oauth_login::config::LoginConfig;
///
/// # async fn example() -> oauth_login::error::Result<()> {
/// let config = LoginConfig::from_env()?;
/// let token = LoginFlow::new(config).run().await?;
/// println!("logged in with a {} token", token.token_type);
/// # Ok(())
/// # }
/// ```
pub struct LoginFlow {
    config: LoginConfig,
    browser: Arc<dyn BrowserLauncher>,
    store: Arc<dyn TokenStore>,
    event_sink: Option<LoginEventSink>,
}

impl LoginFlow {
    pub fn new(config: LoginConfig) -> Self {
        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        Self {
            config,
            browser: Arc::new(SystemBrowser),
            store,
            event_sink: None,
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_event_sink(mut self, sink: LoginEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Run the whole flow once. Every error is terminal.
    pub async fn run(&self) -> Result<Token> {
        let exchanger = TokenExchanger::new(&self.config)?;

        // The listener must accept connections before the browser can redirect.
        let state = generate_state();
        let mut server = CallbackListener::from_config(&self.config.callback)
            .with_expected_state(state.clone())
            .bind()
            .await?;
        let addr = server.local_addr();
        self.emit(LoginEvent::Listening { addr });

        let mut request = AuthorizationRequest::new(
            self.config.client_id.clone(),
            &self.config.scopes,
            self.config.callback.redirect_uri(addr.port()),
        )
        .with_state(state);
        if self.config.use_pkce {
            request = request.with_pkce(Pkce::generate());
        }

        let url = match request.authorize_url(&self.config.endpoints) {
            Ok(url) => url,
            Err(err) => return Err(release(&mut server, err).await),
        };
        self.emit(LoginEvent::AuthorizeUrl { url: url.clone() });

        if let Err(err) = self.browser.open(&url) {
            return Err(release(&mut server, err).await);
        }
        self.emit(LoginEvent::BrowserOpened);

        self.emit(LoginEvent::WaitingForCallback);
        let code = match server.wait_for_callback(self.config.callback_timeout).await {
            Ok(code) => code,
            Err(err) => return Err(release(&mut server, err).await),
        };
        self.emit(LoginEvent::CallbackReceived);
        server.shutdown().await?;

        let token = exchanger.exchange(&code, &request).await?;
        if !token.is_valid() {
            return Err(LoginError::TokenInvalid(match token.expiry {
                Some(expiry) => format!("token expires at {expiry}"),
                None => "empty access token".to_string(),
            }));
        }
        info!(token_type = %token.token_type, "token exchanged");

        self.store.save(&token)?;
        self.emit(LoginEvent::TokenSaved {
            location: self.store.location(),
        });
        Ok(token)
    }

    fn emit(&self, event: LoginEvent) {
        if let Some(sink) = &self.event_sink {
            sink(&event);
        }
    }
}

/// Shut the listener down on an error path, keeping the original error.
async fn release(server: &mut CallbackServer, err: LoginError) -> LoginError {
    if let Err(shutdown_err) = server.shutdown().await {
        warn!(error = %shutdown_err, "callback listener did not shut down cleanly");
    }
    err
}
