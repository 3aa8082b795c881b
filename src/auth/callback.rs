//! Short-lived local HTTP listener that catches the provider redirect.
//!
//! The listener owns its own router. The callback route hands exactly one
//! outcome (a code or an error) to the waiting flow through a take-once
//! one-shot sender; every later request to the route is answered but ignored,
//! and requests to any other path get a plain 404.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use strum::Display;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CallbackConfig;
use crate::error::{LoginError, Result};
use crate::util::timeout::with_optional_timeout;

const SUCCESS_HTML: &str = "<!DOCTYPE html><html><head><title>Login</title></head><body>\
<p><strong>Authentication successful</strong>. You may now close this tab.</p></body></html>";
const FAILURE_HTML: &str = "<!DOCTYPE html><html><head><title>Login</title></head><body>\
<p><strong>Authentication failed</strong>. Check the terminal for details, then close this tab.</p></body></html>";
const ALREADY_HANDLED_HTML: &str = "<!DOCTYPE html><html><head><title>Login</title></head><body>\
<p>This login has already been completed. You may close this tab.</p></body></html>";

/// Single-use code issued by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationCode(..)")
    }
}

/// Lifecycle of the callback listener. Traversed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ListenerState {
    Idle,
    Listening,
    CallbackReceived,
    ShuttingDown,
    Stopped,
    Failed,
}

type CallbackOutcome = Result<AuthorizationCode>;

/// Unbound listener configuration.
#[derive(Debug, Clone)]
pub struct CallbackListener {
    addr: SocketAddr,
    path: String,
    expected_state: Option<String>,
}

impl CallbackListener {
    pub fn new(addr: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            addr,
            path: path.into(),
            expected_state: None,
        }
    }

    pub fn from_config(config: &CallbackConfig) -> Self {
        Self::new(config.bind_addr(), config.path.clone())
    }

    /// Reject callbacks whose `state` differs from `state`.
    pub fn with_expected_state(mut self, state: impl Into<String>) -> Self {
        self.expected_state = Some(state.into());
        self
    }

    /// Bind the socket and start serving. Returns once the port accepts
    /// connections.
    pub async fn bind(self) -> Result<CallbackServer> {
        if !self.path.starts_with('/') {
            return Err(LoginError::config_invalid(
                "callback path",
                format!("'{}' must start with '/'", self.path),
            ));
        }
        let bind_failed = |e: std::io::Error| LoginError::ListenerBindFailed {
            addr: self.addr.to_string(),
            message: e.to_string(),
        };
        let listener = TcpListener::bind(self.addr).await.map_err(&bind_failed)?;
        let local_addr = listener.local_addr().map_err(&bind_failed)?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let slot = CallbackSlot {
            sender: Arc::new(Mutex::new(Some(outcome_tx))),
            expected_state: self.expected_state.map(Arc::from),
        };
        let router = callback_router(&self.path, slot);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(addr = %local_addr, path = %self.path, "callback listener ready");

        Ok(CallbackServer {
            local_addr,
            state: ListenerState::Listening,
            outcome_rx: Some(outcome_rx),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A bound, serving callback listener.
#[derive(Debug)]
pub struct CallbackServer {
    local_addr: SocketAddr,
    state: ListenerState,
    outcome_rx: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Suspend until the callback delivers a code or an error.
    ///
    /// The outcome can be read once; a second call fails.
    pub async fn wait_for_callback(&mut self, limit: Option<Duration>) -> Result<AuthorizationCode> {
        let Some(receiver) = self.outcome_rx.take() else {
            return Err(LoginError::CallbackMalformed(
                "callback outcome was already consumed".to_string(),
            ));
        };
        let outcome = with_optional_timeout(limit, async move {
            match receiver.await {
                Ok(outcome) => outcome,
                Err(_) => Err(LoginError::CallbackMalformed(
                    "listener stopped before a callback arrived".to_string(),
                )),
            }
        })
        .await;

        self.state = match &outcome {
            Ok(_) => ListenerState::CallbackReceived,
            Err(_) => ListenerState::Failed,
        };
        debug!(state = %self.state, "callback wait finished");
        outcome
    }

    /// Stop accepting connections, let the in-flight response finish, and
    /// release the socket. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        if self.state != ListenerState::Failed {
            self.state = ListenerState::ShuttingDown;
        }
        self.outcome_rx = None;
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let result = match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(LoginError::ShutdownFailed(format!(
                "callback listener error: {err}"
            ))),
            Err(err) => Err(LoginError::ShutdownFailed(format!(
                "callback listener task failed: {err}"
            ))),
        };
        match (&result, self.state) {
            (Ok(()), ListenerState::ShuttingDown) => self.state = ListenerState::Stopped,
            (Ok(()), _) => {}
            (Err(_), _) => self.state = ListenerState::Failed,
        }
        info!(addr = %self.local_addr, state = %self.state, "callback listener shut down");
        result
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Clone)]
struct CallbackSlot {
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
    expected_state: Option<Arc<str>>,
}

impl CallbackSlot {
    fn take_sender(&self) -> Option<oneshot::Sender<CallbackOutcome>> {
        self.sender.lock().ok().and_then(|mut guard| guard.take())
    }
}

fn callback_router(path: &str, slot: CallbackSlot) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .fallback(handle_unrelated)
        .with_state(slot)
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(sender) = slot.take_sender() else {
        debug!("callback already delivered, ignoring repeat request");
        return (StatusCode::CONFLICT, Html(ALREADY_HANDLED_HTML)).into_response();
    };

    let outcome = parse_callback_query(query.as_deref(), slot.expected_state.as_deref());
    let response = match &outcome {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_HTML)),
        Err(err) => {
            warn!(error = %err, "callback rejected");
            (StatusCode::BAD_REQUEST, Html(FAILURE_HTML))
        }
    };
    if sender.send(outcome).is_err() {
        debug!("no one is waiting for the callback any more");
    }
    response.into_response()
}

async fn handle_unrelated(uri: Uri) -> impl IntoResponse {
    debug!(path = %uri.path(), "ignoring unrelated request");
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Interpret the callback query string.
///
/// `error` wins over `code`; a missing or empty `code` without `error` is
/// malformed. When `expected_state` is set the callback must echo it.
pub fn parse_callback_query(
    query: Option<&str>,
    expected_state: Option<&str>,
) -> Result<AuthorizationCode> {
    let url = Url::parse(&format!("http://localhost/?{}", query.unwrap_or_default()))
        .map_err(|e| LoginError::CallbackMalformed(format!("unparseable query: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        let field = match key.as_ref() {
            "code" => &mut code,
            "state" => &mut state,
            "error" => &mut error,
            "error_description" => &mut error_description,
            _ => continue,
        };
        if field.is_none() {
            *field = Some(value.into_owned());
        }
    }

    if let Some(error) = error.filter(|e: &String| !e.is_empty()) {
        return Err(LoginError::ProviderDenied {
            error,
            description: error_description.filter(|d: &String| !d.is_empty()),
        });
    }
    let code = code.filter(|c: &String| !c.is_empty()).ok_or_else(|| {
        LoginError::CallbackMalformed("callback carried neither `code` nor `error`".to_string())
    })?;
    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Err(LoginError::StateMismatch);
        }
    }
    Ok(AuthorizationCode(code))
}
