//! Error types for the login flow.

use std::path::PathBuf;

use strum::Display;
use thiserror::Error;

/// Phase of the login run an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LoginPhase {
    Configuration,
    Browser,
    Listener,
    Callback,
    Exchange,
    Validation,
    Persistence,
    Shutdown,
}

/// Every failure of a login run. All of them are terminal.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("{0} is not set")]
    ConfigMissing(String),

    #[error("Invalid value for {key}: {message}")]
    ConfigInvalid { key: String, message: String },

    #[error("Could not open a browser: {0}")]
    BrowserLaunchFailed(String),

    #[error("Could not bind callback listener on {addr}: {message}")]
    ListenerBindFailed { addr: String, message: String },

    #[error("Malformed callback: {0}")]
    CallbackMalformed(String),

    #[error("Callback state does not match this login attempt")]
    StateMismatch,

    #[error("Provider denied authorization: {}", describe_denial(.error, .description.as_deref()))]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    #[error("No callback received within {0}ms")]
    CallbackTimeout(u64),

    #[error("{0}")]
    ExchangeFailed(String),

    #[error("Provider returned an unusable token: {0}")]
    TokenInvalid(String),

    #[error("Could not write {}: {message}", .path.display())]
    PersistFailed { path: PathBuf, message: String },

    #[error("{0}")]
    ShutdownFailed(String),
}

impl LoginError {
    /// Classify this error by the phase that produced it.
    pub fn phase(&self) -> LoginPhase {
        match self {
            Self::ConfigMissing(_) | Self::ConfigInvalid { .. } => LoginPhase::Configuration,
            Self::BrowserLaunchFailed(_) => LoginPhase::Browser,
            Self::ListenerBindFailed { .. } => LoginPhase::Listener,
            Self::CallbackMalformed(_)
            | Self::StateMismatch
            | Self::ProviderDenied { .. }
            | Self::CallbackTimeout(_) => LoginPhase::Callback,
            Self::ExchangeFailed(_) => LoginPhase::Exchange,
            Self::TokenInvalid(_) => LoginPhase::Validation,
            Self::PersistFailed { .. } => LoginPhase::Persistence,
            Self::ShutdownFailed(_) => LoginPhase::Shutdown,
        }
    }

    pub(crate) fn config_invalid(key: &str, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::PersistFailed {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for LoginError {
    fn from(error: reqwest::Error) -> Self {
        Self::ExchangeFailed(format!("Token request failed: {error}"))
    }
}

fn describe_denial(error: &str, description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => format!("{error} ({description})"),
        _ => error.to_string(),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LoginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_phase() {
        let cases = [
            (
                LoginError::ConfigMissing("GITHUB_CLIENT_ID".into()),
                LoginPhase::Configuration,
            ),
            (
                LoginError::BrowserLaunchFailed("no display".into()),
                LoginPhase::Browser,
            ),
            (
                LoginError::ListenerBindFailed {
                    addr: "127.0.0.1:9999".into(),
                    message: "in use".into(),
                },
                LoginPhase::Listener,
            ),
            (
                LoginError::CallbackMalformed("no code".into()),
                LoginPhase::Callback,
            ),
            (
                LoginError::ProviderDenied {
                    error: "access_denied".into(),
                    description: None,
                },
                LoginPhase::Callback,
            ),
            (
                LoginError::ExchangeFailed("bad code".into()),
                LoginPhase::Exchange,
            ),
            (
                LoginError::TokenInvalid("expired".into()),
                LoginPhase::Validation,
            ),
            (
                LoginError::persist("token.json", "disk full"),
                LoginPhase::Persistence,
            ),
            (
                LoginError::ShutdownFailed("join".into()),
                LoginPhase::Shutdown,
            ),
        ];
        for (error, phase) in cases {
            assert_eq!(error.phase(), phase, "{error}");
        }
    }

    #[test]
    fn denial_message_includes_description() {
        let error = LoginError::ProviderDenied {
            error: "access_denied".into(),
            description: Some("The user has denied your application access.".into()),
        };
        assert_eq!(
            error.to_string(),
            "Provider denied authorization: access_denied (The user has denied your application access.)"
        );
    }

    #[test]
    fn denial_message_without_description() {
        let error = LoginError::ProviderDenied {
            error: "access_denied".into(),
            description: None,
        };
        assert_eq!(
            error.to_string(),
            "Provider denied authorization: access_denied"
        );
    }

    #[test]
    fn phase_displays_lowercase() {
        assert_eq!(LoginPhase::Exchange.to_string(), "exchange");
    }
}
