//! CLI entry point for oauth-login.

pub mod login;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::LoginConfig;

/// Log in with the OAuth2 authorization-code flow and save the token.
///
/// Credentials come from GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET (a `.env`
/// file in the working directory is read first).
#[derive(Parser, Debug, Default)]
#[command(name = "oauth-login", version, about)]
pub struct Cli {
    /// Local port for the redirect listener (must match the registered redirect URL)
    #[arg(long)]
    pub port: Option<u16>,

    /// Where to write the token
    #[arg(long)]
    pub token_path: Option<PathBuf>,

    /// Give up if the browser step is not completed within this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Accept invalid TLS certificates from the token endpoint (local development only)
    #[arg(long)]
    pub insecure_skip_tls_verify: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Layer explicit flags over the loaded configuration.
    pub fn apply(&self, config: &mut LoginConfig) {
        if let Some(port) = self.port {
            config.callback.port = port;
        }
        if let Some(path) = &self.token_path {
            config.token_path = path.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.callback_timeout = Some(Duration::from_secs(secs));
        }
        if self.insecure_skip_tls_verify {
            config.insecure_skip_verify = true;
        }
    }
}
