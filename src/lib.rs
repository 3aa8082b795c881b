//! One-shot OAuth2 authorization-code login for the terminal.
//!
//! Opens the provider consent page in the browser, catches the redirect on a
//! short-lived local listener, exchanges the code for a token and writes the
//! token to disk with owner-only permissions.
//!
//! # Quick Start
//!
//! ```no_run
//! use oauth_login::auth::LoginFlow;
//! use oauth_login::config::LoginConfig;
//!
//! # async fn example() -> oauth_login::error::Result<()> {
//! let config = LoginConfig::from_env()?;
//! let token = LoginFlow::new(config).run().await?;
//! assert!(token.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod util;
