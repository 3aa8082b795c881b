//! CLI login command handler.

use std::sync::Arc;

use super::Cli;
use crate::auth::flow::{LoginEvent, LoginFlow};
use crate::config::LoginConfig;
use crate::error::Result;

/// Handle `oauth-login`.
pub async fn handle_login(cli: &Cli) -> Result<()> {
    let mut config = LoginConfig::from_env()?;
    cli.apply(&mut config);

    let flow = LoginFlow::new(config).with_event_sink(Arc::new(print_event));
    let token = flow.run().await?;

    println!("✅ Authentication successful");
    if let Some(expiry) = token.expiry {
        println!("   Expires: {}", expiry.format("%Y-%m-%d %H:%M UTC"));
    }
    let scopes = token.scopes();
    if !scopes.is_empty() {
        println!("   Scopes: {}", scopes.join(", "));
    }
    Ok(())
}

fn print_event(event: &LoginEvent) {
    match event {
        LoginEvent::Listening { .. } => {}
        LoginEvent::AuthorizeUrl { url } => {
            println!("🔗 Opening your browser to visit:");
            println!("{url}");
        }
        LoginEvent::BrowserOpened => {}
        LoginEvent::WaitingForCallback => println!("⏳ Waiting for authorization..."),
        LoginEvent::CallbackReceived => println!("📋 Authorization code received"),
        LoginEvent::TokenSaved { location } => println!("💾 Token written to {location}"),
    }
}
