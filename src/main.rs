//! oauth-login binary entry point.

use oauth_login::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("oauth_login=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    if let Err(e) = oauth_login::cli::login::handle_login(&cli).await {
        eprintln!("❌ {} failed: {e}", e.phase());
        std::process::exit(1);
    }
}
