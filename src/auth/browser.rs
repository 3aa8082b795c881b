use tracing::debug;

use crate::error::{LoginError, Result};

/// Opens a URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// The host's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        debug!("opening system browser");
        webbrowser::open(url).map_err(|e| LoginError::BrowserLaunchFailed(e.to_string()))
    }
}
