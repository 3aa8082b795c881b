use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::token::Token;
use crate::error::{LoginError, Result};

/// Default location of the persisted token, relative to the working directory.
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Storage abstraction for the persisted token record.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<Token>>;
    fn save(&self, token: &Token) -> Result<()>;
    /// Human-readable location, used in progress output.
    fn location(&self) -> String;
}

/// File-backed token store writing pretty-printed JSON.
///
/// Every save truncates the file, so nothing from a previous token survives.
/// On Unix the file is restricted to mode `0600`, including files that
/// already existed with a looser mode.
///
/// # Example
/// ```no_run
/// use oauth_login::auth::{FileTokenStore, Token, TokenStore};
///
/// let store = FileTokenStore::new("token.json");
/// let token = Token {
///     access_token: "gho_123".to_string(),
///     token_type: "bearer".to_string(),
///     refresh_token: None,
///     expiry: None,
///     expires_in: None,
///     scope: None,
/// };
/// store.save(&token)?;
/// # Ok::<(), oauth_login::error::LoginError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LoginError::persist(&self.path, e))?;
            }
        }
        Ok(())
    }

    fn open_truncated(&self) -> std::io::Result<fs::File> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path)?;
        // `mode` only applies on creation.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        Ok(file)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Token>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LoginError::persist(&self.path, err)),
        };
        let token = serde_json::from_str(&raw).map_err(|e| LoginError::persist(&self.path, e))?;
        Ok(Some(token))
    }

    fn save(&self, token: &Token) -> Result<()> {
        self.ensure_parent()?;
        let mut serialized =
            serde_json::to_vec_pretty(token).map_err(|e| LoginError::persist(&self.path, e))?;
        serialized.push(b'\n');

        let mut file = self
            .open_truncated()
            .map_err(|e| LoginError::persist(&self.path, e))?;
        file.write_all(&serialized)
            .map_err(|e| LoginError::persist(&self.path, e))?;
        file.sync_all()
            .map_err(|e| LoginError::persist(&self.path, e))?;
        debug!(path = %self.path.display(), "token written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
