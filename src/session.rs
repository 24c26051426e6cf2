//! Persisted session state: bearer token and authenticated user.
//!
//! Two key files under the app data dir hold the session. All operations
//! are synchronous; a store without a usable directory (no platform data
//! dir, or explicitly disabled for tests) turns every read into `None`
//! and every write into a no-op.

use crate::api::types::AuthUser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

const TOKEN_FILE: &str = "auth_token";
const USER_FILE: &str = "auth_user.json";

/// File-backed session store, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: Arc<Option<PathBuf>>,
}

impl SessionStore {
    /// Store rooted at the platform data dir, or disabled when none exists.
    #[must_use]
    pub fn open_default() -> Self {
        match crate::app_dirs::data_dir() {
            Some(dir) => Self::at(dir),
            None => Self::disabled(),
        }
    }

    /// Store rooted at an explicit directory.
    #[must_use]
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(Some(dir.into())),
        }
    }

    /// Store with no backing directory: reads return `None`, writes are
    /// no-ops.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            root: Arc::new(None),
        }
    }

    fn path(&self, file: &str) -> Option<PathBuf> {
        self.root.as_ref().as_ref().map(|r| r.join(file))
    }

    fn read(&self, file: &str) -> Option<String> {
        let path = self.path(file)?;
        std::fs::read_to_string(path).ok()
    }

    fn write(&self, file: &str, contents: &str) {
        let Some(path) = self.path(file) else { return };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("cannot create session dir {}: {e}", parent.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&path, contents) {
            warn!("cannot persist {}: {e}", path.display());
        }
    }

    fn remove(&self, file: &str) {
        let Some(path) = self.path(file) else { return };
        // Removing an absent key is not an error.
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("cannot remove {}: {e}", path.display()),
        }
    }

    /// The stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let raw = self.read(TOKEN_FILE)?;
        let token = raw.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_owned())
        }
    }

    /// Persist a bearer token.
    pub fn set_token(&self, token: &str) {
        self.write(TOKEN_FILE, token);
    }

    /// Forget the bearer token.
    pub fn remove_token(&self) {
        self.remove(TOKEN_FILE);
    }

    /// The stored user record, if present and parseable.
    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        let raw = self.read(USER_FILE)?;
        serde_json::from_str(&raw).ok()
    }

    /// Persist the authenticated user record.
    pub fn set_user(&self, user: &AuthUser) {
        match serde_json::to_string(user) {
            Ok(json) => self.write(USER_FILE, &json),
            Err(e) => warn!("cannot serialize user record: {e}"),
        }
    }

    /// Forget the user record.
    pub fn remove_user(&self) {
        self.remove(USER_FILE);
    }

    /// Whether a bearer token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Clear both the token and the user record.
    pub fn logout(&self) {
        self.remove_token();
        self.remove_user();
    }
}
