//! Application directory paths for the chat client.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Environment Overrides
//!
//! Paths can be overridden for testing or custom deployments:
//! - `IUP_CHAT_DATA_DIR` overrides [`data_dir`]
//! - `IUP_CHAT_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the persisted session (bearer token + user record) and logs.
///
/// Resolves to `dirs::data_dir()/iup-chat/` by default. Override with
/// the `IUP_CHAT_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    if let Some(override_dir) = std::env::var_os("IUP_CHAT_DATA_DIR") {
        return Some(PathBuf::from(override_dir));
    }
    dirs::data_dir().map(|d| d.join("iup-chat"))
}

/// Application config directory.
///
/// Holds `config.toml`.
///
/// Resolves to `dirs::config_dir()/iup-chat/` by default. Override with
/// the `IUP_CHAT_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Some(override_dir) = std::env::var_os("IUP_CHAT_CONFIG_DIR") {
        return Some(PathBuf::from(override_dir));
    }
    dirs::config_dir().map(|d| d.join("iup-chat"))
}

/// Default path of the client configuration file.
#[must_use]
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
