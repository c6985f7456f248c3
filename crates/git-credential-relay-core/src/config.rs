//! Configuration types and loading for git-credential-relay.
//!
//! Configuration is loaded from `~/.config/git-credential-relay/config.toml`.
//!
//! # Error Handling
//!
//! - If the config file doesn't exist, default values are returned.
//! - If the config file exists but is invalid, an error is returned (fail fast).
//!
//! # Example Configuration
//!
//! ```toml
//! [socket]
//! path = "/home/me/.cache/git-credential-relay/local.sock"
//! backlog = 16
//!
//! [delegate]
//! program = "git"
//! args = ["credential"]
//! timeout = 30                # seconds; omit to wait forever
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Directory name used under the cache and config directories.
pub const APP_DIR: &str = "git-credential-relay";

/// Socket file name inside [`APP_DIR`].
pub const SOCKET_FILE: &str = "local.sock";

/// Where the forwarded socket appears on the remote host, by convention.
pub const REMOTE_SOCKET_PATH: &str = "/tmp/git-credential-relay.sock";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listening socket configuration.
    pub socket: SocketConfig,
    /// Credential backend configuration.
    pub delegate: DelegateConfig,
}

/// Configuration for the listening socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Socket path (default: `<cache dir>/git-credential-relay/local.sock`).
    pub path: Option<PathBuf>,
    /// Listen backlog (default: 16).
    pub backlog: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: None,
            backlog: 16,
        }
    }
}

/// Configuration for the external credential command.
///
/// The relay runs `<program> <args...> fill` and `<program> <args...> approve`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    /// Program to run (default: `git`).
    pub program: String,
    /// Arguments placed before the action (default: `["credential"]`).
    pub args: Vec<String>,
    /// Seconds to wait for the command before killing it (default: no limit).
    pub timeout: Option<u64>,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            args: vec!["credential".to_string()],
            timeout: None,
        }
    }
}

impl DelegateConfig {
    /// The command timeout as a `Duration`, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// Get the default socket path.
///
/// Returns `$XDG_CACHE_HOME/git-credential-relay/local.sock` (or the platform
/// equivalent) and falls back to `/tmp/git-credential-relay-$UID/local.sock`
/// if no cache directory is known.
pub fn default_socket_path() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join(APP_DIR).join(SOCKET_FILE)
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/{}-{}/{}", APP_DIR, uid, SOCKET_FILE))
    }
}

impl Config {
    /// Returns the default configuration file path.
    ///
    /// Returns `~/.config/git-credential-relay/config.toml` using
    /// `dirs::config_dir()`, or `None` if the config directory cannot be
    /// determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    /// Load configuration from the default path.
    ///
    /// - Returns `Ok(Config::default())` if no config file exists.
    /// - Returns `Err` if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// The socket path to bind: the configured one, or the default.
    pub fn socket_path(&self) -> PathBuf {
        self.socket
            .path
            .clone()
            .unwrap_or_else(default_socket_path)
    }
}
