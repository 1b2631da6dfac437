//! Configuration loading and config file resolution
//!
//! The TOML file is bootstrap-only: it is read once at startup and a missing
//! or unreadable file never prevents the service from starting.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `LIVECAST_CONFIG` environment variable
//! 3. Per-user then system-wide config file
//! 4. Built-in defaults (no file)

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LIVECAST_CONFIG";

/// Lower bound for the poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

/// Upper bound for the poll interval
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the commentary/reply server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Language requested when going live
    #[serde(default = "default_language")]
    pub language: String,

    /// Session poller interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout applied to every request against the server
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Control API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Go live immediately at startup
    #[serde(default)]
    pub auto_start: bool,

    /// External player used to make clips audible
    #[serde(default)]
    pub player: PlayerConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External player command
///
/// `{url}` and `{offset}` (seconds, millisecond precision) are substituted
/// in every argument before the player is spawned.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_program")]
    pub program: String,

    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_api_port() -> u16 {
    5750
}

fn default_player_program() -> String {
    "ffplay".to_string()
}

fn default_player_args() -> Vec<String> {
    ["-nodisp", "-autoexit", "-loglevel", "quiet", "-ss", "{offset}", "{url}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            language: default_language(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            api_port: default_api_port(),
            auto_start: false,
            player: PlayerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: default_player_program(),
            args: default_player_args(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Poll interval clamped to the supported range
    pub fn poll_interval(&self) -> Duration {
        millis_to_duration(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        millis_to_duration(self.request_timeout_ms.max(1))
    }

    /// Reject values that cannot work at all
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config("server_url must not be empty".to_string()));
        }
        if self.player.program.trim().is_empty() {
            return Err(Error::Config("player.program must not be empty".to_string()));
        }
        if !self.player.args.iter().any(|arg| arg.contains("{url}")) {
            return Err(Error::Config(
                "player.args must contain a {url} placeholder".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Locate the config file following the priority order
///
/// Returns `None` when no explicit path was given and no default file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Default locations
    default_config_locations()
        .into_iter()
        .find(|path| path.exists())
}

/// Per-user location first, then system-wide on Linux
fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("livecast").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc/livecast/config.toml"));
    }
    locations
}

/// Where the effective configuration came from
#[derive(Debug)]
pub enum ConfigOrigin {
    /// No file was found
    Defaults,
    /// Loaded from this file
    File(PathBuf),
    /// The file exists but could not be used; defaults apply
    Rejected { path: PathBuf, error: Error },
}

/// Load configuration, degrading to built-in defaults
///
/// Never fails. Called before logging is initialised, so the caller reports
/// the returned origin once it can.
pub fn load_or_default(cli_arg: Option<&Path>) -> (TomlConfig, ConfigOrigin) {
    let Some(path) = resolve_config_path(cli_arg) else {
        return (TomlConfig::default(), ConfigOrigin::Defaults);
    };

    match load_toml_config(&path) {
        Ok(config) => (config, ConfigOrigin::File(path)),
        Err(error) => (TomlConfig::default(), ConfigOrigin::Rejected { path, error }),
    }
}
