//! livecast-player specific configuration
//!
//! Built from the TOML file (or its defaults) with command-line overrides
//! applied on top.

use crate::error::{Error, Result};
use livecast_common::config::{PlayerConfig, TomlConfig};
use std::time::Duration;

/// Values given on the command line; `None` keeps the file's value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub port: Option<u16>,
    pub language: Option<String>,
    pub auto_start: bool,
}

/// Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub language: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub port: u16,
    pub auto_start: bool,
    pub player: PlayerConfig,
}

impl Config {
    pub fn resolve(file: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let mut file = file;
        if let Some(server_url) = overrides.server_url {
            file.server_url = server_url;
        }
        if let Some(language) = overrides.language {
            file.language = language;
        }
        if let Some(port) = overrides.port {
            file.api_port = port;
        }
        file.auto_start |= overrides.auto_start;

        file.validate()?;
        if file.language.trim().is_empty() {
            return Err(Error::Config("language must not be empty".to_string()));
        }

        Ok(Self {
            poll_interval: file.poll_interval(),
            request_timeout: file.request_timeout(),
            server_url: file.server_url,
            language: file.language,
            port: file.api_port,
            auto_start: file.auto_start,
            player: file.player,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let file = TomlConfig::default();
        Self {
            poll_interval: file.poll_interval(),
            request_timeout: file.request_timeout(),
            server_url: file.server_url,
            language: file.language,
            port: file.api_port,
            auto_start: file.auto_start,
            player: file.player,
        }
    }
}
