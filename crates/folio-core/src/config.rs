//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/folio/config.toml)
//! 3. Environment variables (FOLIO_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable prefix
const ENV_PREFIX: &str = "FOLIO";

/// Event source the site connects to
pub const DEFAULT_ENDPOINT: &str = "https://sld-clicker.herokuapp.com/";

/// Smallest reconnect delay honoured, whatever the file says
pub const MIN_RECONNECT_MS: u64 = 10;

/// Engine.IO protocol revision spoken by the event source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineProtocol {
    /// socket.io 2.x servers; the client drives the heartbeat
    #[default]
    V3,
    /// socket.io 3.x/4.x servers; the server drives the heartbeat
    V4,
}

impl EngineProtocol {
    /// Value of the `EIO` query parameter
    pub fn revision(self) -> u8 {
        match self {
            EngineProtocol::V3 => 3,
            EngineProtocol::V4 => 4,
        }
    }
}

impl fmt::Display for EngineProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.revision())
    }
}

impl FromStr for EngineProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v3" | "3" => Ok(EngineProtocol::V3),
            "v4" | "4" => Ok(EngineProtocol::V4),
            _ => Err(ConfigError::InvalidValue {
                key: "protocol".to_string(),
                value: s.to_string(),
                expected: "v3 or v4",
            }),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the socket.io event source
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Engine.IO protocol revision
    #[serde(default)]
    pub protocol: EngineProtocol,

    /// Log every resulting state snapshot at debug level
    #[serde(default)]
    pub log_transitions: bool,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            protocol: EngineProtocol::default(),
            log_transitions: false,
            log_file: None,
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (FOLIO_ENDPOINT, FOLIO_PROTOCOL, ...)
    /// 2. Config file (~/.config/folio/config.toml or FOLIO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        // FOLIO_ENDPOINT
        if let Ok(val) = std::env::var(format!("{}_ENDPOINT", ENV_PREFIX)) {
            if !val.is_empty() {
                self.endpoint = val;
            }
        }

        // FOLIO_PROTOCOL
        if let Ok(val) = std::env::var(format!("{}_PROTOCOL", ENV_PREFIX)) {
            if let Ok(protocol) = val.parse() {
                self.protocol = protocol;
            }
        }

        // FOLIO_LOG_TRANSITIONS
        if let Ok(val) = std::env::var(format!("{}_LOG_TRANSITIONS", ENV_PREFIX)) {
            self.log_transitions = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // FOLIO_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // FOLIO_RECONNECT_INITIAL_MS
        if let Ok(val) = std::env::var(format!("{}_RECONNECT_INITIAL_MS", ENV_PREFIX)) {
            if let Ok(ms) = parse_millis("reconnect_initial_ms", &val) {
                self.reconnect_initial_ms = ms;
            }
        }

        // FOLIO_RECONNECT_MAX_MS
        if let Ok(val) = std::env::var(format!("{}_RECONNECT_MAX_MS", ENV_PREFIX)) {
            if let Ok(ms) = parse_millis("reconnect_max_ms", &val) {
                self.reconnect_max_ms = ms;
            }
        }
    }

    /// Set a value by key, as used by `folio config set`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "endpoint" => {
                if value.is_empty() || value == "none" {
                    self.endpoint = default_endpoint();
                } else {
                    websocket_base(value)?;
                    self.endpoint = value.to_string();
                }
            }
            "protocol" => {
                self.protocol = value.parse()?;
            }
            "log_transitions" => {
                self.log_transitions = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    expected: "true or false",
                })?;
            }
            "log_file" => {
                self.log_file = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "reconnect_initial_ms" => {
                self.reconnect_initial_ms = parse_millis(key, value)?;
            }
            "reconnect_max_ms" => {
                self.reconnect_max_ms = parse_millis(key, value)?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with FOLIO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio")
            .join("config.toml")
    }

    /// WebSocket URL of the socket.io endpoint
    ///
    /// `https://host/` becomes `wss://host/socket.io/?EIO=3&transport=websocket`.
    pub fn socket_url(&self) -> Result<String, ConfigError> {
        let base = websocket_base(&self.endpoint)?;
        let path = if base.ends_with("/socket.io") {
            base
        } else {
            format!("{}/socket.io", base)
        };
        Ok(format!(
            "{}/?EIO={}&transport=websocket",
            path,
            self.protocol.revision()
        ))
    }

    /// First reconnect delay, never below `MIN_RECONNECT_MS`
    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms.max(MIN_RECONNECT_MS))
    }

    /// Maximum reconnect delay, never below the first delay
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms).max(self.reconnect_initial())
    }
}

/// Map an http(s)/ws(s) endpoint to a ws(s) URL without trailing slash
fn websocket_base(endpoint: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidEndpoint(endpoint.to_string());

    let (scheme, rest) = endpoint.trim().split_once("://").ok_or_else(invalid)?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        _ => return Err(invalid()),
    };

    // Drop any query; the socket.io query is appended later
    let rest = rest.split('?').next().unwrap_or_default().trim_end_matches('/');
    if rest.is_empty() {
        return Err(invalid());
    }

    Ok(format!("{}://{}", scheme, rest))
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms >= MIN_RECONNECT_MS => Ok(ms),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a whole number of milliseconds, at least 10",
        }),
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}
