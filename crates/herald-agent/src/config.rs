//! Agent configuration loading from file and environment variables.

use serde::Deserialize;
use thiserror::Error;

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    /// Who this agent acts for.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// The discovery service to pull events from.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Local state location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync scheduling.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// The local domain, e.g. `bob.com`.
    #[serde(default)]
    pub domain: String,

    /// Ed25519 seed file. Queries are unsigned when absent.
    #[serde(default)]
    pub signing_key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the discovery service.
    #[serde(default)]
    pub url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Events requested per page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root under which each discovery service gets its own directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Seconds between sync cycles. `0` runs a single cycle and exits.
    #[serde(default)]
    pub interval_seconds: u64,

    /// File listing followed domains (one per line, or a JSON array).
    #[serde(default)]
    pub following_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "herald_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_page_limit() -> u32 {
    100
}

fn default_data_dir() -> String {
    "herald-data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: default_timeout_seconds(),
            page_limit: default_page_limit(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AgentConfig {
    /// Checks the settings that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first unset field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.domain.trim().is_empty() {
            return Err(ConfigError::Missing("identity.domain"));
        }
        if self.discovery.url.trim().is_empty() {
            return Err(ConfigError::Missing("discovery.url"));
        }
        if self.discovery.page_limit == 0 {
            return Err(ConfigError::Invalid("discovery.page_limit must be at least 1"));
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is unset.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(&'static str),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `HERALD_DOMAIN` overrides `identity.domain`
/// - `HERALD_SIGNING_KEY_PATH` overrides `identity.signing_key_path`
/// - `HERALD_DISCOVERY_URL` overrides `discovery.url`
/// - `HERALD_DISCOVERY_TIMEOUT` overrides `discovery.timeout_seconds`
/// - `HERALD_PAGE_LIMIT` overrides `discovery.page_limit`
/// - `HERALD_DATA_DIR` overrides `storage.data_dir`
/// - `HERALD_SYNC_INTERVAL` overrides `sync.interval_seconds`
/// - `HERALD_FOLLOWING_PATH` overrides `sync.following_path`
/// - `HERALD_LOG_LEVEL` overrides `logging.level`
/// - `HERALD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<AgentConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                AgentConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => AgentConfig::default(),
    };

    // Environment variable overrides
    if let Some(domain) = env("HERALD_DOMAIN") {
        config.identity.domain = domain;
    }
    if let Some(key_path) = env("HERALD_SIGNING_KEY_PATH") {
        config.identity.signing_key_path = Some(key_path).filter(|p| !p.is_empty());
    }
    if let Some(url) = env("HERALD_DISCOVERY_URL") {
        config.discovery.url = url;
    }
    if let Some(timeout) = env("HERALD_DISCOVERY_TIMEOUT") {
        if let Ok(parsed) = timeout.parse() {
            config.discovery.timeout_seconds = parsed;
        }
    }
    if let Some(limit) = env("HERALD_PAGE_LIMIT") {
        if let Ok(parsed) = limit.parse() {
            config.discovery.page_limit = parsed;
        }
    }
    if let Some(data_dir) = env("HERALD_DATA_DIR") {
        config.storage.data_dir = data_dir;
    }
    if let Some(interval) = env("HERALD_SYNC_INTERVAL") {
        if let Ok(parsed) = interval.parse() {
            config.sync.interval_seconds = parsed;
        }
    }
    if let Some(following) = env("HERALD_FOLLOWING_PATH") {
        config.sync.following_path = Some(following).filter(|p| !p.is_empty());
    }
    if let Some(level) = env("HERALD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("HERALD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
