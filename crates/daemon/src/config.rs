//! Configuration management for the DiskNav daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/disknav/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default Yandex.Disk REST API base URL.
pub const DEFAULT_STORAGE_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";

/// Default Google Sheets API base URL.
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("root_path must be an absolute remote path, got {0:?}")]
    InvalidRootPath(String),

    #[error("probe_concurrency must be between 1 and 100, got {0}")]
    InvalidProbeConcurrency(usize),

    #[error("list_limit must be between 1 and 10000, got {0}")]
    InvalidListLimit(u32),

    #[error("marker_prefix and marker_suffix must not be empty")]
    InvalidMarker,

    #[error("tokens.capacity must be greater than 0")]
    InvalidTokenCapacity,

    #[error("{field} must start with http:// or https://, got {value}")]
    InvalidApiBase { field: &'static str, value: String },

    #[error("lookup is enabled but lookup.spreadsheet_id is empty")]
    MissingSpreadsheetId,

    #[error("telegram.bot_token is not set (config or DISKNAV_BOT_TOKEN)")]
    MissingBotToken,

    #[error("storage.token is not set (config or DISKNAV_STORAGE_TOKEN)")]
    MissingStorageToken,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the DiskNav daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Messaging transport configuration.
    pub telegram: TelegramConfig,

    /// Remote storage configuration.
    pub storage: StorageConfig,

    /// Access control configuration.
    pub access: AccessConfig,

    /// Navigation token store configuration.
    pub tokens: TokenConfig,

    /// Spreadsheet lookup configuration.
    pub lookup: LookupConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

/// Messaging transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,

    /// Bot API base URL.
    pub api_base: String,

    /// Long-poll timeout in seconds.
    pub poll_timeout_secs: u64,
}

/// Remote storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// OAuth token for the storage API.
    pub token: String,

    /// Storage REST API base URL.
    pub api_base: String,

    /// Root of the browsable tree.
    pub root_path: String,

    /// Menu title shown at the root.
    pub root_title: String,

    /// Maximum entries requested per listing.
    pub list_limit: u32,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds. Downloads can be large, keep this generous.
    pub read_timeout_secs: u64,

    /// Maximum simultaneous non-empty probes.
    pub probe_concurrency: usize,

    /// Lowercase prefix of link marker files.
    pub marker_prefix: String,

    /// Lowercase suffix of link marker files.
    pub marker_suffix: String,

    /// Maximum bytes read from a link marker file.
    pub marker_max_bytes: usize,

    /// Pause between document dispatches in milliseconds.
    pub delivery_pause_ms: u64,
}

/// Access control configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessConfig {
    /// Groups whose members may use the bot. Empty allows everyone.
    pub allowed_group_ids: Vec<i64>,

    /// Principals that bypass the membership check.
    pub admin_ids: Vec<i64>,

    /// Handles (without `@`) that bypass the membership check.
    pub admin_usernames: Vec<String>,

    /// How long a membership decision is cached, in seconds.
    pub member_cache_ttl_secs: u64,
}

/// Navigation token store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenConfig {
    /// Maximum tokens kept before the least recently used are evicted.
    pub capacity: usize,
}

/// Spreadsheet lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Whether `/code` and private-chat text lookups are served.
    pub enabled: bool,

    /// Sheets API base URL.
    pub api_base: String,

    /// Spreadsheet identifier.
    pub spreadsheet_id: String,

    /// A1-notation range holding the table, header row first.
    pub range: String,

    /// API key for the Sheets API.
    pub api_key: String,

    /// How long the fetched table is cached, in seconds.
    pub cache_ttl_secs: u64,

    /// Accepted header names for the key column.
    pub key_headers: Vec<String>,

    /// Accepted header names for the value column.
    pub value_headers: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            poll_timeout_secs: 50,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_STORAGE_API_BASE.to_string(),
            root_path: "/materials".to_string(),
            root_title: "materials".to_string(),
            list_limit: 200,
            connect_timeout_secs: 60,
            read_timeout_secs: 900, // 15 minutes
            probe_concurrency: 10,
            marker_prefix: "link_".to_string(),
            marker_suffix: ".txt".to_string(),
            marker_max_bytes: 128_000,
            delivery_pause_ms: 300,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_group_ids: Vec::new(),
            admin_ids: Vec::new(),
            admin_usernames: Vec::new(),
            member_cache_ttl_secs: 60,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { capacity: 100_000 }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            spreadsheet_id: String::new(),
            range: "A:B".to_string(),
            api_key: String::new(),
            cache_ttl_secs: 60,
            key_headers: vec![
                "розетка".to_string(),
                "код".to_string(),
                "code".to_string(),
                "key".to_string(),
            ],
            value_headers: vec![
                "dmx".to_string(),
                "значение".to_string(),
                "value".to_string(),
            ],
        }
    }
}

impl StorageConfig {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Pause between document dispatches.
    pub fn delivery_pause(&self) -> Duration {
        Duration::from_millis(self.delivery_pause_ms)
    }
}

impl AccessConfig {
    /// Membership cache TTL as a [`Duration`].
    pub fn member_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.member_cache_ttl_secs)
    }
}

impl LookupConfig {
    /// Table cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("disknav")
        .join("config.toml")
}

/// Parse a comma-separated list of group ids, skipping malformed items.
fn parse_group_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(item, "Ignoring malformed group id in DISKNAV_ALLOWED_GROUP_IDS");
                None
            }
        })
        .collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn check_api_base(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidApiBase {
            field,
            value: value.to_string(),
        })
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - DISKNAV_BOT_TOKEN: Bot API token
    /// - DISKNAV_STORAGE_TOKEN: Storage OAuth token
    /// - DISKNAV_ALLOWED_GROUP_IDS: Comma-separated allowed group ids
    /// - DISKNAV_MEMBER_CACHE_TTL_SEC: Membership cache TTL in seconds
    /// - DISKNAV_SHEETS_API_KEY: Sheets API key
    /// - DISKNAV_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = non_empty_env("DISKNAV_BOT_TOKEN") {
            tracing::info!("Using bot token from environment");
            self.telegram.bot_token = token;
        }

        if let Some(token) = non_empty_env("DISKNAV_STORAGE_TOKEN") {
            tracing::info!("Using storage token from environment");
            self.storage.token = token;
        }

        if let Some(raw) = non_empty_env("DISKNAV_ALLOWED_GROUP_IDS") {
            let ids = parse_group_ids(&raw);
            tracing::info!(count = ids.len(), "Overriding allowed_group_ids from environment");
            self.access.allowed_group_ids = ids;
        }

        if let Some(raw) = non_empty_env("DISKNAV_MEMBER_CACHE_TTL_SEC") {
            match raw.trim().parse::<u64>() {
                Ok(ttl) => {
                    tracing::info!(ttl, "Overriding member_cache_ttl_secs from environment");
                    self.access.member_cache_ttl_secs = ttl;
                }
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring malformed DISKNAV_MEMBER_CACHE_TTL_SEC");
                }
            }
        }

        if let Some(key) = non_empty_env("DISKNAV_SHEETS_API_KEY") {
            tracing::info!("Using Sheets API key from environment");
            self.lookup.api_key = key;
        }

        if let Some(level) = non_empty_env("DISKNAV_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.daemon.log_level = level;
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    /// Credentials are checked separately by [`Config::require_credentials`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        let root = &self.storage.root_path;
        if !root.starts_with('/') {
            return Err(ConfigError::InvalidRootPath(root.clone()));
        }

        let concurrency = self.storage.probe_concurrency;
        if !(1..=100).contains(&concurrency) {
            return Err(ConfigError::InvalidProbeConcurrency(concurrency));
        }

        let limit = self.storage.list_limit;
        if !(1..=10_000).contains(&limit) {
            return Err(ConfigError::InvalidListLimit(limit));
        }

        if self.storage.marker_prefix.is_empty() || self.storage.marker_suffix.is_empty() {
            return Err(ConfigError::InvalidMarker);
        }

        if self.tokens.capacity == 0 {
            return Err(ConfigError::InvalidTokenCapacity);
        }

        check_api_base("telegram.api_base", &self.telegram.api_base)?;
        check_api_base("storage.api_base", &self.storage.api_base)?;

        if self.lookup.enabled {
            check_api_base("lookup.api_base", &self.lookup.api_base)?;
            if self.lookup.spreadsheet_id.trim().is_empty() {
                return Err(ConfigError::MissingSpreadsheetId);
            }
        }

        Ok(())
    }

    /// Check that the credentials needed to run the bot are present.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingBotToken);
        }
        if self.storage.token.trim().is_empty() {
            return Err(ConfigError::MissingStorageToken);
        }
        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
