//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub supabase: SupabaseConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supabase project configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,

    /// Public anon key, sent as `apikey` and bearer token
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "tickets".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            schema: default_schema(),
            table: default_table(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SupabaseConfig {
    /// Fail unless both the project URL and the key are set
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing("supabase.url"));
        }
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("supabase.anon_key"));
        }
        Ok(())
    }
}

/// Realtime change feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_channel() -> String {
    "tickets-channel".to_string()
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Nothing is logged here since this usually runs before logging is
    /// set up; call [`ConfigOrigin::report`] once it is.
    pub fn load_default() -> (Self, ConfigOrigin) {
        Self::load_first(&Self::default_paths())
    }

    /// First of `paths` that exists and loads, else defaults plus environment
    pub fn load_first(paths: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();
        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    origin.path = Some(path.clone());
                    return (config, origin);
                }
                Err(e) => origin.skipped.push(e),
            }
        }
        (Self::from_env(), origin)
    }

    /// Candidate config files, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("ticketdesk").join("config.toml"));
        }
        paths.push(PathBuf::from("./config.toml"));
        paths
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|key| var(*key));

        // Supabase overrides
        if let Some(url) = first(&["TICKETDESK_SUPABASE_URL", "SUPABASE_URL"]) {
            self.supabase.url = url;
        }
        if let Some(key) = first(&["TICKETDESK_SUPABASE_KEY", "SUPABASE_ANON_KEY"]) {
            self.supabase.anon_key = key;
        }
        if let Some(table) = var("TICKETDESK_TABLE") {
            self.supabase.table = table;
        }

        // Realtime overrides
        if let Some(channel) = var("TICKETDESK_CHANNEL") {
            self.realtime.channel = channel;
        }

        // Logging overrides
        if let Some(level) = var("TICKETDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TICKETDESK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Where [`Config::load_first`] found its settings
#[derive(Debug, Default)]
pub struct ConfigOrigin {
    /// File the config came from, `None` for defaults plus environment
    pub path: Option<PathBuf>,
    /// Files that exist but failed to load
    pub skipped: Vec<ConfigError>,
}

impl ConfigOrigin {
    pub fn report(&self) {
        for error in &self.skipped {
            tracing::warn!("Ignoring config file: {}", error);
        }
        match &self.path {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::debug!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Ticketdesk Configuration
#
# Environment variables override these settings:
# - TICKETDESK_SUPABASE_URL (or SUPABASE_URL)
# - TICKETDESK_SUPABASE_KEY (or SUPABASE_ANON_KEY)
# - TICKETDESK_TABLE
# - TICKETDESK_CHANNEL
# - TICKETDESK_LOG_LEVEL
# - TICKETDESK_LOG_FORMAT

[supabase]
# Project URL
url = ""

# Public anon key
anon_key = ""

# Schema and table holding the tickets
schema = "public"
table = "tickets"

# Request timeout in seconds
request_timeout_secs = 30

[realtime]
# Realtime channel name
channel = "tickets-channel"

# Heartbeat interval in seconds
heartbeat_interval_secs = 25

# Reconnect attempts before the change stream gives up
max_reconnect_attempts = 5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
