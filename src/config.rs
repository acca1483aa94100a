//! Configuration System
//!
//! Loads configuration from a TOML file with `NOMINA_*` environment
//! variable overrides on top.

use crate::auth::{AuthConfig, Role};
use crate::refresh::RefreshConfig;
use crate::storage::RemoteConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// SQLite file name inside `data_dir`
    #[serde(default = "default_database")]
    pub database: String,

    /// How often to look for session changes written by other processes
    #[serde(default = "default_external_poll")]
    pub external_poll_ms: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("nomina").to_string_lossy().to_string())
        .unwrap_or_else(|| "./nomina_data".to_string())
}

fn default_database() -> String {
    "nomina.db".to_string()
}

fn default_external_poll() -> u64 {
    1000
}

impl StorageConfig {
    /// Full path of the SQLite database, with a leading `~` expanded
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.data_dir).join(&self.database)
    }

    pub fn external_poll_interval(&self) -> Duration {
        Duration::from_millis(self.external_poll_ms.max(50))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_database(),
            external_poll_ms: default_external_poll(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Remote document store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_remote_url")]
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_remote_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_request_timeout() -> u64 {
    5000
}

impl RemoteSettings {
    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.url.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_remote_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Account served by the built-in provider when no provider URL is set
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// User id that owns this account's records; defaults to the email
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default = "default_account_role")]
    pub role: Role,
}

fn default_account_role() -> Role {
    Role::Empleado
}

impl AccountConfig {
    pub fn user_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| self.email.trim().to_lowercase())
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthSettings {
    /// Identity provider base URL; unset uses `accounts`
    #[serde(default)]
    pub provider_url: Option<String>,

    /// Minutes until an authenticated session is logged out; 0 disables
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u64,

    #[serde(default = "default_mirror_legacy_keys")]
    pub mirror_legacy_keys: bool,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

fn default_session_timeout() -> u64 {
    480
}

fn default_mirror_legacy_keys() -> bool {
    true
}

impl AuthSettings {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            session_timeout: match self.session_timeout_minutes {
                0 => None,
                minutes => Some(Duration::from_secs(minutes.saturating_mul(60))),
            },
            mirror_legacy_keys: self.mirror_legacy_keys,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider_url: None,
            session_timeout_minutes: default_session_timeout(),
            mirror_legacy_keys: default_mirror_legacy_keys(),
            accounts: Vec::new(),
        }
    }
}

/// Refresh timer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshSettings {
    #[serde(default = "default_full_interval")]
    pub full_interval_secs: u64,

    #[serde(default = "default_chart_interval")]
    pub chart_interval_secs: u64,
}

fn default_full_interval() -> u64 {
    300
}

fn default_chart_interval() -> u64 {
    30
}

impl RefreshSettings {
    /// Intervals below one second are raised to one second
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            full_interval: Duration::from_secs(self.full_interval_secs.max(1)),
            chart_interval: Duration::from_secs(self.chart_interval_secs.max(1)),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            full_interval_secs: default_full_interval(),
            chart_interval_secs: default_chart_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
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
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("nomina").join("config.toml")),
            Some(PathBuf::from("/etc/nomina/config.toml")),
            Some(PathBuf::from("./nomina.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `NOMINA_*` overrides read through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = lookup("NOMINA_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        // Setting a URL turns the remote store on
        if let Some(url) = lookup("NOMINA_REMOTE_URL") {
            self.remote.url = url;
            self.remote.enabled = true;
        }
        if let Some(enabled) = lookup("NOMINA_REMOTE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.remote.enabled = enabled;
        }

        if let Some(url) = lookup("NOMINA_AUTH_URL") {
            self.auth.provider_url = Some(url);
        }
        if let Some(minutes) = lookup("NOMINA_SESSION_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.auth.session_timeout_minutes = minutes;
        }

        if let Some(level) = lookup("NOMINA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("NOMINA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Nomina Configuration
#
# Environment variables override these settings:
# - NOMINA_DATA_DIR
# - NOMINA_REMOTE_URL (also enables the remote store)
# - NOMINA_REMOTE_ENABLED
# - NOMINA_AUTH_URL
# - NOMINA_SESSION_TIMEOUT
# - NOMINA_LOG_LEVEL
# - NOMINA_LOG_FORMAT

[storage]
# Directory for the local database
data_dir = "~/.local/share/nomina"

# SQLite file inside data_dir
database = "nomina.db"

# Check for sign-ins and sign-outs made by other processes (ms)
external_poll_ms = 1000

[remote]
# Read and write records through the remote document store
enabled = false

# Document store URL
url = "http://localhost:8090"

# Request timeout (ms)
request_timeout_ms = 5000

[auth]
# Identity provider URL; without one the accounts below are used
# provider_url = "http://localhost:8090"

# Log out after this many minutes (0 disables)
session_timeout_minutes = 480

# Also write the currentUser and user session keys
mirror_legacy_keys = true

# [[auth.accounts]]
# email = "admin@empresa.com"
# password = "cambiar"
# role = "admin"

[refresh]
# Reload records and re-render every view (seconds)
full_interval_secs = 300

# Redraw charts from memory (seconds)
chart_interval_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::parse(&generate_default_config()).unwrap();

        assert!(!config.remote.enabled);
        assert_eq!(config.remote.url, "http://localhost:8090");
        assert_eq!(config.auth.session_timeout_minutes, 480);
        assert!(config.auth.mirror_legacy_keys);
        assert!(config.auth.accounts.is_empty());
        assert_eq!(config.refresh.full_interval_secs, 300);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.storage.database, "nomina.db");
        assert_eq!(
            config.storage.external_poll_interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [auth]
            session_timeout_minutes = 0

            [[auth.accounts]]
            email = "conta@empresa.com"
            password = "x"
            role = "contador"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.auth_config().session_timeout, None);
        assert_eq!(config.auth.accounts[0].role, Role::Contador);
        assert_eq!(config.auth.accounts[0].user_id(), "conta@empresa.com");
        assert_eq!(config.refresh.chart_interval_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NOMINA_DATA_DIR", "/tmp/nomina"),
            ("NOMINA_REMOTE_URL", "http://docs:9000"),
            ("NOMINA_SESSION_TIMEOUT", "15"),
            ("NOMINA_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.storage.database_path(), PathBuf::from("/tmp/nomina/nomina.db"));
        assert!(config.remote.enabled);
        assert_eq!(config.remote.remote_config().base_url, "http://docs:9000");
        assert_eq!(
            config.auth.auth_config().session_timeout,
            Some(Duration::from_secs(15 * 60))
        );
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_remote_can_be_disabled_by_env() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "NOMINA_REMOTE_URL" => Some("http://docs:9000".to_string()),
            "NOMINA_REMOTE_ENABLED" => Some("off".to_string()),
            _ => None,
        });
        assert!(!config.remote.enabled);
    }

    #[test]
    fn test_refresh_intervals_have_a_floor() {
        let settings = RefreshSettings {
            full_interval_secs: 0,
            chart_interval_secs: 5,
        };
        let refresh = settings.refresh_config();
        assert_eq!(refresh.full_interval, Duration::from_secs(1));
        assert_eq!(refresh.chart_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_huge_session_timeout_saturates() {
        let settings = AuthSettings {
            session_timeout_minutes: u64::MAX,
            ..AuthSettings::default()
        };
        assert_eq!(
            settings.auth_config().session_timeout,
            Some(Duration::from_secs(u64::MAX))
        );
    }
}
