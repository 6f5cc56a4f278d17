//! Configuration management
//!
//! This module handles loading and parsing configuration for the Newswire
//! notification engine. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site configuration
    #[serde(default)]
    pub site: SiteConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Outbound email configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Activation-token retention configuration
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            email: EmailConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base site URL used to build activation links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Site name used in outbound email
    #[serde(default = "default_site_name")]
    pub name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_site_name(),
        }
    }
}

impl SiteConfig {
    /// Build the activation URL for a token value.
    pub fn activation_url(&self, token: &str) -> String {
        format!("{}/accounts/activate/{}/", self.base_url.trim_end_matches('/'), token)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_site_name() -> String {
    "Newswire".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/newswire.db".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache driver (memory or redis)
    #[serde(default)]
    pub driver: CacheDriver,
    /// Redis connection URL (required for the redis driver)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Default TTL for cache entries in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            redis_url: None,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-memory cache (default)
    #[default]
    Memory,
    /// Redis for distributed deployment
    Redis,
}

/// Outbound email (SMTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host; empty disables outbound email
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password
    #[serde(default)]
    pub smtp_password: String,
    /// From address
    #[serde(default = "default_smtp_from")]
    pub from_address: String,
    /// From display name
    #[serde(default = "default_site_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_smtp_from(),
            from_name: default_site_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "noreply@localhost".to_string()
}

/// Activation-token retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days an unactivated token is kept before the sweep deletes it
    #[serde(default = "default_token_retention_days")]
    pub token_days: i64,
    /// Hours between sweep runs
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            token_days: default_token_retention_days(),
            sweep_interval_hours: default_sweep_interval_hours(),
        }
    }
}

fn default_token_retention_days() -> i64 {
    crate::models::TOKEN_RETENTION_DAYS
}

fn default_sweep_interval_hours() -> u64 {
    24
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file.
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - NEWSWIRE_SITE_BASE_URL
    /// - NEWSWIRE_DATABASE_URL
    /// - NEWSWIRE_CACHE_DRIVER
    /// - NEWSWIRE_CACHE_REDIS_URL
    /// - NEWSWIRE_CACHE_TTL_SECONDS
    /// - NEWSWIRE_SMTP_HOST / PORT / USERNAME / PASSWORD / FROM
    /// - NEWSWIRE_RETENTION_TOKEN_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("NEWSWIRE_SITE_BASE_URL") {
            self.site.base_url = base_url;
        }
        if let Ok(name) = std::env::var("NEWSWIRE_SITE_NAME") {
            self.site.name = name;
        }

        if let Ok(url) = std::env::var("NEWSWIRE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(driver) = std::env::var("NEWSWIRE_CACHE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.cache.driver = CacheDriver::Memory,
                "redis" => self.cache.driver = CacheDriver::Redis,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(redis_url) = std::env::var("NEWSWIRE_CACHE_REDIS_URL") {
            self.cache.redis_url = Some(redis_url);
        }
        if let Ok(ttl) = std::env::var("NEWSWIRE_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(host) = std::env::var("NEWSWIRE_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(port) = std::env::var("NEWSWIRE_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("NEWSWIRE_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("NEWSWIRE_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(from) = std::env::var("NEWSWIRE_SMTP_FROM") {
            self.email.from_address = from;
        }

        if let Ok(days) = std::env::var("NEWSWIRE_RETENTION_TOKEN_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.retention.token_days = days;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.database.url, "data/newswire.db");
        assert_eq!(config.cache.driver, CacheDriver::Memory);
        assert_eq!(config.retention.token_days, 7);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.site.name, "Newswire");
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "site:\n  base_url: https://news.example.com\ndatabase:\n  url: /tmp/test.db"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.site.base_url, "https://news.example.com");
        assert_eq!(config.database.url, "/tmp/test.db");
        // Unspecified sections keep defaults
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_load_invalid_yaml_reports_location() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "site: [unclosed").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_activation_url_building() {
        let site = SiteConfig {
            base_url: "https://news.example.com/".to_string(),
            name: "Example".to_string(),
        };

        assert_eq!(
            site.activation_url("abc-123"),
            "https://news.example.com/accounts/activate/abc-123/"
        );
    }

    #[test]
    fn test_env_overrides() {
        let _guard = lock_env();

        std::env::set_var("NEWSWIRE_SITE_BASE_URL", "https://override.example.com");
        std::env::set_var("NEWSWIRE_DATABASE_URL", "/tmp/override.db");
        std::env::set_var("NEWSWIRE_CACHE_TTL_SECONDS", "120");
        std::env::set_var("NEWSWIRE_RETENTION_TOKEN_DAYS", "14");

        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load_with_env(path).unwrap();

        assert_eq!(config.site.base_url, "https://override.example.com");
        assert_eq!(config.database.url, "/tmp/override.db");
        assert_eq!(config.cache.ttl_seconds, 120);
        assert_eq!(config.retention.token_days, 14);

        std::env::remove_var("NEWSWIRE_SITE_BASE_URL");
        std::env::remove_var("NEWSWIRE_DATABASE_URL");
        std::env::remove_var("NEWSWIRE_CACHE_TTL_SECONDS");
        std::env::remove_var("NEWSWIRE_RETENTION_TOKEN_DAYS");
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();

        std::env::set_var("NEWSWIRE_CACHE_DRIVER", "memcached");
        std::env::set_var("NEWSWIRE_CACHE_TTL_SECONDS", "not-a-number");

        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load_with_env(path).unwrap();

        assert_eq!(config.cache.driver, CacheDriver::Memory);
        assert_eq!(config.cache.ttl_seconds, 3600);

        std::env::remove_var("NEWSWIRE_CACHE_DRIVER");
        std::env::remove_var("NEWSWIRE_CACHE_TTL_SECONDS");
    }
}
