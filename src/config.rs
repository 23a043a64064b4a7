//! Configuration module for CHS Archive.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{ArchiveError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL used to build share links.
    ///
    /// When empty, links are built from the request's `Host` header.
    #[serde(default)]
    pub public_base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: String::new(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the stored files.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Allowed file extensions (case-insensitive). Empty allows everything.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_storage_path() -> String {
    "uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    10
}

fn default_allowed_extensions() -> Vec<String> {
    ["jpeg", "jpg", "png", "gif", "pdf", "txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Retention configuration for idle uploads.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Days without access before a file is deleted.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Interval between sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_retention_days() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    24 * 60 * 60 // daily
}

impl RetentionConfig {
    /// Retention window as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// HTTP middleware configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Rate limit window in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    /// Maximum requests per client IP within one window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_requests: u32,
    /// Identify clients by `X-Forwarded-For` / `X-Real-IP` instead of the
    /// socket peer. Only safe behind a proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "https://c0h0s.github.io".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_rate_limit_window() -> u64 {
    15 * 60 // 15 minutes
}

fn default_rate_limit_max() -> u32 {
    100
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            rate_limit_window_secs: default_rate_limit_window(),
            rate_limit_max_requests: default_rate_limit_max(),
            trust_proxy_headers: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty logs to the console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Retention configuration.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// HTTP middleware configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ArchiveError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ArchiveError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PORT`: listening port
    /// - `UPLOAD_DIR`: storage directory
    /// - `BACKEND_URL`: public base URL for share links
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT override"),
            }
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.storage.path = dir;
        }
        if let Some(url) = get("BACKEND_URL") {
            self.server.public_base_url = url;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(ArchiveError::Config(
                "storage.path must not be empty".to_string(),
            ));
        }
        if self.storage.max_upload_size_mb == 0 {
            return Err(ArchiveError::Config(
                "storage.max_upload_size_mb must be greater than 0".to_string(),
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ArchiveError::Config(
                "retention.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.web.rate_limit_window_secs == 0 || self.web.rate_limit_max_requests == 0 {
            return Err(ArchiveError::Config(
                "web rate limit window and max requests must be greater than 0".to_string(),
            ));
        }
        if !self.server.public_base_url.is_empty() {
            let parsed = url::Url::parse(&self.server.public_base_url).map_err(|e| {
                ArchiveError::Config(format!("server.public_base_url is not a valid URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ArchiveError::Config(
                    "server.public_base_url must use http or https".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 10000);
        assert!(config.server.public_base_url.is_empty());

        assert_eq!(config.storage.path, "uploads");
        assert_eq!(config.storage.max_upload_size_mb, 10);
        assert_eq!(config.storage.max_upload_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(
            config.storage.allowed_extensions,
            vec!["jpeg", "jpg", "png", "gif", "pdf", "txt"]
        );

        assert_eq!(config.retention.retention_days, 30);
        assert_eq!(config.retention.sweep_interval_secs, 86400);
        assert_eq!(
            config.retention.retention(),
            Duration::from_secs(30 * 24 * 60 * 60)
        );

        assert_eq!(config.web.cors_origins.len(), 2);
        assert_eq!(config.web.rate_limit_window_secs, 900);
        assert_eq!(config.web.rate_limit_max_requests, 100);
        assert!(!config.web.trust_proxy_headers);

        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 3000
public_base_url = "https://files.example.com"

[storage]
path = "/var/lib/archive"
max_upload_size_mb = 25
allowed_extensions = ["png", "zip"]

[retention]
retention_days = 7
sweep_interval_secs = 3600

[web]
cors_origins = ["http://localhost:5173"]
rate_limit_window_secs = 60
rate_limit_max_requests = 10
trust_proxy_headers = true

[logging]
level = "debug"
file = "logs/archive.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.public_base_url, "https://files.example.com");
        assert_eq!(config.storage.path, "/var/lib/archive");
        assert_eq!(config.storage.max_upload_size_mb, 25);
        assert_eq!(config.storage.allowed_extensions, vec!["png", "zip"]);
        assert_eq!(config.retention.retention_days, 7);
        assert_eq!(config.retention.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.web.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.web.rate_limit_window_secs, 60);
        assert_eq!(config.web.rate_limit_max_requests, 10);
        assert!(config.web.trust_proxy_headers);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "logs/archive.log");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
allowed_extensions = []
"#;

        let config = Config::parse(toml).unwrap();

        assert!(config.storage.allowed_extensions.is_empty());
        assert_eq!(config.storage.path, "uploads");
        assert_eq!(config.server.port, 10000);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(ArchiveError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "8081"),
            ("UPLOAD_DIR", "/tmp/uploads"),
            ("BACKEND_URL", "https://cdn.example.org"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.storage.path, "/tmp/uploads");
        assert_eq!(config.server.public_base_url, "https://cdn.example.org");
    }

    #[test]
    fn test_apply_overrides_ignores_empty_and_invalid() {
        let mut config = Config::default();
        config.storage.path = "original".to_string();

        config.apply_overrides(|key| match key {
            "PORT" => Some("not-a-port".to_string()),
            "UPLOAD_DIR" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.server.port, 10000);
        assert_eq!(config.storage.path, "original");
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.server.public_base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ArchiveError::Config(_))));

        config.server.public_base_url = "ftp://files.example.com".to_string();
        assert!(matches!(config.validate(), Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.storage.max_upload_size_mb = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retention.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.web.rate_limit_max_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_limits_saturate() {
        let mut config = Config::default();
        config.storage.max_upload_size_mb = u64::MAX;
        config.retention.retention_days = u64::MAX;

        assert_eq!(config.storage.max_upload_size_bytes(), u64::MAX);
        assert_eq!(config.retention.retention(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }
}
