//! Server configuration
//!
//! Configuration is loaded from an optional TOML file (path taken from the
//! `VESTA_CONFIG` environment variable, defaulting to `vesta.toml`), then
//! overridden by individual `VESTA_*` environment variables. Every field has
//! a default so an empty file and a bare environment both work.

use anyhow::Context as _;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_min_size: 0,
            pool_max_size: 10,
            pool_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When disabled, every caller is treated as an elevated system
    /// principal. Intended for embedded and test deployments only.
    pub enabled: bool,
    /// HS256 secret used to validate bearer tokens.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Upper bound on one $import batch, counting concepts plus properties.
    /// Oversized batches are rejected before a transaction is opened.
    pub max_batch: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { max_batch: 10_000 }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("VESTA_CONFIG").unwrap_or_else(|_| "vesta.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read config file {path}"))?;
            toml::from_str(&raw).with_context(|| format!("parse config file {path}"))?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VESTA_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(host) = std::env::var("VESTA_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("VESTA_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("VESTA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(enabled) = std::env::var("VESTA_AUTH_ENABLED") {
            self.auth.enabled = enabled.eq_ignore_ascii_case("true") || enabled == "1";
        }
        if let Ok(secret) = std::env::var("VESTA_AUTH_SECRET") {
            self.auth.secret = Some(secret);
        }
        if let Ok(max) = std::env::var("VESTA_IMPORT_MAX_BATCH") {
            if let Ok(max) = max.parse() {
                self.import.max_batch = max;
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("database.url must be set (or VESTA_DATABASE_URL)".to_string());
        }
        if self.auth.enabled && self.auth.secret.is_none() {
            return Err("auth.secret must be set when auth is enabled".to_string());
        }
        if self.import.max_batch == 0 {
            return Err("import.max_batch must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .context("invalid server.host / server.port")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.import.max_batch, 10_000);
        assert!(!config.auth.enabled);
    }

    #[test]
    fn validate_requires_database_url() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.url = "postgres://localhost/vesta".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_secret_when_auth_enabled() {
        let mut config = Config::default();
        config.database.url = "postgres://localhost/vesta".to_string();
        config.auth.enabled = true;
        assert!(config.validate().is_err());

        config.auth.secret = Some("hush".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_toml_sections() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [database]
            url = "postgres://localhost/vesta"
            pool_max_size = 4

            [import]
            max_batch = 500
            "#,
        )
        .expect("parse config");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.pool_max_size, 4);
        assert_eq!(config.import.max_batch, 500);
    }
}
