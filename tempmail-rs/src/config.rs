use crate::error::{MailError, Result};
use crate::storage::redis::RedisConnectOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `TEMPMAIL__STORAGE__MODE=redis`
pub const ENV_PREFIX: &str = "TEMPMAIL";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub smtp: SmtpConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub hostname: String,
    /// Recipient domains this instance accepts mail for
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub listen_addr: String,
    pub max_message_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// One of `memory`, `redis` (alias `cache`), `sql` (aliases `sqlite`, `relational`)
    pub mode: String,
    pub redis: RedisConfig,
    pub sql: SqlConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port` or a full `redis://` URL
    pub addr: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub connect_timeout_ms: u64,
    /// Per-command deadline; a hung server fails the call with `Unavailable`
    pub response_timeout_ms: u64,
    pub connect_retries: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SqlConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub eviction_interval_secs: u64,
    pub eviction_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "mail.localhost".to_string(),
            allowed_domains: Vec::new(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:25".to_string(),
            max_message_size: 256 * 1024,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:80".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: "memory".to_string(),
            redis: RedisConfig::default(),
            sql: SqlConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: None,
            password: None,
            db: 0,
            connect_timeout_ms: 2000,
            response_timeout_ms: 2000,
            connect_retries: 1,
        }
    }
}

impl RedisConfig {
    pub fn connect_options(&self) -> RedisConnectOptions {
        RedisConnectOptions {
            connection_timeout: Duration::from_millis(self.connect_timeout_ms.max(1)),
            response_timeout: Duration::from_millis(self.response_timeout_ms.max(1)),
            retries: self.connect_retries,
        }
    }
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            eviction_interval_secs: 300,
            eviction_limit: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then the optional TOML file, then `TEMPMAIL__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_domains")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize::<Config>().map_err(MailError::from)
    }

    /// Startup checks that must hold before any listener is bound
    pub fn validate(&self) -> Result<()> {
        if self.server.allowed_domains.iter().all(|d| d.trim().is_empty()) {
            return Err(MailError::Config(
                "server.allowed_domains must list at least one domain".to_string(),
            ));
        }
        if self.memory_eviction_interval().is_zero() {
            return Err(MailError::Config(
                "storage.memory.eviction_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn memory_eviction_interval(&self) -> Duration {
        Duration::from_secs(self.storage.memory.eviction_interval_secs)
    }
}
