use crate::reader::EmptyResultPolicy;
use crate::store::ClientOptions;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors found while validating a loaded configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Main configuration for the flash sale service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Document store connection
    pub database: DatabaseConfig,
    /// Collection names
    #[serde(default)]
    pub collections: CollectionsConfig,
    /// Threshold search behaviour
    #[serde(default)]
    pub reader: ReaderConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Which store implementation backs the collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

/// Connection settings shared by every collection
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Store hosts (`host[:port]`), tried in order
    pub hosts: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Connection timeout in milliseconds
    #[serde(default = "default_timeout_milliseconds")]
    pub timeout_milliseconds: u32,
    /// Database holding the collections
    pub database: String,
    #[serde(default)]
    pub backend: StoreBackend,
    /// Maximum number of pooled connections per collection handle
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Collection names
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_flash_collection")]
    pub flash: String,
    #[serde(default = "default_metric_collection")]
    pub metric: String,
    #[serde(default = "default_inventory_collection")]
    pub inventory: String,
}

/// Threshold search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    /// Report a search with no matches as an error
    #[serde(default = "default_true")]
    pub empty_result_is_error: bool,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Largest flash sale batch accepted per request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

/// Connection settings for a single collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub hosts: Vec<String>,
    pub username: String,
    pub password: String,
    pub timeout_milliseconds: u32,
    pub database: String,
    pub collection: String,
}

impl DbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_milliseconds))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            hosts: self.hosts.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.timeout(),
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    "flash-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_timeout_milliseconds() -> u32 {
    3000
}

fn default_max_connections() -> u32 {
    10
}

fn default_flash_collection() -> String {
    "flash".to_string()
}

fn default_metric_collection() -> String {
    "metric".to_string()
}

fn default_inventory_collection() -> String {
    "inventory".to_string()
}

fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_batch_size() -> usize {
    500
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::builder()?
            // Add config file if present
            .add_source(config::File::with_name("config/flash").required(false))
            .add_source(config::File::with_name("/etc/flash/flash").required(false))
            // Override with environment variables
            // FLASH__DATABASE__HOSTS=db1:5432,db2:5432 -> database.hosts
            .add_source(
                config::Environment::with_prefix("FLASH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("database.hosts")
                    .with_list_parse_key("api.cors_origins"),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config = Self::builder()?
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "flash-service")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?)
    }

    /// Reject settings the store would refuse anyway
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.hosts.is_empty() {
            return Err(ConfigError::MissingRequired("database.hosts".to_string()));
        }
        if self.database.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "database.hosts".to_string(),
                message: "host addresses must not be empty".to_string(),
            });
        }
        if self.database.database.is_empty() {
            return Err(ConfigError::MissingRequired("database.database".to_string()));
        }

        for (key, name) in [
            ("collections.flash", &self.collections.flash),
            ("collections.metric", &self.collections.metric),
            ("collections.inventory", &self.collections.inventory),
        ] {
            if name.is_empty() {
                return Err(ConfigError::MissingRequired(key.to_string()));
            }
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "database.max_connections".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.api.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.max_batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Connection settings for one collection
    pub fn db_config(&self, collection: &str) -> DbConfig {
        DbConfig {
            hosts: self.database.hosts.clone(),
            username: self.database.username.clone(),
            password: self.database.password.clone(),
            timeout_milliseconds: self.database.timeout_milliseconds,
            database: self.database.database.clone(),
            collection: collection.to_string(),
        }
    }

    pub fn empty_result_policy(&self) -> EmptyResultPolicy {
        if self.reader.empty_result_is_error {
            EmptyResultPolicy::NotFound
        } else {
            EmptyResultPolicy::Empty
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            flash: default_flash_collection(),
            metric: default_metric_collection(),
            inventory: default_inventory_collection(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            empty_result_is_error: default_true(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            max_batch_size: default_max_batch_size(),
        }
    }
}
