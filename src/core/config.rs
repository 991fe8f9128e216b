//! Configuration management

use crate::db::provider::StorageBackend;
use clap::Parser;
use config::{
    builder::DefaultState, Config as ConfigBuilder, ConfigBuilder as Builder,
    ConfigError as BuilderError, Environment, File,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServer(String),

    #[error("Invalid storage configuration: {0}")]
    InvalidStorage(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),

    #[error("Invalid cache configuration: {0}")]
    InvalidCache(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
}

/// Seed a builder with every default value
fn with_defaults(builder: Builder<DefaultState>) -> Result<Builder<DefaultState>, ConfigError> {
    Ok(builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 3000)?
        .set_default("server.request_timeout", 30)?
        .set_default("storage.backend", "localstorage")?
        .set_default("storage.sqlite_path", "./data/lunatv.db")?
        .set_default("storage.pool_size", 8)?
        .set_default("storage.busy_timeout", 5000)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")?
        .set_default("security.jwt_secret", "change-this-secret-in-production")?
        .set_default("security.token_ttl_hours", 24 * 7)?
        .set_default("security.allowed_origins", vec!["*"])?
        .set_default("cache.version", "1.0.0")?
        .set_default("cache.ttl_secs", 60 * 60)?
        .set_default("cache.max_bytes", 15 * 1024 * 1024)?
        .set_default("cache.retention_days", 60)?)
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        Self::load_with(&cli_args)
    }

    /// Load configuration from already parsed command-line arguments
    pub fn load_with(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = with_defaults(ConfigBuilder::builder())?;

        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(config_path.display().to_string()));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // Example: LUNATV_STORAGE__BACKEND=upstash
        builder = builder.add_source(
            Environment::with_prefix("LUNATV")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = &cli_args.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli_args.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(backend) = &cli_args.storage {
            builder = builder.set_override("storage.backend", backend.clone())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let config: Config = with_defaults(ConfigBuilder::builder())?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults only. Used by tests and embedded callers.
    pub fn defaults() -> Result<Self, ConfigError> {
        let config: Config = with_defaults(ConfigBuilder::builder())?
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.security.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// Command-line arguments for configuration override
#[derive(Debug, Default, Parser)]
#[command(name = "lunatv")]
#[command(about = "LunaTV user-data server", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Storage backend (localstorage, memory, sqlite, upstash)
    #[arg(short, long, value_name = "BACKEND")]
    pub storage: Option<String>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64, // seconds
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidServer("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidServer("port must be greater than 0".to_string()));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidServer(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub sqlite_path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout: u64, // milliseconds
    pub upstash_url: Option<String>,
    pub upstash_token: Option<String>,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_backend().map(|_| ())
    }

    /// Resolve the configured backend into its tagged form
    pub fn to_backend(&self) -> Result<StorageBackend, ConfigError> {
        match self.backend.as_str() {
            "localstorage" => Ok(StorageBackend::LocalStorage),
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => {
                if self.sqlite_path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidStorage(
                        "sqlite_path cannot be empty".to_string(),
                    ));
                }
                if self.pool_size == 0 {
                    return Err(ConfigError::InvalidStorage(
                        "pool_size must be greater than 0".to_string(),
                    ));
                }
                Ok(StorageBackend::Sqlite {
                    path: self.sqlite_path.clone(),
                    pool_size: self.pool_size,
                    busy_timeout: Duration::from_millis(self.busy_timeout),
                })
            }
            "upstash" => {
                let url = self.upstash_url.as_deref().map(str::trim).unwrap_or_default();
                let token = self.upstash_token.as_deref().map(str::trim).unwrap_or_default();
                if url.is_empty() || token.is_empty() {
                    return Err(ConfigError::InvalidStorage(
                        "upstash_url and upstash_token must be set for the upstash backend"
                            .to_string(),
                    ));
                }
                Ok(StorageBackend::Upstash {
                    url: url.to_string(),
                    token: token.to_string(),
                })
            }
            other => Err(ConfigError::InvalidStorage(format!(
                "backend must be one of localstorage, memory, sqlite, upstash (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "level must be one of: {:?}",
                valid_levels
            )));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub owner_username: Option<String>,
    pub owner_password: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl SecurityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidSecurity("jwt_secret cannot be empty".to_string()));
        }

        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidSecurity(
                "token_ttl_hours must be greater than 0".to_string(),
            ));
        }

        if self.owner_username.is_some() != self.owner_password.is_some() {
            return Err(ConfigError::InvalidSecurity(
                "owner_username and owner_password must be set together".to_string(),
            ));
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidSecurity("allowed_origins cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub version: String,
    pub ttl_secs: u64,
    pub max_bytes: usize,
    pub retention_days: u64,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(ConfigError::InvalidCache("version cannot be empty".to_string()));
        }

        if self.ttl_secs == 0 {
            return Err(ConfigError::InvalidCache("ttl_secs must be greater than 0".to_string()));
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::InvalidCache("max_bytes must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, "localstorage");
        assert_eq!(config.cache.version, "1.0.0");
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.max_bytes, 15 * 1024 * 1024);
        assert!(matches!(
            config.storage.to_backend().unwrap(),
            StorageBackend::LocalStorage
        ));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nbackend = \"sqlite\"\nsqlite_path = \"/tmp/luna.db\"\n\n[server]\nport = 8080"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        match config.storage.to_backend().unwrap() {
            StorageBackend::Sqlite { path, pool_size, .. } => {
                assert_eq!(path, PathBuf::from("/tmp/luna.db"));
                assert_eq!(pool_size, 8);
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_upstash_requires_credentials() {
        let mut storage = Config::defaults().unwrap().storage;
        storage.backend = "upstash".to_string();
        storage.upstash_url = Some("https://eu1.upstash.io".to_string());
        assert!(matches!(storage.validate(), Err(ConfigError::InvalidStorage(_))));

        storage.upstash_token = Some("  secret  ".to_string());
        match storage.to_backend().unwrap() {
            StorageBackend::Upstash { token, .. } => assert_eq!(token, "secret"),
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut storage = Config::defaults().unwrap().storage;
        storage.backend = "kvrocks".to_string();
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_owner_credentials_must_pair() {
        let mut security = Config::defaults().unwrap().security;
        security.owner_username = Some("root".to_string());
        assert!(security.validate().is_err());
        security.owner_password = Some("pw".to_string());
        assert!(security.validate().is_ok());
    }

    #[test]
    fn test_logging_file_requires_path() {
        let mut logging = Config::defaults().unwrap().logging;
        logging.output = "file".to_string();
        assert!(logging.validate().is_err());
        logging.log_file = Some(PathBuf::from("./logs/lunatv.log"));
        assert!(logging.validate().is_ok());
    }
}
