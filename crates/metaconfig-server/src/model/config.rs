//! Configuration management for the Metaconfig server
//!
//! Values come from `conf/application.yml`, then `METACONFIG`-prefixed
//! environment variables, then command line arguments, each layer
//! overriding the previous one.

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use metaconfig_persistence::TableMapping;

use super::tls::TlsConfig;
use crate::startup::logging::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_CONTEXT_PATH: &str = "/api/metacfg";

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "metaconfig-server", version, about)]
pub struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Storage backend: db or memory
    #[arg(short = 's', long = "storage")]
    pub storage: Option<String>,
}

/// Where configs are kept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageMode {
    #[default]
    Db,
    Memory,
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" | "database" => Ok(StorageMode::Db),
            "memory" | "mem" => Ok(StorageMode::Memory),
            other => anyhow::bail!("unknown storage mode '{}', expected db or memory", other),
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Db => write!(f, "db"),
            StorageMode::Memory => write!(f, "memory"),
        }
    }
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> anyhow::Result<Self> {
        let mut config_builder = Config::builder()
            .add_source(File::with_name(&args.config_file).required(false))
            .add_source(
                Environment::with_prefix("METACONFIG")
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(v) = args.database_url {
            config_builder = config_builder.set_override("db.url", v)?;
        }
        if let Some(v) = args.port {
            config_builder = config_builder.set_override("server.port", i64::from(v))?;
        }
        if let Some(v) = args.storage {
            config_builder = config_builder.set_override("storage.mode", v)?;
        }

        let config = config_builder.build()?;

        Ok(Configuration { config })
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string("server.address")
            .unwrap_or("0.0.0.0".to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int("server.port")
            .unwrap_or(DEFAULT_SERVER_PORT.into()) as u16
    }

    /// Context path with a leading slash and no trailing one; empty for root.
    pub fn server_context_path(&self) -> String {
        let path = self
            .config
            .get_string("server.context_path")
            .unwrap_or(DEFAULT_CONTEXT_PATH.to_string());
        let path = path.trim_matches('/');

        if path.is_empty() {
            String::new()
        } else {
            format!("/{}", path)
        }
    }

    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig {
            enabled: self.config.get_bool("server.tls.enabled").unwrap_or(false),
            cert_path: self
                .config
                .get_string("server.tls.cert_path")
                .ok()
                .map(PathBuf::from),
            key_path: self
                .config
                .get_string("server.tls.key_path")
                .ok()
                .map(PathBuf::from),
        }
    }

    // ========================================================================
    // Storage Configuration
    // ========================================================================

    pub fn storage_mode(&self) -> anyhow::Result<StorageMode> {
        match self.config.get_string("storage.mode") {
            Ok(mode) => mode.parse(),
            Err(_) => Ok(StorageMode::default()),
        }
    }

    pub fn table_mapping(&self) -> TableMapping {
        let defaults = TableMapping::default();
        let table = |key: &str, default: String| {
            self.config
                .get_string(&format!("db.mapping.{}", key))
                .unwrap_or(default)
        };

        TableMapping {
            configs: table("configs", defaults.configs),
            config_attributes: table("config_attributes", defaults.config_attributes),
            properties: table("properties", defaults.properties),
            property_attributes: table("property_attributes", defaults.property_attributes),
        }
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let max_connections = self
            .config
            .get_int("db.pool.max_connections")
            .unwrap_or(10) as u32;
        let min_connections = self
            .config
            .get_int("db.pool.min_connections")
            .unwrap_or(1) as u32;
        let connect_timeout = self
            .config
            .get_int("db.pool.connect_timeout")
            .unwrap_or(30) as u64;
        let sqlx_logging = self
            .config
            .get_bool("db.pool.sqlx_logging")
            .unwrap_or(false);

        let url = self.config.get_string("db.url")?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .sqlx_logging(sqlx_logging);

        tracing::info!(
            max_connections,
            min_connections,
            connect_timeout,
            sqlx_logging,
            "Database connection pool configured"
        );

        Ok(Database::connect(opt).await?)
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string("log.dir").ok(),
            self.config.get_bool("log.console").unwrap_or(true),
            self.config.get_bool("log.file").unwrap_or(true),
            self.config
                .get_string("log.level")
                .unwrap_or("info".to_string()),
        )
    }
}
