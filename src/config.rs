//! Server configuration: CLI and environment on top of an optional TOML file.
//!
//! Precedence is CLI > environment > file > defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use ferropath_core::ContextConfig;
use ferropath_core::crs::{MTM_ZONE_7_EPSG, WGS84_EPSG};
use ferropath_core::loading::DataSourceConfig;
use ferropath_core::routing::SelectionStrategy;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Command line, with environment fallbacks
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ferropath", version, about = "Address search and street routing service")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "FERROPATH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "FERROPATH_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Address gazetteer (GeoJSON or CSV)
    #[arg(long, env = "DATA_ADDRESS")]
    pub addresses: Option<PathBuf>,

    /// Street network (GeoJSON)
    #[arg(long, env = "DATA_STREETS")]
    pub streets: Option<PathBuf>,

    /// SQLite database: a path, `sqlite://path` or `:memory:`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen_addr: SocketAddr,
    pub request_timeout_ms: u64,
    pub max_concurrent_requests: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            request_timeout_ms: 10_000,
            max_concurrent_requests: 64,
        }
    }
}

impl ServerSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSection {
    pub address_path: Option<PathBuf>,
    pub streets_path: Option<PathBuf>,
    pub label_property: String,
    pub id_property: String,
    pub streets_epsg: u32,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            address_path: None,
            streets_path: None,
            label_property: "ADRESSE".to_string(),
            id_property: "OBJECTID".to_string(),
            streets_epsg: MTM_ZONE_7_EPSG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrsSection {
    pub geographic_epsg: u32,
    pub projected_epsg: u32,
}

impl Default for CrsSection {
    fn default() -> Self {
        Self {
            geographic_epsg: WGS84_EPSG,
            projected_epsg: MTM_ZONE_7_EPSG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    pub snap_tolerance: f64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            snap_tolerance: ferropath_core::DEFAULT_SNAP_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySection {
    pub min_query_len: usize,
    pub suggestion_limit: usize,
    pub selection: SelectionStrategy,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            min_query_len: ferropath_core::address_index::DEFAULT_MIN_QUERY_LEN,
            suggestion_limit: ferropath_core::address_index::DEFAULT_SUGGESTION_LIMIT,
            selection: SelectionStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub database: String,
    pub pool_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: "ferropath.db".to_string(),
            pool_size: 8,
        }
    }
}

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Memory,
    File(PathBuf),
}

impl StorageSection {
    pub fn location(&self) -> StorageLocation {
        let database = self.database.trim();
        let path = database
            .strip_prefix("sqlite://")
            .or_else(|| database.strip_prefix("sqlite:"))
            .unwrap_or(database);
        if path.is_empty() || path == ":memory:" {
            StorageLocation::Memory
        } else {
            StorageLocation::File(PathBuf::from(path))
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSection,
    pub data: DataSection,
    pub crs: CrsSection,
    pub network: NetworkSection,
    pub query: QuerySection,
    pub storage: StorageSection,
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            geographic_epsg: self.crs.geographic_epsg,
            projected_epsg: self.crs.projected_epsg,
            snap_tolerance: self.network.snap_tolerance,
            min_query_len: self.query.min_query_len,
            suggestion_limit: self.query.suggestion_limit,
            selection: self.query.selection,
        }
    }

    pub fn data_source_config(&self) -> Result<DataSourceConfig, ConfigError> {
        let addresses = self
            .data
            .address_path
            .clone()
            .ok_or(ConfigError::Missing("address file (--addresses / DATA_ADDRESS)"))?;
        let streets = self
            .data
            .streets_path
            .clone()
            .ok_or(ConfigError::Missing("street file (--streets / DATA_STREETS)"))?;

        Ok(DataSourceConfig {
            label_property: self.data.label_property.clone(),
            id_property: self.data.id_property.clone(),
            streets_epsg: self.data.streets_epsg,
            ..DataSourceConfig::new(addresses, streets)
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.storage.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "storage.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Cli {
    /// Loads the config file, if any, and applies CLI/env overrides.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if let Some(listen) = self.listen {
            settings.server.listen_addr = listen;
        }
        if let Some(addresses) = &self.addresses {
            settings.data.address_path = Some(addresses.clone());
        }
        if let Some(streets) = &self.streets {
            settings.data.streets_path = Some(streets.clone());
        }
        if let Some(database_url) = &self.database_url {
            settings.storage.database = database_url.clone();
        }

        settings.validate()?;
        Ok(settings)
    }
}
