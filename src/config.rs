//! Command line and environment configuration.

use crate::error::ConfigError;
use crate::NewService;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Listening address for the API
    #[arg(short, long, env = "STATUSBOARD_ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// JSON file listing the services to register at startup
    #[arg(short, long, env = "STATUSBOARD_SERVICES")]
    pub services: Option<PathBuf>,

    /// Maximum number of pending ingestion requests
    #[arg(long, env = "STATUSBOARD_QUEUE_CAPACITY", default_value_t = 32)]
    pub queue_capacity: usize,

    #[arg(long, env = "STATUSBOARD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        self.address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid address {}: {e}", self.address)))
    }
}

/// Read a seed file: a JSON array of services.
pub fn load_services(path: &Path) -> Result<Vec<NewService>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
