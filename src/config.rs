//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fleetpulse.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Aggregation engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8600
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the append-only record files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File-name prefix for driver files.
    #[serde(default = "default_driver_prefix")]
    pub driver_prefix: String,

    /// File-name prefix for shipment files.
    #[serde(default = "default_shipment_prefix")]
    pub shipment_prefix: String,

    /// File-name prefix for invoice files.
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,

    /// File-name prefix for vehicle files.
    #[serde(default = "default_vehicle_prefix")]
    pub vehicle_prefix: String,

    /// Maximum record file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            driver_prefix: default_driver_prefix(),
            shipment_prefix: default_shipment_prefix(),
            invoice_prefix: default_invoice_prefix(),
            vehicle_prefix: default_vehicle_prefix(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/streams")
}

fn default_driver_prefix() -> String {
    "drivers".to_string()
}

fn default_shipment_prefix() -> String {
    "shipments".to_string()
}

fn default_invoice_prefix() -> String {
    "invoices".to_string()
}

fn default_vehicle_prefix() -> String {
    "vehicles".to_string()
}

fn default_max_file_size() -> u64 {
    1024 * 1024 // 1MB
}

/// Aggregation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Freshness window for per-kind record queries, in seconds.
    #[serde(default = "default_kind_ttl")]
    pub kind_ttl_secs: u64,

    /// Freshness window for the comprehensive stats view, in seconds.
    #[serde(default = "default_stats_ttl")]
    pub stats_ttl_secs: u64,

    /// Budget for one snapshot recomputation, in seconds.
    #[serde(default = "default_recompute_timeout")]
    pub recompute_timeout_secs: u64,

    /// Interval between directory fingerprint scans, in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Decimal places for derived means and rates.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind_ttl_secs: default_kind_ttl(),
            stats_ttl_secs: default_stats_ttl(),
            recompute_timeout_secs: default_recompute_timeout(),
            scan_interval_secs: default_scan_interval(),
            precision: default_precision(),
        }
    }
}

fn default_kind_ttl() -> u64 {
    5
}

fn default_stats_ttl() -> u64 {
    30
}

fn default_recompute_timeout() -> u64 {
    10
}

fn default_scan_interval() -> u64 {
    2
}

fn default_precision() -> u32 {
    2
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".fleetpulse.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_dir) = args.data_dir {
            self.store.data_dir = data_dir.clone();
        }
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ttl) = args.kind_ttl {
            self.engine.kind_ttl_secs = ttl;
        }
        if let Some(ttl) = args.stats_ttl {
            self.engine.stats_ttl_secs = ttl;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
