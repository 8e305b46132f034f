//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// FleetPulse - fleet record ingestion and aggregation service
///
/// Watches a directory of append-only JSON fleet records (drivers,
/// shipments, invoices, vehicles), derives risk and compliance
/// statistics, and serves them over HTTP with a bounded staleness
/// window.
///
/// Examples:
///   fleetpulse --data-dir ./data/streams
///   fleetpulse --host 0.0.0.0 --port 9000
///   fleetpulse --scan --data-dir ./data/streams
///   fleetpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory holding the record stream files
    ///
    /// Overrides the `[store] data_dir` config value.
    /// Can also be set via FLEETPULSE_DATA_DIR.
    #[arg(short, long, value_name = "DIR", env = "FLEETPULSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Freshness window for per-kind queries, in seconds
    #[arg(long, value_name = "SECS")]
    pub kind_ttl: Option<u64>,

    /// Freshness window for the full stats view, in seconds
    #[arg(long, value_name = "SECS")]
    pub stats_ttl: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fleetpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Scan the data directory once, print the snapshot, and exit
    ///
    /// No HTTP server is started.
    #[arg(long)]
    pub scan: bool,

    /// Generate a default .fleetpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(port) = self.port {
            if port == 0 {
                return Err("Port must be nonzero".to_string());
            }
        }

        if let Some(ttl) = self.kind_ttl {
            if ttl == 0 {
                return Err("Kind TTL must be at least 1 second".to_string());
            }
        }

        if let Some(ttl) = self.stats_ttl {
            if ttl == 0 {
                return Err("Stats TTL must be at least 1 second".to_string());
            }
        }

        if let Some(ref data_dir) = self.data_dir {
            if data_dir.exists() && !data_dir.is_dir() {
                return Err(format!(
                    "Data path is not a directory: {}",
                    data_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            data_dir: None,
            host: None,
            port: None,
            kind_ttl: None,
            stats_ttl: None,
            config: None,
            verbose: false,
            quiet: false,
            scan: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_port() {
        let mut args = make_args();
        args.port = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_ttl() {
        let mut args = make_args();
        args.kind_ttl = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
