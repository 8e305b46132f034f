//! FleetPulse - fleet record ingestion and aggregation service
//!
//! Watches a directory of append-only JSON record files, normalizes
//! them into typed fleet records, derives risk/compliance statistics,
//! and serves queries over HTTP under an explicit freshness contract.
//!
//! Exit codes:
//!   0 - Clean shutdown (or successful --scan / --init-config)
//!   1 - Runtime error (bind failure, bad config, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use fleetpulse::cli::Args;
use fleetpulse::config::Config;
use fleetpulse::{api, watch};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("FleetPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Handle --scan: one snapshot, no server
    if args.scan {
        return handle_scan(&config);
    }

    match run_server(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Server failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .fleetpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".fleetpulse.toml");

    if path.exists() {
        eprintln!("⚠️  .fleetpulse.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .fleetpulse.toml")?;

    println!("✅ Created .fleetpulse.toml with default settings.");
    println!("   Edit it to customize the data directory, TTLs, and server address.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Handle --scan: load the directory once and print the snapshot.
fn handle_scan(config: &Config) -> Result<()> {
    use fleetpulse::engine::aggregator;
    use fleetpulse::store::loader::{LoadConfig, RecordLoader};

    println!(
        "🔍 Scanning {} (no server started)...\n",
        config.store.data_dir.display()
    );

    let loader = RecordLoader::new(LoadConfig::from(&config.store));
    let outcome = loader.load();
    let snapshot = aggregator::aggregate(&outcome, Utc::now(), config.engine.precision);

    println!(
        "   Files: {} read, {} skipped",
        snapshot.files_read, snapshot.files_skipped
    );
    println!(
        "   Drivers: {} ({} critical, {} high risk, mean safety {})",
        snapshot.drivers.count,
        snapshot.drivers.critical,
        snapshot.drivers.high_risk,
        snapshot.drivers.mean_safety_score
    );
    println!(
        "   Shipments: {} ({} anomalous, total value {})",
        snapshot.shipments.count, snapshot.shipments.anomalies, snapshot.shipments.total_declared_value
    );
    println!(
        "   Invoices: {} ({} overdue, compliance {}%)",
        snapshot.invoices.count, snapshot.invoices.overdue, snapshot.invoices.compliance_rate
    );
    println!(
        "   Vehicles: {} ({} due for maintenance, mean utilization {}%)",
        snapshot.vehicles.count, snapshot.vehicles.maintenance_due, snapshot.vehicles.mean_utilization
    );
    println!("\n✅ Scan complete. {} records total.", snapshot.total_records());
    Ok(())
}

/// Run the HTTP service until interrupted.
async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(api::AppState::from_config(&config));

    let watcher = watch::spawn_watcher(
        Arc::clone(&state.loader),
        Arc::clone(&state.cache),
        Duration::from_secs(config.engine.scan_interval_secs),
    );

    let router = api::build_router(Arc::clone(&state));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Serving {} on http://{}",
        config.store.data_dir.display(),
        listener.local_addr()?
    );

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    // Only reached on server shutdown; the watch task holds no state
    // worth draining.
    watcher.abort();
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .fleetpulse.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
