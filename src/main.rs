use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use envoy_configurator::{
    config::AppConfig,
    observability::{init_observability, log_config_info},
    services::ConfigurationService,
    startup,
    xds::SnapshotCache,
    Error, Result, APP_NAME, VERSION,
};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Envoy configuration core
#[derive(Debug, Parser)]
#[command(name = "envoy-configurator", version, about)]
struct Cli {
    /// Node id snapshots are installed for (overrides CONFIGURATOR_NODE_ID)
    #[arg(long)]
    node_id: Option<String>,

    /// Change requests to replay at startup (overrides CONFIGURATOR_BOOTSTRAP_FILE)
    #[arg(long)]
    bootstrap: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(bootstrap) = cli.bootstrap {
        config.bootstrap_file = Some(bootstrap);
    }
    config.observability.debug |= cli.debug;
    config.validate()?;

    init_observability(&config.observability);
    info!(app_name = APP_NAME, version = VERSION, "Starting Envoy configurator");
    log_config_info(&config);

    let cache = Arc::new(SnapshotCache::new());
    let service = ConfigurationService::new(config.node_id.clone(), cache.clone());

    let mut updates = cache.subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(snapshot) => info!(
                    node_id = %snapshot.node_id,
                    version = snapshot.version,
                    clusters = snapshot.clusters.len(),
                    routes = snapshot.routes.len(),
                    listeners = snapshot.listeners.len(),
                    "Snapshot installed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Snapshot watcher lagged behind installs")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(path) = &config.bootstrap_file {
        let summary = startup::bootstrap(&service, path)?;
        if summary.rejected > 0 || summary.not_live > 0 {
            warn!(
                rejected = summary.rejected,
                not_live = summary.not_live,
                "Bootstrap finished with failures"
            );
        }
    } else {
        // Publish an empty snapshot so the node has a version from the start.
        service.rebuild()?;
    }

    let status = service.status();
    info!(
        node_id = %status.node_id,
        version = ?status.published_version,
        clusters = status.clusters.len(),
        route_tables = status.route_tables.len(),
        listeners = status.listeners.len(),
        "Configuration ready"
    );

    signal::ctrl_c()
        .await
        .map_err(|e| Error::io("Failed to listen for shutdown signal", e))?;
    info!("Shutdown signal received");

    watcher.abort();
    Ok(())
}
