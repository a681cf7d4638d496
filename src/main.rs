//! Relay node - multi-chain token transfer execution
//!
//! Starts one blockchain client per active chain, serves the health API and
//! metrics, and periodically flushes RPC endpoint health to the store.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use relay_node::api::{self, AppState};
use relay_node::chain::ClientRegistry;
use relay_node::config::Settings;
use relay_node::health::NodeHealthMonitor;
use relay_node::jobs::TokioJobExecutor;
use relay_node::metrics::MetricsServer;
use relay_node::state::{MemoryHealthStore, NodesHealthStore, StateManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting relay node v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} active chains",
        settings.active_chains().len()
    );

    // Health store: PostgreSQL when configured, in memory otherwise
    let (store, state_manager): (Arc<dyn NodesHealthStore>, Option<Arc<StateManager>>) =
        match &settings.database {
            Some(database) => {
                let state_manager = Arc::new(StateManager::new(database).await?);
                state_manager.run_migrations().await?;
                info!("Database connection established");
                (state_manager.clone() as Arc<dyn NodesHealthStore>, Some(state_manager))
            }
            None => {
                warn!("No database configured, node health is kept in memory");
                (Arc::new(MemoryHealthStore::new()) as Arc<dyn NodesHealthStore>, None)
            }
        };

    let health = Arc::new(NodeHealthMonitor::new());
    let executor = Arc::new(TokioJobExecutor::new());

    // One client per active chain
    let registry = Arc::new(ClientRegistry::new(
        &settings,
        health.clone(),
        executor.clone(),
    )?);
    info!("Blockchain clients initialized");

    // Contract compatibility with the configured protocol version
    for blockchain in registry.blockchains() {
        let Some(client) = registry.get(blockchain) else {
            continue;
        };
        match client.is_protocol_version_supported_by_hub_contract().await {
            Ok(true) => {}
            Ok(false) => warn!(%blockchain, version = %client.protocol_version(), "Hub contract does not support protocol version"),
            Err(e) => warn!(%blockchain, error = %e, "Unable to check hub contract protocol version"),
        }
        match client.is_protocol_version_supported_by_forwarder_contract().await {
            Ok(true) => {}
            Ok(false) => warn!(%blockchain, version = %client.protocol_version(), "Forwarder contract does not support protocol version"),
            Err(e) => warn!(%blockchain, error = %e, "Unable to check forwarder contract protocol version"),
        }
    }

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            store: store.clone(),
            state_manager: state_manager.clone(),
            blockchains: registry.blockchains(),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {:#}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {:#}", e);
            }
        }))
    } else {
        None
    };

    // Node health flush loop
    let flush_handle = tokio::spawn({
        let health = health.clone();
        let store = store.clone();
        let interval = Duration::from_secs(settings.node.health_flush_interval_secs);
        async move {
            loop {
                tokio::time::sleep(interval).await;

                if let Err(e) = health.flush(store.as_ref()).await {
                    warn!("Node health flush failed: {}", e);
                }
            }
        }
    });

    info!("Relay node is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Outstanding submission watchers and dependent jobs are dropped
    executor.stop();
    flush_handle.abort();
    if let Err(e) = health.flush(store.as_ref()).await {
        warn!("Final node health flush failed: {}", e);
    }

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Relay node stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,relay_node=debug,sqlx=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
