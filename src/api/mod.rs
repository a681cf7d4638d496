//! HTTP API for liveness, readiness and node health

use crate::chain::Blockchain;
use crate::config::ApiConfig;
use crate::state::{NodesHealth, NodesHealthStore, StateManager};

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NodesHealthStore>,
    /// Present when running against PostgreSQL
    pub state_manager: Option<Arc<StateManager>>,
    /// Chains with an active client
    pub blockchains: Vec<Blockchain>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/nodes", get(nodes_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    axum::serve(listener, router(state))
        .await
        .context("API server failed")?;

    Ok(())
}

async fn liveness_check() -> impl IntoResponse {
    Json(LivenessResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.state_manager {
        Some(manager) => manager.health_check().await.is_ok(),
        None => true,
    };
    let ready = database && !state.blockchains.is_empty();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            database,
            blockchains: state.blockchains.len(),
        }),
    )
}

/// Stored health of every active chain. Chains without a stored record are
/// left out.
async fn nodes_health(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<Blockchain, NodesHealth>>, StatusCode> {
    let mut report = BTreeMap::new();

    for blockchain in &state.blockchains {
        match state.store.read_nodes_health(*blockchain).await {
            Ok(Some(record)) => {
                report.insert(*blockchain, record);
            }
            Ok(None) => {}
            Err(e) => {
                error!(%blockchain, error = %e, "Failed to read node health");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    Ok(Json(report))
}

// Response types

#[derive(Serialize)]
struct LivenessResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
    blockchains: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryHealthStore;

    #[tokio::test]
    async fn test_nodes_health_skips_chains_without_record() {
        let store = Arc::new(MemoryHealthStore::new());
        store
            .upsert_nodes_health(&NodesHealth {
                blockchain: Blockchain::Polygon,
                unhealthy_total: 1,
                unhealthy_endpoints: vec!["https://rpc.example/abcd".to_string()],
                healthy_total: 2,
            })
            .await
            .unwrap();

        let state = AppState {
            store,
            state_manager: None,
            blockchains: vec![Blockchain::Ethereum, Blockchain::Polygon],
        };

        let Json(report) = nodes_health(State(state)).await.unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[&Blockchain::Polygon].unhealthy_total, 1);
        assert_eq!(report[&Blockchain::Polygon].healthy_total, 2);
    }

    #[test]
    fn test_report_serializes_by_chain_key() {
        let report = BTreeMap::from([(Blockchain::BnbChain, NodesHealth::empty(Blockchain::BnbChain))]);

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["bnb_chain"]["unhealthy_total"], 0);
        assert!(json["bnb_chain"]["unhealthy_endpoints"].as_array().unwrap().is_empty());
    }
}
