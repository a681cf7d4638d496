//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - RPC endpoint health
//! - Transaction submissions and resubmissions
//! - Dependent submission jobs
//! - Health flushes

use crate::chain::Blockchain;

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Endpoint metrics
    pub static ref ENDPOINT_HEALTHY: GaugeVec = register_gauge_vec!(
        "relay_node_endpoint_healthy",
        "RPC endpoint health (1=healthy, 0=unhealthy)",
        &["blockchain", "endpoint"]
    ).unwrap();

    pub static ref HEALTH_FLUSHES: CounterVec = register_counter_vec!(
        "relay_node_health_flushes_total",
        "Total node health flushes to the store",
        &[]
    ).unwrap();

    // Submission metrics
    pub static ref SUBMISSIONS_STARTED: CounterVec = register_counter_vec!(
        "relay_node_submissions_started_total",
        "Total transaction submissions started",
        &["blockchain"]
    ).unwrap();

    pub static ref RESUBMISSIONS: CounterVec = register_counter_vec!(
        "relay_node_resubmissions_total",
        "Total rebroadcasts with an increased fee",
        &["blockchain"]
    ).unwrap();

    pub static ref SUBMISSIONS_FAILED: CounterVec = register_counter_vec!(
        "relay_node_submissions_failed_total",
        "Total transaction submissions that failed permanently",
        &["blockchain"]
    ).unwrap();

    pub static ref DEPENDENT_JOBS: CounterVec = register_counter_vec!(
        "relay_node_dependent_jobs_total",
        "Dependent submission jobs by outcome",
        &["blockchain", "outcome"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn router() -> Router {
        Router::new().route("/metrics", get(metrics_handler))
    }

    pub async fn run(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind metrics server to {}", addr))?;
        axum::serve(listener, Self::router())
            .await
            .context("Metrics server failed")?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_endpoint_health(blockchain: Blockchain, endpoint: &str, healthy: bool) {
    ENDPOINT_HEALTHY
        .with_label_values(&[blockchain.key(), endpoint])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_health_flush() {
    HEALTH_FLUSHES.with_label_values(&[]).inc();
}

pub fn record_submission_started(blockchain: Blockchain) {
    SUBMISSIONS_STARTED
        .with_label_values(&[blockchain.key()])
        .inc();
}

pub fn record_resubmission(blockchain: Blockchain) {
    RESUBMISSIONS.with_label_values(&[blockchain.key()]).inc();
}

pub fn record_submission_failed(blockchain: Blockchain) {
    SUBMISSIONS_FAILED
        .with_label_values(&[blockchain.key()])
        .inc();
}

pub fn record_dependent_job(blockchain: Blockchain, outcome: &str) {
    DEPENDENT_JOBS
        .with_label_values(&[blockchain.key(), outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_gauge_follows_health() {
        record_endpoint_health(Blockchain::Cronos, "https://cronos.example", false);
        assert_eq!(
            ENDPOINT_HEALTHY
                .with_label_values(&["cronos", "https://cronos.example"])
                .get(),
            0.0
        );

        record_endpoint_health(Blockchain::Cronos, "https://cronos.example", true);
        assert_eq!(
            ENDPOINT_HEALTHY
                .with_label_values(&["cronos", "https://cronos.example"])
                .get(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_metrics_are_exported() {
        record_dependent_job(Blockchain::Celo, "scheduled");

        let body = metrics_handler().await.unwrap();
        assert!(body.contains("relay_node_dependent_jobs_total"));
    }
}
