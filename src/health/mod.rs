//! RPC endpoint health monitoring
//!
//! Every node connection registers its endpoints here and routes each call
//! through [`NodeHealthMonitor::observe`]. Failed calls flip the endpoint to
//! unhealthy, successful calls flip it back. A periodic flush aggregates the
//! map into one [`NodesHealth`] record per chain and persists it.
//!
//! Endpoints are keyed by an obfuscated form of their URL: the path is
//! replaced by its SHA3-256 digest so that API keys embedded in provider
//! URLs never reach logs or the database.

use crate::chain::Blockchain;
use crate::error::StoreResult;
use crate::state::{NodesHealth, NodesHealthStore};

use dashmap::DashMap;
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Health state of one endpoint
#[derive(Debug)]
struct EndpointHealth {
    blockchain: Blockchain,
    healthy: AtomicBool,
}

/// Handle to a registered endpoint, carried by the connection that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    key: String,
}

impl EndpointHandle {
    /// Obfuscated endpoint identity, safe to log
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Process-wide map of endpoint health, shared by all node connections.
///
/// Lives for the whole process; entries are never removed.
#[derive(Debug, Default)]
pub struct NodeHealthMonitor {
    endpoints: DashMap<String, Arc<EndpointHealth>>,
}

impl NodeHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint URL.
    ///
    /// The URL is matched against the configured RPC nodes of every chain and
    /// the first chain listing it owns the entry. An already registered
    /// endpoint keeps its current state. URLs no chain lists are not tracked,
    /// calls through their handle are passed through untouched.
    pub fn register_endpoint(
        &self,
        endpoint_uri: &str,
        rpc_nodes: &BTreeMap<Blockchain, Vec<String>>,
    ) -> EndpointHandle {
        let key = obfuscate_endpoint(endpoint_uri);

        let owner = rpc_nodes
            .iter()
            .find(|(_, nodes)| nodes.iter().any(|node| node == endpoint_uri))
            .map(|(blockchain, _)| *blockchain);

        match owner {
            Some(blockchain) => {
                self.endpoints.entry(key.clone()).or_insert_with(|| {
                    debug!(endpoint = %key, %blockchain, "Registered RPC endpoint");
                    crate::metrics::record_endpoint_health(blockchain, &key, true);
                    Arc::new(EndpointHealth {
                        blockchain,
                        healthy: AtomicBool::new(true),
                    })
                });
            }
            None => {
                warn!(endpoint = %key, "Endpoint is not part of any configured RPC node list");
            }
        }

        EndpointHandle { key }
    }

    /// Run an RPC call against an endpoint and record the outcome.
    ///
    /// The call's result is returned unchanged.
    pub async fn observe<T, E, F>(&self, endpoint: &EndpointHandle, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let result = call.await;
        match &result {
            Ok(_) => self.set_health(endpoint, true),
            Err(e) => {
                warn!(endpoint = %endpoint.key, error = %e, "RPC call failed");
                self.set_health(endpoint, false);
            }
        }
        result
    }

    fn set_health(&self, endpoint: &EndpointHandle, healthy: bool) {
        // Clone the entry out so no shard lock is held while logging
        let entry = match self.endpoints.get(&endpoint.key) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        let was_healthy = entry.healthy.swap(healthy, Ordering::AcqRel);
        if was_healthy != healthy {
            info!(
                endpoint = %endpoint.key,
                blockchain = %entry.blockchain,
                healthy,
                "RPC endpoint health changed"
            );
            crate::metrics::record_endpoint_health(entry.blockchain, &endpoint.key, healthy);
        }
    }

    /// Current health of an endpoint, if it is tracked
    pub fn is_healthy(&self, endpoint: &EndpointHandle) -> Option<bool> {
        self.endpoints
            .get(&endpoint.key)
            .map(|entry| entry.healthy.load(Ordering::Acquire))
    }

    /// Aggregate the live map into one record per chain.
    ///
    /// Chains without any registered endpoint produce no record.
    pub fn snapshot(&self) -> BTreeMap<Blockchain, NodesHealth> {
        let mut records: BTreeMap<Blockchain, NodesHealth> = BTreeMap::new();

        for entry in self.endpoints.iter() {
            let health = entry.value();
            let record = records
                .entry(health.blockchain)
                .or_insert_with(|| NodesHealth::empty(health.blockchain));

            if health.healthy.load(Ordering::Acquire) {
                record.healthy_total += 1;
            } else {
                record.unhealthy_total += 1;
                record.unhealthy_endpoints.push(entry.key().clone());
            }
        }

        for record in records.values_mut() {
            record.unhealthy_endpoints.sort();
        }

        records
    }

    /// Persist the current snapshot, one upsert per chain
    pub async fn flush(&self, store: &dyn NodesHealthStore) -> StoreResult<Vec<NodesHealth>> {
        let records: Vec<NodesHealth> = self.snapshot().into_values().collect();

        for record in &records {
            store.upsert_nodes_health(record).await?;
        }

        crate::metrics::record_health_flush();
        debug!(chains = records.len(), "Flushed node health data");
        Ok(records)
    }
}

/// Replace the path of an endpoint URL by the hex digest of that path.
///
/// `https://p.example/v1/secretkey` becomes `https://p.example/<sha3-256 of
/// "/v1/secretkey">`. A query string is hashed together with the path and
/// credentials in the authority are dropped. URLs without a path keep only
/// scheme and host.
pub fn obfuscate_endpoint(endpoint_uri: &str) -> String {
    let url = match Url::parse(endpoint_uri) {
        Ok(url) => url,
        // Unparseable input is hashed whole; nothing of it may leak
        Err(_) => return hex::encode(Sha3_256::digest(endpoint_uri.as_bytes())),
    };

    let mut authority = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        authority.push_str(&format!(":{}", port));
    }

    let mut hidden = url.path().to_string();
    if let Some(query) = url.query() {
        hidden.push('?');
        hidden.push_str(query);
    }

    if hidden.is_empty() || hidden == "/" {
        format!("{}://{}", url.scheme(), authority)
    } else {
        let digest = Sha3_256::digest(hidden.as_bytes());
        format!("{}://{}/{}", url.scheme(), authority, hex::encode(digest))
    }
}
