//! Durable node health records
//!
//! Handles:
//! - Per-chain `NodesHealth` snapshots written by the health flush
//! - PostgreSQL persistence through sqlx
//! - An in-memory store for nodes running without a database

mod manager;
mod memory;

pub use manager::StateManager;
pub use memory::MemoryHealthStore;

use crate::chain::Blockchain;
use crate::error::StoreResult;

use async_trait::async_trait;
use serde::Serialize;

/// Health summary of one chain's RPC endpoints at flush time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodesHealth {
    pub blockchain: Blockchain,
    pub unhealthy_total: u32,
    /// Obfuscated endpoint identities, sorted
    pub unhealthy_endpoints: Vec<String>,
    pub healthy_total: u32,
}

impl NodesHealth {
    pub fn empty(blockchain: Blockchain) -> Self {
        Self {
            blockchain,
            unhealthy_total: 0,
            unhealthy_endpoints: Vec::new(),
            healthy_total: 0,
        }
    }
}

/// Read-one / upsert-one access to the per-chain health records
#[async_trait]
pub trait NodesHealthStore: Send + Sync {
    async fn read_nodes_health(&self, blockchain: Blockchain) -> StoreResult<Option<NodesHealth>>;

    async fn upsert_nodes_health(&self, record: &NodesHealth) -> StoreResult<()>;
}
