//! In-memory health store

use super::{NodesHealth, NodesHealthStore};
use crate::chain::Blockchain;
use crate::error::StoreResult;

use async_trait::async_trait;
use dashmap::DashMap;

/// Health store kept in process memory. Used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryHealthStore {
    records: DashMap<Blockchain, NodesHealth>,
}

impl MemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodesHealthStore for MemoryHealthStore {
    async fn read_nodes_health(&self, blockchain: Blockchain) -> StoreResult<Option<NodesHealth>> {
        Ok(self.records.get(&blockchain).map(|r| r.value().clone()))
    }

    async fn upsert_nodes_health(&self, record: &NodesHealth) -> StoreResult<()> {
        self.records.insert(record.blockchain, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_record() {
        let store = MemoryHealthStore::new();
        assert!(store
            .read_nodes_health(Blockchain::Celo)
            .await
            .unwrap()
            .is_none());

        let mut record = NodesHealth::empty(Blockchain::Celo);
        record.healthy_total = 2;
        store.upsert_nodes_health(&record).await.unwrap();

        record.healthy_total = 1;
        record.unhealthy_total = 1;
        record.unhealthy_endpoints = vec!["https://celo.example".to_string()];
        store.upsert_nodes_health(&record).await.unwrap();

        let stored = store
            .read_nodes_health(Blockchain::Celo)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, record);
    }
}
