//! Chain module - blockchain identities and per-chain clients
//!
//! This module provides:
//! - The `Blockchain` identity enum and its family tag
//! - Health-observed RPC connections with primary/fallback failover
//! - The `BlockchainClient` capability trait and its EVM implementation
//! - A registry dispatching chain identities to their clients

pub mod client;
pub mod contracts;
pub mod evm;
pub mod provider;

pub use client::{
    BlockchainClient, ExternalTokenRecordRequest, ExternalTokenRecordResponse,
    TransferFromSubmissionStartRequest, TransferSubmissionStartRequest,
    TransferSubmissionStatusResponse,
};
pub use evm::EvmClient;
pub use provider::{EvmNode, FeeData, NodeConnections};

use crate::config::Settings;
use crate::error::{ClientError, ClientResult};
use crate::health::NodeHealthMonitor;
use crate::jobs::JobExecutor;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Supported blockchain networks. Numeric ids are stable and shared with the
/// on-chain contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Blockchain {
    Ethereum,
    BnbChain,
    Avalanche,
    Solana,
    Polygon,
    Cronos,
    Celo,
}

/// Client family a chain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Other,
}

impl Blockchain {
    pub const ALL: [Blockchain; 7] = [
        Blockchain::Ethereum,
        Blockchain::BnbChain,
        Blockchain::Avalanche,
        Blockchain::Solana,
        Blockchain::Polygon,
        Blockchain::Cronos,
        Blockchain::Celo,
    ];

    pub fn id(&self) -> u32 {
        match self {
            Blockchain::Ethereum => 0,
            Blockchain::BnbChain => 1,
            Blockchain::Avalanche => 3,
            Blockchain::Solana => 4,
            Blockchain::Polygon => 5,
            Blockchain::Cronos => 6,
            Blockchain::Celo => 8,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.id() == id)
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Blockchain::Solana => ChainFamily::Other,
            _ => ChainFamily::Evm,
        }
    }

    /// Configuration key of the chain
    pub fn key(&self) -> &'static str {
        match self {
            Blockchain::Ethereum => "ethereum",
            Blockchain::BnbChain => "bnb_chain",
            Blockchain::Avalanche => "avalanche",
            Blockchain::Solana => "solana",
            Blockchain::Polygon => "polygon",
            Blockchain::Cronos => "cronos",
            Blockchain::Celo => "celo",
        }
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Blockchain::Ethereum => "Ethereum",
            Blockchain::BnbChain => "BNB Chain",
            Blockchain::Avalanche => "Avalanche",
            Blockchain::Solana => "Solana",
            Blockchain::Polygon => "Polygon",
            Blockchain::Cronos => "Cronos",
            Blockchain::Celo => "Celo",
        };
        f.write_str(name)
    }
}

impl FromStr for Blockchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.key() == s)
            .ok_or_else(|| format!("unknown blockchain: {}", s))
    }
}

impl TryFrom<String> for Blockchain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One client per active chain, selected by chain family
pub struct ClientRegistry {
    clients: DashMap<Blockchain, Arc<dyn BlockchainClient>>,
}

impl ClientRegistry {
    /// Build the clients of all active chains.
    ///
    /// Any failing client aborts startup.
    pub fn new(
        settings: &Settings,
        health: Arc<NodeHealthMonitor>,
        executor: Arc<dyn JobExecutor>,
    ) -> ClientResult<Self> {
        let protocol_version = settings.node.protocol.as_str();
        let rpc_nodes = settings.rpc_nodes();
        let clients = DashMap::new();

        for (blockchain, chain_config) in settings.active_chains() {
            let client: Arc<dyn BlockchainClient> = match blockchain.family() {
                ChainFamily::Evm => Arc::new(EvmClient::new(
                    blockchain,
                    protocol_version,
                    chain_config,
                    &rpc_nodes,
                    health.clone(),
                    executor.clone(),
                )?),
                ChainFamily::Other => {
                    return Err(ClientError::config(
                        blockchain,
                        "no client implementation for this chain family",
                    ))
                }
            };

            info!(%blockchain, address = %client.own_address(), "Blockchain client initialized");
            clients.insert(blockchain, client);
        }

        Ok(Self { clients })
    }

    pub fn get(&self, blockchain: Blockchain) -> Option<Arc<dyn BlockchainClient>> {
        self.clients.get(&blockchain).map(|c| c.value().clone())
    }

    /// Chains with a client, in chain order
    pub fn blockchains(&self) -> Vec<Blockchain> {
        let mut chains: Vec<Blockchain> = self.clients.iter().map(|e| *e.key()).collect();
        chains.sort();
        chains
    }
}
