//! Health-observed RPC connections with primary/fallback failover

use crate::chain::Blockchain;
use crate::error::{UtilitiesError, UtilitiesResult};
use crate::health::{EndpointHandle, NodeHealthMonitor};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use ethers::utils::keccak256;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fee market data of the latest block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeData {
    /// Present on chains with an EIP-1559 fee market
    pub base_fee_per_gas: Option<U256>,
    pub gas_price: U256,
}

/// The RPC surface the node needs from an EVM chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvmNode: Send + Sync {
    async fn block_number(&self) -> UtilitiesResult<u64>;

    /// Number of transactions sent from `address` as of the latest block
    async fn transaction_count(&self, address: Address) -> UtilitiesResult<u64>;

    async fn balance(&self, address: Address) -> UtilitiesResult<U256>;

    /// Read-only contract call against the latest block
    async fn call(&self, from: Address, to: Address, data: Bytes) -> UtilitiesResult<Bytes>;

    async fn code(&self, address: Address) -> UtilitiesResult<Bytes>;

    async fn fee_data(&self) -> UtilitiesResult<FeeData>;

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: Option<U256>,
    ) -> UtilitiesResult<U256>;

    async fn send_raw_transaction(&self, raw: Bytes) -> UtilitiesResult<H256>;

    async fn transaction_receipt(&self, hash: H256) -> UtilitiesResult<Option<TransactionReceipt>>;
}

struct MonitoredProvider {
    provider: Provider<Http>,
    endpoint: EndpointHandle,
}

/// Primary and ordered fallback providers of one chain.
///
/// Every call goes through the health monitor. Transport failures and
/// timeouts move on to the next provider; any other error is returned as is.
pub struct NodeConnections {
    blockchain: Blockchain,
    nodes: Vec<MonitoredProvider>,
    timeout: Duration,
    health: Arc<NodeHealthMonitor>,
}

impl NodeConnections {
    pub fn new(
        blockchain: Blockchain,
        urls: &[String],
        timeout: Duration,
        rpc_nodes: &BTreeMap<Blockchain, Vec<String>>,
        health: Arc<NodeHealthMonitor>,
    ) -> UtilitiesResult<Self> {
        let mut nodes = Vec::with_capacity(urls.len());

        for url in urls {
            let endpoint = health.register_endpoint(url, rpc_nodes);
            let provider = Provider::<Http>::try_from(url.as_str()).map_err(|e| {
                UtilitiesError::InvalidEndpoint {
                    url: endpoint.key().to_string(),
                    message: e.to_string(),
                }
            })?;
            debug!(%blockchain, endpoint = %endpoint.key(), "Added HTTP provider");
            nodes.push(MonitoredProvider { provider, endpoint });
        }

        if nodes.is_empty() {
            return Err(UtilitiesError::InvalidEndpoint {
                url: String::new(),
                message: format!("no RPC providers configured for {}", blockchain),
            });
        }

        Ok(Self {
            blockchain,
            nodes,
            timeout,
            health,
        })
    }

    /// Run `request` against the providers in order until one answers
    async fn request<T, F, Fut>(&self, operation: &str, request: F) -> UtilitiesResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for node in &self.nodes {
            let key = node.endpoint.key();
            let attempt = async {
                match tokio::time::timeout(self.timeout, request(node.provider.clone())).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(classify_rpc_error(key, &e.to_string())),
                    Err(_) => Err(UtilitiesError::Timeout {
                        operation: format!("{} on {}", operation, key),
                    }),
                }
            };

            match self.health.observe(&node.endpoint, attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transport() => {
                    warn!(
                        blockchain = %self.blockchain,
                        endpoint = %key,
                        operation,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| UtilitiesError::Rpc {
            endpoint: String::new(),
            message: format!("no provider answered {}", operation),
        }))
    }
}

#[async_trait]
impl EvmNode for NodeConnections {
    async fn block_number(&self) -> UtilitiesResult<u64> {
        self.request("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
            .map(|n| n.as_u64())
    }

    async fn transaction_count(&self, address: Address) -> UtilitiesResult<u64> {
        self.request("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address, Some(BlockNumber::Latest.into()))
                .await
        })
        .await
        .map(|n| n.as_u64())
    }

    async fn balance(&self, address: Address) -> UtilitiesResult<U256> {
        self.request("eth_getBalance", |p| async move {
            p.get_balance(address, None).await
        })
        .await
    }

    async fn call(&self, from: Address, to: Address, data: Bytes) -> UtilitiesResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().from(from).to(to).data(data).into();
        self.request("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(&tx, None).await }
        })
        .await
    }

    async fn code(&self, address: Address) -> UtilitiesResult<Bytes> {
        self.request("eth_getCode", |p| async move { p.get_code(address, None).await })
            .await
    }

    async fn fee_data(&self) -> UtilitiesResult<FeeData> {
        self.request("fee_data", |p| async move {
            let block = p.get_block(BlockNumber::Latest).await?;
            let gas_price = p.get_gas_price().await?;
            Ok(FeeData {
                base_fee_per_gas: block.and_then(|b| b.base_fee_per_gas),
                gas_price,
            })
        })
        .await
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: Option<U256>,
    ) -> UtilitiesResult<U256> {
        let mut request = TransactionRequest::new().from(from).to(to).data(data);
        if let Some(value) = value {
            request = request.value(value);
        }
        let tx: TypedTransaction = request.into();

        self.request("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(&tx, None).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> UtilitiesResult<H256> {
        let hash = H256::from(keccak256(&raw));

        self.request("eth_sendRawTransaction", |p| {
            let raw = raw.clone();
            async move {
                match p.send_raw_transaction(raw).await {
                    Ok(pending) => Ok(pending.tx_hash()),
                    // A fallback may see a transaction the primary already relayed
                    Err(e) if is_already_known(&e.to_string()) => Ok(hash),
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    async fn transaction_receipt(&self, hash: H256) -> UtilitiesResult<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }
}

fn is_already_known(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("already known") || message.contains("known transaction")
}

/// Map a node's error message to the utilities error taxonomy
pub fn classify_rpc_error(endpoint: &str, message: &str) -> UtilitiesError {
    let lower = message.to_lowercase();

    if lower.contains("execution reverted") || lower.contains("revert") {
        UtilitiesError::ContractLogic(message.to_string())
    } else if lower.contains("nonce too low") {
        UtilitiesError::NonceTooLow(message.to_string())
    } else if lower.contains("underpriced") || lower.contains("less than block base fee") {
        UtilitiesError::Underpriced(message.to_string())
    } else if lower.contains("insufficient funds") {
        UtilitiesError::InsufficientFunds(message.to_string())
    } else {
        UtilitiesError::Rpc {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }
}
