//! Transaction submission coordinator
//!
//! Resolves the target contract of a request from its role, attaches the
//! chain's fee policy and hands the request to the chain-utility layer.

use crate::chain::Blockchain;
use crate::config::ChainConfig;
use crate::error::{UtilitiesError, UtilitiesResult};
use crate::tx::{ChainUtilities, FeePolicy, TransactionSubmissionRequest};

use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Contracts a submission can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractRole {
    Hub,
    Token,
    Forwarder,
}

impl fmt::Display for ContractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractRole::Hub => "hub",
            ContractRole::Token => "token",
            ContractRole::Forwarder => "forwarder",
        };
        f.write_str(name)
    }
}

/// Contract address per role on one chain
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    addresses: HashMap<ContractRole, Address>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: ContractRole, address: Address) -> Self {
        self.addresses.insert(role, address);
        self
    }

    /// Registry of the configured hub, token and forwarder. Empty entries are
    /// left unregistered.
    pub fn from_config(chain: &ChainConfig) -> Result<Self, String> {
        let mut registry = Self::new();

        for (role, address) in [
            (ContractRole::Hub, &chain.hub),
            (ContractRole::Token, &chain.token),
            (ContractRole::Forwarder, &chain.forwarder),
        ] {
            if address.is_empty() {
                continue;
            }
            let address = address
                .parse::<Address>()
                .map_err(|e| format!("invalid {} address {}: {}", role, address, e))?;
            registry = registry.with(role, address);
        }

        Ok(registry)
    }

    pub fn resolve(&self, role: ContractRole) -> UtilitiesResult<Address> {
        self.addresses
            .get(&role)
            .copied()
            .ok_or(UtilitiesError::MissingContract(role))
    }
}

/// A submission as requested by a client, before role resolution
#[derive(Debug, Clone)]
pub struct SubmissionStartRequest {
    pub role: ContractRole,
    pub function_selector: [u8; 4],
    pub function_args: Vec<Token>,
    pub gas: Option<U256>,
    pub amount: Option<U256>,
    pub nonce: u64,
}

pub struct TransactionSubmissionCoordinator {
    blockchain: Blockchain,
    contracts: ContractRegistry,
    fee_policy: FeePolicy,
    utilities: Arc<dyn ChainUtilities>,
}

impl TransactionSubmissionCoordinator {
    pub fn new(
        blockchain: Blockchain,
        contracts: ContractRegistry,
        fee_policy: FeePolicy,
        utilities: Arc<dyn ChainUtilities>,
    ) -> Self {
        Self {
            blockchain,
            contracts,
            fee_policy,
            utilities,
        }
    }

    pub fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    pub fn utilities(&self) -> &Arc<dyn ChainUtilities> {
        &self.utilities
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    /// Resolve the contract and attach the fee policy
    pub fn build(&self, request: SubmissionStartRequest) -> UtilitiesResult<TransactionSubmissionRequest> {
        Ok(TransactionSubmissionRequest {
            contract_address: self.contracts.resolve(request.role)?,
            function_selector: request.function_selector,
            function_args: request.function_args,
            gas: request.gas,
            amount: request.amount,
            nonce: request.nonce,
            fee_policy: self.fee_policy.clone(),
        })
    }

    /// Start a submission. Returns once the first broadcast is accepted.
    pub async fn start(&self, request: SubmissionStartRequest) -> UtilitiesResult<Uuid> {
        let request = self.build(request)?;
        self.submit(request).await
    }

    /// Start an already resolved submission
    pub async fn submit(&self, request: TransactionSubmissionRequest) -> UtilitiesResult<Uuid> {
        let selector = hex::encode(request.function_selector);
        let nonce = request.nonce;

        let internal_transaction_id = self.utilities.start_transaction_submission(request).await?;

        info!(
            blockchain = %self.blockchain,
            %internal_transaction_id,
            function_selector = %selector,
            nonce,
            "Transaction submission started"
        );
        crate::metrics::record_submission_started(self.blockchain);

        Ok(internal_transaction_id)
    }
}
