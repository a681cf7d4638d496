//! EVM blockchain client
//!
//! One implementation serves every EVM chain; the chain identity only
//! selects configuration and tags errors and logs.

use super::client::{
    BlockchainClient, ExternalTokenRecordRequest, ExternalTokenRecordResponse,
    TransferFromSubmissionStartRequest, TransferSubmissionStartRequest,
    TransferSubmissionStatusResponse,
};
use super::contracts::{self, INSUFFICIENT_BALANCE_ERROR, INVALID_SIGNATURE_ERROR};
use super::provider::{EvmNode, NodeConnections};
use super::Blockchain;
use crate::config::ChainConfig;
use crate::coordination::{
    ContractRegistry, ContractRole, DependentTransactionRequest, DependentTransactionScheduler,
    OnChainTransferIdReader, SubmissionStartRequest, TransactionSubmissionCoordinator,
    TransferSubmissionStatusTracker,
};
use crate::error::{ClientError, ClientResult, UtilitiesError};
use crate::health::NodeHealthMonitor;
use crate::jobs::JobExecutor;
use crate::tx::{NonceManager, SubmissionEngine};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::to_checksum;
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct EvmClient {
    blockchain: Blockchain,
    protocol_version: Version,
    address: Address,
    node: Arc<dyn EvmNode>,
    nonces: Arc<NonceManager>,
    coordinator: Arc<TransactionSubmissionCoordinator>,
    scheduler: DependentTransactionScheduler,
    tracker: TransferSubmissionStatusTracker,
}

impl EvmClient {
    /// Build the client of an EVM chain from its configuration
    pub fn new(
        blockchain: Blockchain,
        protocol_version: &str,
        config: &ChainConfig,
        rpc_nodes: &BTreeMap<Blockchain, Vec<String>>,
        health: Arc<NodeHealthMonitor>,
        executor: Arc<dyn JobExecutor>,
    ) -> ClientResult<Self> {
        let protocol_version = crate::protocol::parse_protocol_version(protocol_version)
            .map_err(|e| ClientError::config(blockchain, e.to_string()))?;
        if !crate::protocol::is_supported_protocol_version(&protocol_version) {
            return Err(ClientError::config(
                blockchain,
                format!("unsupported protocol version {}", protocol_version),
            ));
        }

        let node = NodeConnections::new(
            blockchain,
            &config.rpc_nodes(),
            config.provider_timeout(),
            rpc_nodes,
            health,
        )
        .map_err(|e| ClientError::config(blockchain, format!("unable to connect: {}", e)))?;

        let wallet = load_wallet(blockchain, config)?;

        Self::from_parts(blockchain, protocol_version, config, Arc::new(node), wallet, executor)
    }

    /// Assemble a client around an already connected node and signing key
    pub fn from_parts(
        blockchain: Blockchain,
        protocol_version: Version,
        config: &ChainConfig,
        node: Arc<dyn EvmNode>,
        wallet: LocalWallet,
        executor: Arc<dyn JobExecutor>,
    ) -> ClientResult<Self> {
        let contracts = ContractRegistry::from_config(config)
            .map_err(|message| ClientError::config(blockchain, message))?;
        let hub = contracts
            .resolve(ContractRole::Hub)
            .map_err(|e| ClientError::config(blockchain, e.to_string()))?;
        let address = wallet.address();

        let engine = Arc::new(SubmissionEngine::new(
            blockchain,
            node.clone(),
            wallet,
            config.average_block_time(),
            config.confirmations,
            executor.clone(),
        ));
        let coordinator = Arc::new(TransactionSubmissionCoordinator::new(
            blockchain,
            contracts,
            config.fee_policy(),
            engine.clone(),
        ));
        let nonces = Arc::new(NonceManager::new());
        let scheduler = DependentTransactionScheduler::new(
            coordinator.clone(),
            executor,
            config.average_block_time(),
            nonces.clone(),
        );
        let reader = Arc::new(HubTransferIdReader {
            blockchain,
            node: node.clone(),
            hub,
        });
        let tracker = TransferSubmissionStatusTracker::new(blockchain, engine, reader);

        Ok(Self {
            blockchain,
            protocol_version,
            address,
            node,
            nonces,
            coordinator,
            scheduler,
            tracker,
        })
    }

    fn error(&self, context: &str, error: UtilitiesError) -> ClientError {
        ClientError::from_utilities(self.blockchain, context, error)
    }

    fn contract(&self, role: ContractRole) -> ClientResult<Address> {
        self.coordinator
            .contracts()
            .resolve(role)
            .map_err(|e| ClientError::config(self.blockchain, e.to_string()))
    }

    async fn call_view(
        &self,
        role: ContractRole,
        signature: &str,
        args: &[Token],
        context: &str,
    ) -> ClientResult<Bytes> {
        let to = self.contract(role)?;
        self.node
            .call(self.address, to, contracts::encode_view(signature, args))
            .await
            .map_err(|e| self.error(context, e))
    }

    async fn service_node_record(&self, context: &str) -> ClientResult<contracts::ServiceNodeRecord> {
        let data = self
            .call_view(
                ContractRole::Hub,
                contracts::GET_SERVICE_NODE_RECORD,
                &[Token::Address(self.address)],
                context,
            )
            .await?;
        contracts::decode_service_node_record(&data).map_err(|e| self.error(context, e))
    }

    async fn transaction_count(&self, context: &str) -> ClientResult<u64> {
        self.node
            .transaction_count(self.address)
            .await
            .map_err(|e| self.error(context, e))
    }

    /// Start a hub operation, as a commit-then-act pair when the protocol
    /// version requires a commitment
    async fn start_hub_operation(
        &self,
        selector: [u8; 4],
        gas: u64,
        args: Vec<Token>,
        commitment_values: &[Token],
        nonce: u64,
    ) -> Result<Uuid, UtilitiesError> {
        let operation = SubmissionStartRequest {
            role: ContractRole::Hub,
            function_selector: selector,
            function_args: args,
            gas: Some(gas.into()),
            amount: None,
            nonce,
        };

        if !crate::protocol::requires_commitment(&self.protocol_version) {
            return self.coordinator.start(operation).await;
        }

        let blocks_to_wait = self.commitment_wait_period().await?;
        let commit_hash = contracts::commitment(commitment_values)?;
        let commit = SubmissionStartRequest {
            role: ContractRole::Hub,
            function_selector: contracts::HUB_COMMIT_HASH_SELECTOR,
            function_args: vec![Token::FixedBytes(commit_hash.as_bytes().to_vec())],
            gas: Some(contracts::HUB_COMMIT_HASH_GAS.into()),
            amount: None,
            nonce,
        };

        self.scheduler
            .start(DependentTransactionRequest {
                prerequisite: commit,
                dependent: SubmissionStartRequest {
                    nonce: nonce + 1,
                    ..operation
                },
                blocks_to_wait,
            })
            .await
    }

    async fn commitment_wait_period(&self) -> Result<u64, UtilitiesError> {
        let hub = self.coordinator.contracts().resolve(ContractRole::Hub)?;
        let data = self
            .node
            .call(
                self.address,
                hub,
                contracts::encode_view(contracts::GET_COMMITMENT_WAIT_PERIOD, &[]),
            )
            .await?;
        let blocks = contracts::decode_uint(&data)?;
        if blocks.bits() > 64 {
            return Err(UtilitiesError::Abi(format!(
                "commitment wait period {} out of range",
                blocks
            )));
        }
        Ok(blocks.low_u64())
    }

    /// Submissions a hub operation takes under the current protocol version
    fn hub_operation_submissions(&self) -> u64 {
        if crate::protocol::requires_commitment(&self.protocol_version) {
            2
        } else {
            1
        }
    }

    async fn start_single_hub_call(&self, selector: [u8; 4], gas: u64, context: &str) -> ClientResult<Uuid> {
        let transaction_count = self.transaction_count(context).await?;
        let nonce = self.nonces.next_nonce(transaction_count).await;

        let request = SubmissionStartRequest {
            role: ContractRole::Hub,
            function_selector: selector,
            function_args: vec![Token::Address(self.address)],
            gas: Some(gas.into()),
            amount: None,
            nonce,
        };

        match self.coordinator.start(request).await {
            Ok(id) => Ok(id),
            Err(e) => {
                self.nonces.release(nonce..nonce + 1).await;
                Err(self.error(context, e))
            }
        }
    }

    async fn start_transfer(
        &self,
        internal_transfer_id: u64,
        on_chain_request: Token,
        signature: &Bytes,
        verify_signature: &str,
        selector: [u8; 4],
        gas: u64,
        context: &str,
    ) -> ClientResult<Uuid> {
        let chain = self.blockchain;
        let args = vec![on_chain_request, Token::Bytes(signature.to_vec())];

        // Dry run of the hub's own checks
        let hub = self.contract(ContractRole::Hub)?;
        if let Err(e) = self
            .node
            .call(self.address, hub, contracts::encode_view(verify_signature, &args))
            .await
        {
            return Err(match e {
                UtilitiesError::ContractLogic(reason) if reason.contains(INSUFFICIENT_BALANCE_ERROR) => {
                    ClientError::InsufficientBalance { chain }
                }
                UtilitiesError::ContractLogic(reason) if reason.contains(INVALID_SIGNATURE_ERROR) => {
                    ClientError::InvalidSignature { chain }
                }
                other => self.error(context, other),
            });
        }

        let transaction_count = self.transaction_count(context).await?;
        let nonce = self
            .nonces
            .nonce_for_transfer(internal_transfer_id, transaction_count)
            .await;

        let request = SubmissionStartRequest {
            role: ContractRole::Hub,
            function_selector: selector,
            function_args: args,
            gas: Some(gas.into()),
            amount: None,
            nonce,
        };

        match self.coordinator.start(request).await {
            Ok(internal_transaction_id) => {
                info!(
                    blockchain = %chain,
                    internal_transfer_id,
                    %internal_transaction_id,
                    nonce,
                    "Transfer submission started"
                );
                Ok(internal_transaction_id)
            }
            Err(e) => {
                if matches!(
                    e,
                    UtilitiesError::NonceTooLow(_) | UtilitiesError::Underpriced(_)
                ) {
                    warn!(blockchain = %chain, internal_transfer_id, nonce, error = %e, "Resetting transfer nonce");
                    self.nonces.reset_transfer(internal_transfer_id).await;
                }
                Err(self.error(context, e))
            }
        }
    }

    /// Log a failed transfer operation at the level its error class calls for
    fn report_failure(&self, operation: &str, failure: &ClientError) {
        if failure.should_alert() {
            error!(blockchain = %self.blockchain, operation, error = %failure, "Transfer operation needs attention");
        } else if failure.is_user_rejection() {
            info!(blockchain = %self.blockchain, operation, error = %failure, "Transfer rejected");
        } else {
            warn!(blockchain = %self.blockchain, operation, error = %failure, "Transfer operation failed");
        }
    }

    async fn contract_supports_protocol_version(&self, role: ContractRole) -> ClientResult<bool> {
        let address = self.contract(role)?;
        let code = self
            .node
            .code(address)
            .await
            .map_err(|e| self.error("unable to read the contract bytecode", e))?;

        Ok(contracts::bytecode_supports(
            &code,
            &contracts::required_selectors(role, &self.protocol_version),
        ))
    }
}

#[async_trait]
impl BlockchainClient for EvmClient {
    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    fn protocol_version(&self) -> &Version {
        &self.protocol_version
    }

    fn own_address(&self) -> String {
        to_checksum(&self.address, None)
    }

    async fn is_node_registered(&self) -> ClientResult<bool> {
        let record = self
            .service_node_record("unable to determine if the service node is registered")
            .await?;
        Ok(record.active)
    }

    async fn register_node(
        &self,
        node_url: &str,
        node_deposit: U256,
        withdrawal_address: Address,
    ) -> ClientResult<()> {
        const CONTEXT: &str = "unable to register the service node";
        let hub = self.contract(ContractRole::Hub)?;

        let submissions = self.hub_operation_submissions() + u64::from(!node_deposit.is_zero());
        let transaction_count = self.transaction_count(CONTEXT).await?;
        let first_nonce = self.nonces.reserve(transaction_count, submissions).await;
        let mut nonce = first_nonce;

        let result: Result<Uuid, UtilitiesError> = async {
            if !node_deposit.is_zero() {
                let allowance_id = self
                    .coordinator
                    .start(SubmissionStartRequest {
                        role: ContractRole::Token,
                        function_selector: contracts::TOKEN_APPROVE_SELECTOR,
                        function_args: vec![Token::Address(hub), Token::Uint(node_deposit)],
                        gas: Some(contracts::TOKEN_APPROVE_GAS.into()),
                        amount: None,
                        nonce,
                    })
                    .await?;
                info!(
                    blockchain = %self.blockchain,
                    internal_transaction_id = %allowance_id,
                    %node_deposit,
                    "Node deposit allowance submitted"
                );
                nonce += 1;
            }

            self.start_hub_operation(
                contracts::HUB_REGISTER_SERVICE_NODE_SELECTOR,
                contracts::HUB_REGISTER_SERVICE_NODE_GAS,
                vec![
                    Token::Address(self.address),
                    Token::String(node_url.to_string()),
                    Token::Uint(node_deposit),
                    Token::Address(withdrawal_address),
                ],
                &[
                    Token::Address(self.address),
                    Token::Address(withdrawal_address),
                    Token::String(node_url.to_string()),
                    Token::Address(self.address),
                ],
                nonce,
            )
            .await
        }
        .await;

        match result {
            Ok(internal_transaction_id) => {
                info!(
                    blockchain = %self.blockchain,
                    %internal_transaction_id,
                    node_url,
                    %node_deposit,
                    withdrawal_address = %to_checksum(&withdrawal_address, None),
                    "Node registration submitted"
                );
                Ok(())
            }
            Err(e) => {
                // Nonces from the failed submission on were never broadcast
                self.nonces.release(nonce..first_nonce + submissions).await;
                Err(self.error(CONTEXT, e))
            }
        }
    }

    async fn unregister_node(&self) -> ClientResult<()> {
        let internal_transaction_id = self
            .start_single_hub_call(
                contracts::HUB_UNREGISTER_SERVICE_NODE_SELECTOR,
                contracts::HUB_UNREGISTER_SERVICE_NODE_GAS,
                "unable to unregister the service node",
            )
            .await?;
        info!(blockchain = %self.blockchain, %internal_transaction_id, "Node unregistration submitted");
        Ok(())
    }

    async fn cancel_unregistration(&self) -> ClientResult<()> {
        let internal_transaction_id = self
            .start_single_hub_call(
                contracts::HUB_CANCEL_SERVICE_NODE_UNREGISTRATION_SELECTOR,
                contracts::HUB_CANCEL_SERVICE_NODE_UNREGISTRATION_GAS,
                "unable to cancel the service node unregistration",
            )
            .await?;
        info!(blockchain = %self.blockchain, %internal_transaction_id, "Node unregistration cancellation submitted");
        Ok(())
    }

    async fn is_unbonding(&self) -> ClientResult<bool> {
        const CONTEXT: &str = "unable to determine if the service node is unbonding";
        let data = self
            .call_view(
                ContractRole::Hub,
                contracts::IS_SERVICE_NODE_IN_THE_UNBONDING_PERIOD,
                &[Token::Address(self.address)],
                CONTEXT,
            )
            .await?;
        contracts::decode_bool(&data).map_err(|e| self.error(CONTEXT, e))
    }

    async fn update_node_url(&self, node_url: &str) -> ClientResult<()> {
        const CONTEXT: &str = "unable to update the service node URL";

        let transaction_count = self.transaction_count(CONTEXT).await?;
        let submissions = self.hub_operation_submissions();
        let nonce = self.nonces.reserve(transaction_count, submissions).await;

        let result = self
            .start_hub_operation(
                contracts::HUB_UPDATE_SERVICE_NODE_URL_SELECTOR,
                contracts::HUB_UPDATE_SERVICE_NODE_URL_GAS,
                vec![Token::String(node_url.to_string())],
                &[
                    Token::String(node_url.to_string()),
                    Token::Address(self.address),
                ],
                nonce,
            )
            .await;

        match result {
            Ok(internal_transaction_id) => {
                info!(blockchain = %self.blockchain, %internal_transaction_id, node_url, "Node URL update submitted");
                Ok(())
            }
            Err(e) => {
                self.nonces.release(nonce..nonce + submissions).await;
                Err(self.error(CONTEXT, e))
            }
        }
    }

    async fn read_node_url(&self) -> ClientResult<String> {
        let record = self
            .service_node_record("unable to read the service node URL")
            .await?;
        Ok(record.url)
    }

    async fn read_minimum_deposit(&self) -> ClientResult<U256> {
        const CONTEXT: &str = "unable to read the minimum deposit";
        let data = self
            .call_view(
                ContractRole::Hub,
                contracts::GET_CURRENT_MINIMUM_SERVICE_NODE_DEPOSIT,
                &[],
                CONTEXT,
            )
            .await?;
        contracts::decode_uint(&data).map_err(|e| self.error(CONTEXT, e))
    }

    async fn read_external_token_record(
        &self,
        request: &ExternalTokenRecordRequest,
    ) -> ClientResult<ExternalTokenRecordResponse> {
        const CONTEXT: &str = "unable to read an external token record";
        let data = self
            .call_view(
                ContractRole::Hub,
                contracts::GET_EXTERNAL_TOKEN_RECORD,
                &[
                    Token::Address(request.token_address),
                    Token::Uint(request.external_blockchain.id().into()),
                ],
                CONTEXT,
            )
            .await?;
        let (is_registration_active, external_token_address) =
            contracts::decode_external_token_record(&data).map_err(|e| self.error(CONTEXT, e))?;

        Ok(ExternalTokenRecordResponse {
            is_registration_active,
            external_token_address,
        })
    }

    async fn read_own_token_balance(&self) -> ClientResult<U256> {
        const CONTEXT: &str = "unable to read the own token balance";
        let data = self
            .call_view(
                ContractRole::Token,
                contracts::TOKEN_BALANCE_OF,
                &[Token::Address(self.address)],
                CONTEXT,
            )
            .await?;
        contracts::decode_uint(&data).map_err(|e| self.error(CONTEXT, e))
    }

    async fn read_own_native_balance(&self) -> ClientResult<U256> {
        self.node
            .balance(self.address)
            .await
            .map_err(|e| self.error("unable to read the own native coin balance", e))
    }

    fn calculate_commitment(&self, values: &[Token]) -> ClientResult<H256> {
        contracts::commitment(values).map_err(|e| self.error("unable to calculate the commitment", e))
    }

    async fn get_commitment_wait_period(&self, _blockchain: Blockchain) -> ClientResult<u64> {
        self.commitment_wait_period()
            .await
            .map_err(|e| self.error("unable to get the commitment wait period", e))
    }

    async fn get_validator_fee_factor(&self, blockchain: Blockchain) -> ClientResult<U256> {
        const CONTEXT: &str = "unable to get the validator fee factor";
        let data = self
            .call_view(
                ContractRole::Hub,
                contracts::GET_CURRENT_VALIDATOR_FEE_FACTOR,
                &[Token::Uint(blockchain.id().into())],
                CONTEXT,
            )
            .await?;
        contracts::decode_uint(&data).map_err(|e| self.error(CONTEXT, e))
    }

    async fn start_transfer_submission(
        &self,
        request: &TransferSubmissionStartRequest,
    ) -> ClientResult<Uuid> {
        let on_chain_request = Token::Tuple(vec![
            Token::Address(request.sender_address),
            Token::Address(request.recipient_address),
            Token::Address(request.token_address),
            Token::Uint(request.amount),
            Token::Address(self.address),
            Token::Uint(request.fee),
            Token::Uint(request.sender_nonce),
            Token::Uint(request.valid_until),
        ]);

        let result = self
            .start_transfer(
                request.internal_transfer_id,
                on_chain_request,
                &request.signature,
                &contracts::verify_transfer_signature(),
                contracts::HUB_TRANSFER_SELECTOR,
                contracts::HUB_TRANSFER_GAS,
                "unable to start a transfer submission",
            )
            .await;
        if let Err(e) = &result {
            self.report_failure("transfer", e);
        }
        result
    }

    async fn start_transfer_from_submission(
        &self,
        request: &TransferFromSubmissionStartRequest,
    ) -> ClientResult<Uuid> {
        let on_chain_request = Token::Tuple(vec![
            Token::Uint(request.destination_blockchain.id().into()),
            Token::Address(request.sender_address),
            Token::String(request.recipient_address.clone()),
            Token::Address(request.source_token_address),
            Token::String(request.destination_token_address.clone()),
            Token::Uint(request.amount),
            Token::Address(self.address),
            Token::Uint(request.fee),
            Token::Uint(request.sender_nonce),
            Token::Uint(request.valid_until),
        ]);

        let result = self
            .start_transfer(
                request.internal_transfer_id,
                on_chain_request,
                &request.signature,
                &contracts::verify_transfer_from_signature(),
                contracts::HUB_TRANSFER_FROM_SELECTOR,
                contracts::HUB_TRANSFER_FROM_GAS,
                "unable to start a transferFrom submission",
            )
            .await;
        if let Err(e) = &result {
            self.report_failure("transferFrom", e);
        }
        result
    }

    async fn get_transfer_submission_status(
        &self,
        internal_transaction_id: Uuid,
        destination_blockchain: Blockchain,
    ) -> ClientResult<TransferSubmissionStatusResponse> {
        let result = self
            .tracker
            .resolve(internal_transaction_id, destination_blockchain)
            .await;
        if let Err(e) = &result {
            self.report_failure("transfer status", e);
        }
        result
    }

    async fn is_protocol_version_supported_by_forwarder_contract(&self) -> ClientResult<bool> {
        self.contract_supports_protocol_version(ContractRole::Forwarder)
            .await
    }

    async fn is_protocol_version_supported_by_hub_contract(&self) -> ClientResult<bool> {
        self.contract_supports_protocol_version(ContractRole::Hub).await
    }

    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_evm_address(address)
    }

    fn is_valid_recipient_address(&self, recipient_address: &str) -> bool {
        is_valid_evm_address(recipient_address)
            && recipient_address
                .parse::<Address>()
                .map(|address| !address.is_zero())
                .unwrap_or(false)
    }
}

/// Reads the transfer id from the hub event of a confirmed transaction
struct HubTransferIdReader {
    blockchain: Blockchain,
    node: Arc<dyn EvmNode>,
    hub: Address,
}

#[async_trait]
impl OnChainTransferIdReader for HubTransferIdReader {
    async fn read_on_chain_transfer_id(
        &self,
        transaction_id: &str,
        destination_blockchain: Blockchain,
    ) -> ClientResult<U256> {
        let chain = self.blockchain;
        let context = "unable to read the transfer id on the source blockchain";

        let tx_hash = transaction_id
            .parse::<H256>()
            .map_err(|e| ClientError::client(chain, format!("{}: {}", context, e)))?;
        let receipt = self
            .node
            .transaction_receipt(tx_hash)
            .await
            .map_err(|e| ClientError::from_utilities(chain, context, e))?
            .ok_or_else(|| {
                ClientError::client(chain, format!("{}: no receipt for {}", context, transaction_id))
            })?;

        info!(
            blockchain = %chain,
            transaction_id,
            block_number = ?receipt.block_number,
            logs = receipt.logs.len(),
            "Transfer transaction receipt"
        );

        // The hub emits TransferSucceeded for same-chain transfers
        let event = if chain == destination_blockchain {
            contracts::transfer_succeeded_event()
        } else {
            contracts::transfer_from_succeeded_event()
        };

        contracts::read_event_transfer_id(&receipt, self.hub, &event).ok_or_else(|| {
            ClientError::client(
                chain,
                format!("{}: no transfer event in {}", context, transaction_id),
            )
        })
    }
}

/// `0x`-prefixed 20-byte hex. Mixed-case input must carry a valid checksum.
fn is_valid_evm_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    if digits == digits.to_lowercase() || digits == digits.to_uppercase() {
        return true;
    }

    address
        .parse::<Address>()
        .map(|parsed| to_checksum(&parsed, None) == address)
        .unwrap_or(false)
}

fn load_wallet(blockchain: Blockchain, config: &ChainConfig) -> ClientResult<LocalWallet> {
    let key_path = Path::new(&config.private_key);

    let wallet = if key_path.is_file() {
        LocalWallet::decrypt_keystore(key_path, &config.private_key_password).map_err(|e| {
            ClientError::config(blockchain, format!("unable to decrypt the private key: {}", e))
        })?
    } else {
        let key = config.private_key.trim();
        key.strip_prefix("0x")
            .unwrap_or(key)
            .parse::<LocalWallet>()
            .map_err(|e| ClientError::config(blockchain, format!("invalid private key: {}", e)))?
    };

    Ok(wallet.with_chain_id(config.chain_id))
}
