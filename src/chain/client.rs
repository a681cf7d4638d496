//! Blockchain client capability trait and its request/response types

use super::Blockchain;
use crate::error::ClientResult;
use crate::tx::TransactionStatus;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};
use semver::Version;
use serde::Serialize;
use uuid::Uuid;

/// Same-chain transfer as signed by the sender
#[derive(Debug, Clone)]
pub struct TransferSubmissionStartRequest {
    pub internal_transfer_id: u64,
    pub sender_address: Address,
    pub recipient_address: Address,
    pub token_address: Address,
    pub amount: U256,
    pub fee: U256,
    pub sender_nonce: U256,
    pub valid_until: U256,
    pub signature: Bytes,
}

/// Cross-chain transfer leg on the source chain
#[derive(Debug, Clone)]
pub struct TransferFromSubmissionStartRequest {
    pub internal_transfer_id: u64,
    pub destination_blockchain: Blockchain,
    pub sender_address: Address,
    /// Address on the destination chain
    pub recipient_address: String,
    pub source_token_address: Address,
    /// Token address on the destination chain
    pub destination_token_address: String,
    pub amount: U256,
    pub fee: U256,
    pub sender_nonce: U256,
    pub valid_until: U256,
    pub signature: Bytes,
}

#[derive(Debug, Clone)]
pub struct ExternalTokenRecordRequest {
    pub token_address: Address,
    pub external_blockchain: Blockchain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalTokenRecordResponse {
    pub is_registration_active: bool,
    pub external_token_address: String,
}

/// Status of a transfer submission.
///
/// `status`, `transaction_id` and `on_chain_transfer_id` are only set once
/// the submission is completed; the transfer id only for confirmed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSubmissionStatusResponse {
    pub completed: bool,
    pub status: Option<TransactionStatus>,
    pub transaction_id: Option<String>,
    pub on_chain_transfer_id: Option<U256>,
}

impl TransferSubmissionStatusResponse {
    pub fn pending() -> Self {
        Self {
            completed: false,
            status: None,
            transaction_id: None,
            on_chain_transfer_id: None,
        }
    }
}

/// Chain operations of the node. One instance per active chain.
///
/// Every error names the chain of the client that raised it.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    fn blockchain(&self) -> Blockchain;

    fn protocol_version(&self) -> &Version;

    /// Address of the node's signing key
    fn own_address(&self) -> String;

    async fn is_node_registered(&self) -> ClientResult<bool>;

    /// Register the node at the hub. A non-zero deposit is approved to the
    /// hub first.
    async fn register_node(
        &self,
        node_url: &str,
        node_deposit: U256,
        withdrawal_address: Address,
    ) -> ClientResult<()>;

    async fn unregister_node(&self) -> ClientResult<()>;

    async fn cancel_unregistration(&self) -> ClientResult<()>;

    async fn is_unbonding(&self) -> ClientResult<bool>;

    async fn update_node_url(&self, node_url: &str) -> ClientResult<()>;

    async fn read_node_url(&self) -> ClientResult<String>;

    async fn read_minimum_deposit(&self) -> ClientResult<U256>;

    async fn read_external_token_record(
        &self,
        request: &ExternalTokenRecordRequest,
    ) -> ClientResult<ExternalTokenRecordResponse>;

    async fn read_own_token_balance(&self) -> ClientResult<U256>;

    async fn read_own_native_balance(&self) -> ClientResult<U256>;

    /// Solidity-packed keccak of typed values
    fn calculate_commitment(&self, values: &[Token]) -> ClientResult<H256>;

    /// Blocks between a commitment and the action it commits to
    async fn get_commitment_wait_period(&self, blockchain: Blockchain) -> ClientResult<u64>;

    async fn get_validator_fee_factor(&self, blockchain: Blockchain) -> ClientResult<U256>;

    async fn start_transfer_submission(
        &self,
        request: &TransferSubmissionStartRequest,
    ) -> ClientResult<Uuid>;

    async fn start_transfer_from_submission(
        &self,
        request: &TransferFromSubmissionStartRequest,
    ) -> ClientResult<Uuid>;

    async fn get_transfer_submission_status(
        &self,
        internal_transaction_id: Uuid,
        destination_blockchain: Blockchain,
    ) -> ClientResult<TransferSubmissionStatusResponse>;

    async fn is_protocol_version_supported_by_forwarder_contract(&self) -> ClientResult<bool>;

    async fn is_protocol_version_supported_by_hub_contract(&self) -> ClientResult<bool>;

    fn is_valid_address(&self, address: &str) -> bool;

    /// Valid and not the zero address
    fn is_valid_recipient_address(&self, recipient_address: &str) -> bool;
}
