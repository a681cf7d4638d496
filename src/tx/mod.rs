//! Transaction submission with fee escalation and nonce management

mod fees;
mod nonce;
pub(crate) mod submission;

pub use fees::{escalate, initial_gas_price, FeePolicy, GasPrice};
pub use nonce::NonceManager;
pub use submission::SubmissionEngine;

use crate::error::UtilitiesResult;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Fully resolved request for one logical submission
#[derive(Debug, Clone)]
pub struct TransactionSubmissionRequest {
    pub contract_address: Address,
    pub function_selector: [u8; 4],
    pub function_args: Vec<Token>,
    /// Estimated from the node when absent
    pub gas: Option<U256>,
    /// Native coins sent along
    pub amount: Option<U256>,
    pub nonce: u64,
    pub fee_policy: FeePolicy,
}

/// On-chain state of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Unincluded,
    Unconfirmed,
    Confirmed,
    Reverted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Unincluded => "UNINCLUDED",
            TransactionStatus::Unconfirmed => "UNCONFIRMED",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::Reverted => "REVERTED",
        };
        f.write_str(name)
    }
}

/// Status of a submission as seen by the chain-utility layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionStatus {
    pub completed: bool,
    pub status: TransactionStatus,
    /// Hash of the included transaction
    pub transaction_id: Option<String>,
}

impl SubmissionStatus {
    pub fn pending(status: TransactionStatus) -> Self {
        Self {
            completed: false,
            status,
            transaction_id: None,
        }
    }

    pub fn completed(status: TransactionStatus, transaction_id: String) -> Self {
        Self {
            completed: true,
            status,
            transaction_id: Some(transaction_id),
        }
    }
}

/// Broadcast, resubmission and inclusion polling of submissions
#[async_trait]
pub trait ChainUtilities: Send + Sync {
    /// Broadcast the first attempt and hand the submission to a background
    /// watcher. Returns as soon as the first broadcast is accepted.
    async fn start_transaction_submission(
        &self,
        request: TransactionSubmissionRequest,
    ) -> UtilitiesResult<Uuid>;

    async fn get_transaction_submission_status(
        &self,
        internal_transaction_id: Uuid,
    ) -> UtilitiesResult<SubmissionStatus>;
}
