//! Maps the chain-utility view of a submission to the transfer-level status

use crate::chain::{Blockchain, TransferSubmissionStatusResponse};
use crate::error::{ClientError, ClientResult};
use crate::tx::{ChainUtilities, TransactionStatus};

use async_trait::async_trait;
use ethers::types::U256;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Reads the on-chain transfer id from a confirmed transfer transaction
#[async_trait]
pub trait OnChainTransferIdReader: Send + Sync {
    async fn read_on_chain_transfer_id(
        &self,
        transaction_id: &str,
        destination_blockchain: Blockchain,
    ) -> ClientResult<U256>;
}

pub struct TransferSubmissionStatusTracker {
    blockchain: Blockchain,
    utilities: Arc<dyn ChainUtilities>,
    reader: Arc<dyn OnChainTransferIdReader>,
}

impl TransferSubmissionStatusTracker {
    pub fn new(
        blockchain: Blockchain,
        utilities: Arc<dyn ChainUtilities>,
        reader: Arc<dyn OnChainTransferIdReader>,
    ) -> Self {
        Self {
            blockchain,
            utilities,
            reader,
        }
    }

    pub async fn resolve(
        &self,
        internal_transaction_id: Uuid,
        destination_blockchain: Blockchain,
    ) -> ClientResult<TransferSubmissionStatusResponse> {
        let chain = self.blockchain;

        let status = self
            .utilities
            .get_transaction_submission_status(internal_transaction_id)
            .await
            .map_err(|source| {
                if source.is_unresolvable() {
                    ClientError::UnresolvableSubmission {
                        chain,
                        internal_transaction_id,
                        source,
                    }
                } else {
                    ClientError::from_utilities(chain, "transfer submission status", source)
                }
            })?;

        info!(
            blockchain = %chain,
            %internal_transaction_id,
            completed = status.completed,
            status = %status.status,
            transaction_id = ?status.transaction_id,
            "Transfer submission status"
        );

        if !status.completed {
            return Ok(TransferSubmissionStatusResponse::pending());
        }

        if !matches!(
            status.status,
            TransactionStatus::Confirmed | TransactionStatus::Reverted
        ) {
            return Err(ClientError::Internal {
                chain,
                message: format!(
                    "completed submission {} has unexpected status {}",
                    internal_transaction_id, status.status
                ),
            });
        }

        let transaction_id = status.transaction_id.ok_or_else(|| ClientError::Internal {
            chain,
            message: format!(
                "completed submission {} has no transaction id",
                internal_transaction_id
            ),
        })?;

        let on_chain_transfer_id = if status.status == TransactionStatus::Confirmed {
            Some(
                self.reader
                    .read_on_chain_transfer_id(&transaction_id, destination_blockchain)
                    .await?,
            )
        } else {
            None
        };

        Ok(TransferSubmissionStatusResponse {
            completed: true,
            status: Some(status.status),
            transaction_id: Some(transaction_id),
            on_chain_transfer_id,
        })
    }
}
