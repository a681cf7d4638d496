//! Error types for the relay node

use crate::chain::Blockchain;
use crate::coordination::ContractRole;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the chain-utility layer (RPC access, signing, submission
/// bookkeeping).
#[derive(Error, Debug, Clone)]
pub enum UtilitiesError {
    #[error("RPC error on {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Contract logic error: {0}")]
    ContractLogic(String),

    #[error("Transaction nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    #[error("Insufficient funds for transaction: {0}")]
    InsufficientFunds(String),

    #[error("Maximum total fee per gas {max_total_fee_per_gas} exceeded (required {required})")]
    MaxTotalFeePerGasExceeded {
        max_total_fee_per_gas: String,
        required: String,
    },

    #[error("Transaction submission {0} is unknown")]
    UnknownSubmission(Uuid),

    #[error("Transaction submission {id} failed: {reason}")]
    SubmissionFailed { id: Uuid, reason: String },

    #[error("No contract address configured for role {0}")]
    MissingContract(ContractRole),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid endpoint {url}: {message}")]
    InvalidEndpoint { url: String, message: String },
}

impl UtilitiesError {
    /// Check if error is a transport-level failure worth trying on another
    /// endpoint
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            UtilitiesError::Rpc { .. } | UtilitiesError::Timeout { .. }
        )
    }

    /// Check if the collaborator can no longer say what happened to a
    /// submission
    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self,
            UtilitiesError::UnknownSubmission(_) | UtilitiesError::SubmissionFailed { .. }
        )
    }
}

/// Result type for chain-utility operations
pub type UtilitiesResult<T> = Result<T, UtilitiesError>;

/// Blockchain client error. Every variant names the chain whose client
/// raised it.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{chain} client configuration error: {message}")]
    Config { chain: Blockchain, message: String },

    #[error("{chain} client error: insufficient balance")]
    InsufficientBalance { chain: Blockchain },

    #[error("{chain} client error: invalid signature")]
    InvalidSignature { chain: Blockchain },

    #[error("{chain} client error: unresolvable transfer/transferFrom submission error ({internal_transaction_id})")]
    UnresolvableSubmission {
        chain: Blockchain,
        internal_transaction_id: Uuid,
        #[source]
        source: UtilitiesError,
    },

    #[error("{chain} client error: {source}")]
    MaxTotalFeePerGasExceeded {
        chain: Blockchain,
        #[source]
        source: UtilitiesError,
    },

    #[error("{chain} client error: {source}")]
    NonceTooLow {
        chain: Blockchain,
        #[source]
        source: UtilitiesError,
    },

    #[error("{chain} client invariant violated: {message}")]
    Internal { chain: Blockchain, message: String },

    #[error("{chain} client error: {message}")]
    Client {
        chain: Blockchain,
        message: String,
        #[source]
        source: Option<UtilitiesError>,
    },
}

impl ClientError {
    pub fn config(chain: Blockchain, message: impl Into<String>) -> Self {
        ClientError::Config {
            chain,
            message: message.into(),
        }
    }

    pub fn client(chain: Blockchain, message: impl Into<String>) -> Self {
        ClientError::Client {
            chain,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a utilities error raised while doing `context`, keeping the typed
    /// submission failures distinct from the generic case.
    pub fn from_utilities(
        chain: Blockchain,
        context: impl Into<String>,
        error: UtilitiesError,
    ) -> Self {
        match error {
            UtilitiesError::MaxTotalFeePerGasExceeded { .. } => {
                ClientError::MaxTotalFeePerGasExceeded { chain, source: error }
            }
            UtilitiesError::NonceTooLow(_) => ClientError::NonceTooLow { chain, source: error },
            other => ClientError::Client {
                chain,
                message: context.into(),
                source: Some(other),
            },
        }
    }

    /// Chain whose client raised the error
    pub fn chain(&self) -> Blockchain {
        match self {
            ClientError::Config { chain, .. }
            | ClientError::InsufficientBalance { chain }
            | ClientError::InvalidSignature { chain }
            | ClientError::UnresolvableSubmission { chain, .. }
            | ClientError::MaxTotalFeePerGasExceeded { chain, .. }
            | ClientError::NonceTooLow { chain, .. }
            | ClientError::Internal { chain, .. }
            | ClientError::Client { chain, .. } => *chain,
        }
    }

    /// Check if error is a user-facing rejection of the request as stated
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            ClientError::InsufficientBalance { .. } | ClientError::InvalidSignature { .. }
        )
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            ClientError::UnresolvableSubmission { .. }
                | ClientError::Config { .. }
                | ClientError::Internal { .. }
        )
    }
}

/// Result type for blockchain client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors of the durable health store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown blockchain id {0} in store")]
    UnknownBlockchain(i64),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_submission_errors_stay_distinct() {
        let fee = ClientError::from_utilities(
            Blockchain::Polygon,
            "unable to start a transfer submission",
            UtilitiesError::MaxTotalFeePerGasExceeded {
                max_total_fee_per_gas: "10".to_string(),
                required: "20".to_string(),
            },
        );
        assert!(matches!(fee, ClientError::MaxTotalFeePerGasExceeded { .. }));

        let nonce = ClientError::from_utilities(
            Blockchain::Polygon,
            "unable to start a transfer submission",
            UtilitiesError::NonceTooLow("nonce 1 is below account nonce 4".to_string()),
        );
        assert!(matches!(nonce, ClientError::NonceTooLow { .. }));

        let generic = ClientError::from_utilities(
            Blockchain::Polygon,
            "unable to start a transfer submission",
            UtilitiesError::Abi("bad".to_string()),
        );
        assert!(matches!(generic, ClientError::Client { .. }));
        assert_eq!(generic.chain(), Blockchain::Polygon);
    }

    #[test]
    fn test_error_message_names_chain() {
        let error = ClientError::InsufficientBalance {
            chain: Blockchain::Avalanche,
        };
        assert_eq!(error.to_string(), "Avalanche client error: insufficient balance");
        assert!(error.is_user_rejection());
        assert!(!error.should_alert());
    }
}
