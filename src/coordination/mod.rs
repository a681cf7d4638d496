//! Coordination of transaction submissions on one chain
//!
//! This module provides:
//! 1. Role-based contract resolution and submission start
//! 2. Two-phase prerequisite/dependent submissions on a block delay
//! 3. Translation of submission status into transfer status

pub mod coordinator;
pub mod dependency;
pub mod status;

pub use coordinator::{
    ContractRegistry, ContractRole, SubmissionStartRequest, TransactionSubmissionCoordinator,
};
pub use dependency::{DependentTransactionRequest, DependentTransactionScheduler};
pub use status::{OnChainTransferIdReader, TransferSubmissionStatusTracker};
