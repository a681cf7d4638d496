//! Two-phase submission of a prerequisite and a dependent transaction
//!
//! The dependent transaction is started on a wall-clock delay of
//! `blocks_to_wait` average block times after the prerequisite was accepted.
//! The phases are not atomic: if the prerequisite fails after the dependent
//! transaction has been sent, nothing compensates for it. Before sending, the
//! delayed job checks whether the prerequisite has already been observed as
//! failed and skips the dependent transaction in that case. The nonce of a
//! dependent transaction that is never sent goes back to the nonce manager.

use super::coordinator::{SubmissionStartRequest, TransactionSubmissionCoordinator};
use crate::error::UtilitiesResult;
use crate::jobs::JobExecutor;
use crate::tx::{NonceManager, TransactionStatus, TransactionSubmissionRequest};

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DependentTransactionRequest {
    pub prerequisite: SubmissionStartRequest,
    pub dependent: SubmissionStartRequest,
    pub blocks_to_wait: u64,
}

pub struct DependentTransactionScheduler {
    coordinator: Arc<TransactionSubmissionCoordinator>,
    executor: Arc<dyn JobExecutor>,
    average_block_time: Duration,
    nonces: Arc<NonceManager>,
}

impl DependentTransactionScheduler {
    pub fn new(
        coordinator: Arc<TransactionSubmissionCoordinator>,
        executor: Arc<dyn JobExecutor>,
        average_block_time: Duration,
        nonces: Arc<NonceManager>,
    ) -> Self {
        Self {
            coordinator,
            executor,
            average_block_time,
            nonces,
        }
    }

    /// Delay between the prerequisite and the dependent submission
    pub fn delay_for(&self, blocks_to_wait: u64) -> Duration {
        let blocks = u32::try_from(blocks_to_wait).unwrap_or(u32::MAX);
        self.average_block_time.saturating_mul(blocks)
    }

    /// Start the prerequisite and schedule the dependent submission.
    ///
    /// Returns the prerequisite's internal id. The dependent id only shows up
    /// in the scheduled job's logs.
    pub async fn start(&self, request: DependentTransactionRequest) -> UtilitiesResult<Uuid> {
        // Resolve the dependent request now so configuration errors surface
        // before anything is broadcast
        let dependent = self.coordinator.build(request.dependent)?;
        let prerequisite_id = self.coordinator.start(request.prerequisite).await?;

        let delay = self.delay_for(request.blocks_to_wait);
        let job = submit_dependent(
            self.coordinator.clone(),
            self.nonces.clone(),
            prerequisite_id,
            dependent,
        );
        self.executor.submit_after(
            &format!("dependent-submission-{}", prerequisite_id),
            delay,
            job.boxed(),
        );

        info!(
            blockchain = %self.coordinator.blockchain(),
            prerequisite_internal_transaction_id = %prerequisite_id,
            blocks_to_wait = request.blocks_to_wait,
            delay_secs = delay.as_secs(),
            "Dependent transaction scheduled"
        );
        crate::metrics::record_dependent_job(self.coordinator.blockchain(), "scheduled");

        Ok(prerequisite_id)
    }
}

async fn submit_dependent(
    coordinator: Arc<TransactionSubmissionCoordinator>,
    nonces: Arc<NonceManager>,
    prerequisite_id: Uuid,
    dependent: TransactionSubmissionRequest,
) {
    let blockchain = coordinator.blockchain();
    let nonce = dependent.nonce;

    match coordinator
        .utilities()
        .get_transaction_submission_status(prerequisite_id)
        .await
    {
        Ok(status) if status.status == TransactionStatus::Reverted => {
            error!(
                %blockchain,
                prerequisite_internal_transaction_id = %prerequisite_id,
                "Prerequisite transaction reverted, dependent transaction not submitted"
            );
            nonces.release(nonce..nonce + 1).await;
            crate::metrics::record_dependent_job(blockchain, "skipped");
            return;
        }
        Err(e) if e.is_unresolvable() => {
            error!(
                %blockchain,
                prerequisite_internal_transaction_id = %prerequisite_id,
                error = %e,
                "Prerequisite transaction failed, dependent transaction not submitted"
            );
            nonces.release(nonce..nonce + 1).await;
            crate::metrics::record_dependent_job(blockchain, "skipped");
            return;
        }
        Err(e) => {
            warn!(
                %blockchain,
                prerequisite_internal_transaction_id = %prerequisite_id,
                error = %e,
                "Prerequisite status unavailable, submitting dependent transaction"
            );
        }
        Ok(_) => {}
    }

    match coordinator.submit(dependent).await {
        Ok(dependent_id) => {
            info!(
                %blockchain,
                prerequisite_internal_transaction_id = %prerequisite_id,
                dependent_internal_transaction_id = %dependent_id,
                "Dependent transaction submitted"
            );
            crate::metrics::record_dependent_job(blockchain, "submitted");
        }
        Err(e) => {
            error!(
                %blockchain,
                prerequisite_internal_transaction_id = %prerequisite_id,
                error = %e,
                "Dependent transaction submission failed"
            );
            nonces.release(nonce..nonce + 1).await;
            crate::metrics::record_dependent_job(blockchain, "failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::coordinator::tests::{coordinator, hub, start_request, FakeUtilities};
    use crate::coordination::ContractRole;
    use crate::error::UtilitiesError;
    use crate::jobs::TokioJobExecutor;
    use crate::tx::SubmissionStatus;

    fn scheduler(utilities: Arc<FakeUtilities>, executor: Arc<dyn JobExecutor>) -> DependentTransactionScheduler {
        scheduler_with_nonces(utilities, executor, Arc::new(NonceManager::new()))
    }

    fn scheduler_with_nonces(
        utilities: Arc<FakeUtilities>,
        executor: Arc<dyn JobExecutor>,
        nonces: Arc<NonceManager>,
    ) -> DependentTransactionScheduler {
        DependentTransactionScheduler::new(
            Arc::new(coordinator(utilities)),
            executor,
            Duration::from_secs(2),
            nonces,
        )
    }

    fn request() -> DependentTransactionRequest {
        DependentTransactionRequest {
            prerequisite: start_request(ContractRole::Hub, 7),
            dependent: start_request(ContractRole::Hub, 8),
            blocks_to_wait: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_fires_after_block_delay() {
        let utilities = Arc::new(FakeUtilities::default());
        let executor = Arc::new(TokioJobExecutor::new());
        let scheduler = scheduler(utilities.clone(), executor.clone());

        let prerequisite_id = scheduler.start(request()).await.unwrap();
        assert_eq!(utilities.started().len(), 1);
        assert_eq!(utilities.started()[0].0, prerequisite_id);

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(utilities.started().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let started = utilities.started();
        assert_eq!(started.len(), 2);
        assert_ne!(started[1].0, prerequisite_id);
        assert_eq!(started[1].1.nonce, 8);
        assert_eq!(started[1].1.contract_address, hub());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_prerequisite_skips_dependent() {
        let utilities = Arc::new(FakeUtilities::default());
        let executor = Arc::new(TokioJobExecutor::new());
        let scheduler = scheduler(utilities.clone(), executor.clone());

        let prerequisite_id = scheduler.start(request()).await.unwrap();
        utilities.set_status(
            prerequisite_id,
            Err(UtilitiesError::SubmissionFailed {
                id: prerequisite_id,
                reason: "nonce consumed by another transaction".to_string(),
            }),
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(utilities.started().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_prerequisite_skips_dependent() {
        let utilities = Arc::new(FakeUtilities::default());
        let executor = Arc::new(TokioJobExecutor::new());
        let scheduler = scheduler(utilities.clone(), executor.clone());

        let prerequisite_id = scheduler.start(request()).await.unwrap();
        utilities.set_status(
            prerequisite_id,
            Ok(SubmissionStatus::completed(
                TransactionStatus::Reverted,
                "0x01".to_string(),
            )),
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(utilities.started().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_dependent_releases_its_nonce() {
        let utilities = Arc::new(FakeUtilities::default());
        let nonces = Arc::new(NonceManager::new());
        assert_eq!(nonces.reserve(7, 2).await, 7);
        let scheduler = scheduler_with_nonces(
            utilities.clone(),
            Arc::new(TokioJobExecutor::new()),
            nonces.clone(),
        );

        let prerequisite_id = scheduler.start(request()).await.unwrap();
        utilities.set_status(
            prerequisite_id,
            Ok(SubmissionStatus::completed(
                TransactionStatus::Reverted,
                "0x01".to_string(),
            )),
        );
        tokio::time::sleep(Duration::from_secs(11)).await;

        // The reverted prerequisite consumed nonce 7, nonce 8 was never sent
        assert_eq!(utilities.started().len(), 1);
        assert_eq!(nonces.next_nonce(8).await, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dependent_submission_releases_its_nonce() {
        let utilities = Arc::new(FakeUtilities::default());
        let nonces = Arc::new(NonceManager::new());
        assert_eq!(nonces.reserve(7, 2).await, 7);
        let scheduler = scheduler_with_nonces(
            utilities.clone(),
            Arc::new(TokioJobExecutor::new()),
            nonces.clone(),
        );

        scheduler.start(request()).await.unwrap();
        *utilities.fail_start.lock().unwrap() = Some(UtilitiesError::Rpc {
            endpoint: "https://rpc.example/abcd".to_string(),
            message: "connection reset".to_string(),
        });
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(utilities.started().len(), 1);
        assert_eq!(nonces.next_nonce(8).await, 8);
    }

    #[tokio::test]
    async fn test_unresolvable_dependent_role_fails_before_prerequisite() {
        let utilities = Arc::new(FakeUtilities::default());
        let executor = Arc::new(TokioJobExecutor::new());
        let scheduler = scheduler(utilities.clone(), executor.clone());
        let mut request = request();
        request.dependent.role = ContractRole::Forwarder;

        assert!(scheduler.start(request).await.is_err());
        assert!(utilities.started().is_empty());
        assert_eq!(executor.in_flight(), 0);
    }

    #[test]
    fn test_delay_is_blocks_times_block_time() {
        let scheduler = scheduler(
            Arc::new(FakeUtilities::default()),
            Arc::new(TokioJobExecutor::new()),
        );
        assert_eq!(scheduler.delay_for(5), Duration::from_secs(10));
        assert_eq!(scheduler.delay_for(0), Duration::ZERO);
    }
}
