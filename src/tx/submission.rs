//! Submission engine: broadcast, fee-escalating resubmission and inclusion
//! tracking for one chain's signing key

use super::fees::{escalate, initial_gas_price, FeePolicy, GasPrice};
use super::{ChainUtilities, SubmissionStatus, TransactionStatus, TransactionSubmissionRequest};
use crate::chain::contracts;
use crate::chain::{Blockchain, EvmNode};
use crate::error::{UtilitiesError, UtilitiesResult};
use crate::jobs::JobExecutor;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, H256, U256};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long an included or failed submission stays queryable
pub const SUBMISSION_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubmissionState {
    Pending,
    Included { tx_hash: H256, block_number: u64 },
    Failed(String),
}

/// One logical submission: a nonce and every broadcast made for it
#[derive(Debug, Clone)]
struct Submission {
    to: Address,
    data: Bytes,
    value: Option<U256>,
    gas: U256,
    nonce: u64,
    fee_policy: FeePolicy,
    gas_price: GasPrice,
    /// Hashes of all broadcasts, oldest first
    attempts: Vec<H256>,
    /// Block number at the latest fee change
    broadcast_block: u64,
    state: SubmissionState,
    /// Set while the submission is included or failed
    finished_at: Option<Instant>,
}

enum WatchStep {
    Continue,
    Done,
}

struct EngineInner {
    blockchain: Blockchain,
    node: Arc<dyn EvmNode>,
    wallet: LocalWallet,
    executor: Arc<dyn JobExecutor>,
    average_block_time: Duration,
    confirmations: u64,
    submissions: DashMap<Uuid, Submission>,
}

/// Chain-utility collaborator of an EVM chain
#[derive(Clone)]
pub struct SubmissionEngine {
    inner: Arc<EngineInner>,
}

impl SubmissionEngine {
    pub fn new(
        blockchain: Blockchain,
        node: Arc<dyn EvmNode>,
        wallet: LocalWallet,
        average_block_time: Duration,
        confirmations: u64,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                blockchain,
                node,
                wallet,
                executor,
                average_block_time,
                confirmations,
                submissions: DashMap::new(),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.wallet.address()
    }
}

impl EngineInner {
    fn spawn_watch(self: &Arc<Self>, id: Uuid) {
        let inner = self.clone();
        self.executor
            .submit(&format!("watch-submission-{}", id), watch(inner, id).boxed());
    }

    fn build_transaction(&self, submission: &Submission, price: &GasPrice) -> TypedTransaction {
        let from = self.wallet.address();
        let chain_id = self.wallet.chain_id();

        let mut tx: TypedTransaction = match price {
            GasPrice::Legacy(gas_price) => TransactionRequest::new()
                .from(from)
                .to(submission.to)
                .data(submission.data.clone())
                .nonce(submission.nonce)
                .gas(submission.gas)
                .gas_price(*gas_price)
                .chain_id(chain_id)
                .into(),
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .from(from)
                .to(submission.to)
                .data(submission.data.clone())
                .nonce(submission.nonce)
                .gas(submission.gas)
                .max_fee_per_gas(*max_fee_per_gas)
                .max_priority_fee_per_gas(*max_priority_fee_per_gas)
                .chain_id(chain_id)
                .into(),
        };

        if let Some(value) = submission.value {
            tx.set_value(value);
        }
        tx
    }

    async fn broadcast(&self, submission: &Submission, price: &GasPrice) -> UtilitiesResult<H256> {
        let tx = self.build_transaction(submission, price);
        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| UtilitiesError::Signing(e.to_string()))?;

        self.node.send_raw_transaction(tx.rlp_signed(&signature)).await
    }

    fn fail(&self, id: Uuid, reason: &str) {
        if let Some(mut submission) = self.submissions.get_mut(&id) {
            submission.state = SubmissionState::Failed(reason.to_string());
            submission.finished_at = Some(Instant::now());
        }
        error!(blockchain = %self.blockchain, internal_transaction_id = %id, reason, "Transaction submission failed");
        crate::metrics::record_submission_failed(self.blockchain);
    }

    /// Drop submissions that finished longer than the retention ago
    fn evict_finished(&self) {
        let before = self.submissions.len();
        self.submissions.retain(|_, submission| {
            submission
                .finished_at
                .map_or(true, |at| at.elapsed() < SUBMISSION_RETENTION)
        });
        let evicted = before.saturating_sub(self.submissions.len());
        if evicted > 0 {
            debug!(blockchain = %self.blockchain, evicted, "Evicted finished submissions");
        }
    }

    /// One round of the watch loop
    async fn poll(&self, id: Uuid) -> UtilitiesResult<WatchStep> {
        let submission = match self.submissions.get(&id).map(|entry| entry.value().clone()) {
            Some(submission) if submission.state == SubmissionState::Pending => submission,
            _ => return Ok(WatchStep::Done),
        };

        // Read the count before the receipts so an inclusion racing this
        // poll is never taken for a foreign transaction
        let transaction_count = self.node.transaction_count(self.wallet.address()).await?;

        for tx_hash in submission.attempts.iter().rev() {
            let receipt = self.node.transaction_receipt(*tx_hash).await?;
            if let Some(block_number) = receipt.and_then(|r| r.block_number) {
                if let Some(mut entry) = self.submissions.get_mut(&id) {
                    entry.state = SubmissionState::Included {
                        tx_hash: *tx_hash,
                        block_number: block_number.as_u64(),
                    };
                    entry.finished_at = Some(Instant::now());
                }
                info!(
                    blockchain = %self.blockchain,
                    internal_transaction_id = %id,
                    transaction_id = %format!("{:#x}", tx_hash),
                    block_number = block_number.as_u64(),
                    "Transaction included"
                );
                return Ok(WatchStep::Done);
            }
        }

        if transaction_count > submission.nonce {
            self.fail(id, "nonce consumed by another transaction");
            return Ok(WatchStep::Done);
        }

        let block_number = self.node.block_number().await?;
        if block_number
            < submission.broadcast_block + submission.fee_policy.blocks_until_resubmission
        {
            return Ok(WatchStep::Continue);
        }

        let Some(next_price) = escalate(&submission.gas_price, &submission.fee_policy) else {
            self.fail(id, "maximum total fee per gas reached without inclusion");
            return Ok(WatchStep::Done);
        };

        match self.broadcast(&submission, &next_price).await {
            Ok(tx_hash) => {
                if let Some(mut entry) = self.submissions.get_mut(&id) {
                    entry.attempts.push(tx_hash);
                    entry.gas_price = next_price;
                    entry.broadcast_block = block_number;
                }
                info!(
                    blockchain = %self.blockchain,
                    internal_transaction_id = %id,
                    transaction_id = %format!("{:#x}", tx_hash),
                    total_fee_per_gas = %next_price.total_fee_per_gas(),
                    "Transaction resubmitted"
                );
                crate::metrics::record_resubmission(self.blockchain);
            }
            Err(UtilitiesError::Underpriced(message)) => {
                // Keep climbing; the next round bids above this price
                if let Some(mut entry) = self.submissions.get_mut(&id) {
                    entry.gas_price = next_price;
                    entry.broadcast_block = block_number;
                }
                warn!(internal_transaction_id = %id, %message, "Resubmission underpriced");
            }
            Err(UtilitiesError::NonceTooLow(_)) => {
                debug!(internal_transaction_id = %id, "Nonce consumed, resolving on next poll");
            }
            Err(e) => return Err(e),
        }

        Ok(WatchStep::Continue)
    }

    /// Status of an included submission, re-verified against the chain
    async fn included_status(
        self: &Arc<Self>,
        id: Uuid,
        tx_hash: H256,
        block_number: u64,
    ) -> UtilitiesResult<SubmissionStatus> {
        let current_block = self.node.block_number().await?;
        if current_block.saturating_sub(block_number) < self.confirmations {
            return Ok(SubmissionStatus::pending(TransactionStatus::Unconfirmed));
        }

        let receipt = self.node.transaction_receipt(tx_hash).await?;
        let receipt_block = receipt
            .as_ref()
            .and_then(|r| r.block_number)
            .map(|b| b.as_u64());

        match (receipt, receipt_block) {
            (Some(receipt), Some(found)) if found == block_number => {
                let status = if receipt.status.map(|s| s.as_u64()) == Some(1) {
                    TransactionStatus::Confirmed
                } else {
                    TransactionStatus::Reverted
                };
                Ok(SubmissionStatus::completed(status, format!("{:#x}", tx_hash)))
            }
            (Some(_), Some(found)) => {
                if let Some(mut entry) = self.submissions.get_mut(&id) {
                    entry.state = SubmissionState::Included {
                        tx_hash,
                        block_number: found,
                    };
                }
                debug!(internal_transaction_id = %id, block_number = found, "Transaction moved to another block");
                Ok(SubmissionStatus::pending(TransactionStatus::Unconfirmed))
            }
            _ => {
                let mut rewatch = false;
                if let Some(mut entry) = self.submissions.get_mut(&id) {
                    if matches!(entry.state, SubmissionState::Included { .. }) {
                        entry.state = SubmissionState::Pending;
                        entry.broadcast_block = current_block;
                        entry.finished_at = None;
                        rewatch = true;
                    }
                }
                if rewatch {
                    warn!(
                        blockchain = %self.blockchain,
                        internal_transaction_id = %id,
                        "Included transaction disappeared, watching again"
                    );
                    self.spawn_watch(id);
                }
                Ok(SubmissionStatus::pending(TransactionStatus::Unincluded))
            }
        }
    }
}

async fn watch(inner: Arc<EngineInner>, id: Uuid) {
    loop {
        tokio::time::sleep(inner.average_block_time).await;

        match inner.poll(id).await {
            Ok(WatchStep::Continue) => {}
            Ok(WatchStep::Done) => return,
            Err(e) => {
                warn!(
                    blockchain = %inner.blockchain,
                    internal_transaction_id = %id,
                    error = %e,
                    "Submission watch round failed"
                );
            }
        }
    }
}

#[async_trait]
impl ChainUtilities for SubmissionEngine {
    async fn start_transaction_submission(
        &self,
        request: TransactionSubmissionRequest,
    ) -> UtilitiesResult<Uuid> {
        let inner = &self.inner;
        let from = inner.wallet.address();
        inner.evict_finished();

        let account_nonce = inner.node.transaction_count(from).await?;
        if request.nonce < account_nonce {
            return Err(UtilitiesError::NonceTooLow(format!(
                "nonce {} is below account nonce {}",
                request.nonce, account_nonce
            )));
        }

        let fee_data = inner.node.fee_data().await?;
        let gas_price = initial_gas_price(&fee_data, &request.fee_policy)?;

        let data = contracts::encode_call(request.function_selector, &request.function_args);
        let gas = match request.gas {
            Some(gas) => gas,
            None => {
                inner
                    .node
                    .estimate_gas(from, request.contract_address, data.clone(), request.amount)
                    .await?
            }
        };

        let broadcast_block = inner.node.block_number().await?;
        let mut submission = Submission {
            to: request.contract_address,
            data,
            value: request.amount,
            gas,
            nonce: request.nonce,
            fee_policy: request.fee_policy,
            gas_price,
            attempts: Vec::new(),
            broadcast_block,
            state: SubmissionState::Pending,
            finished_at: None,
        };

        let tx_hash = inner.broadcast(&submission, &gas_price).await?;
        submission.attempts.push(tx_hash);

        let id = Uuid::new_v4();
        inner.submissions.insert(id, submission);

        info!(
            blockchain = %inner.blockchain,
            internal_transaction_id = %id,
            transaction_id = %format!("{:#x}", tx_hash),
            nonce = request.nonce,
            "Transaction submitted"
        );

        inner.spawn_watch(id);
        Ok(id)
    }

    async fn get_transaction_submission_status(
        &self,
        internal_transaction_id: Uuid,
    ) -> UtilitiesResult<SubmissionStatus> {
        let state = self
            .inner
            .submissions
            .get(&internal_transaction_id)
            .map(|entry| entry.state.clone())
            .ok_or(UtilitiesError::UnknownSubmission(internal_transaction_id))?;

        match state {
            SubmissionState::Pending => Ok(SubmissionStatus::pending(TransactionStatus::Unincluded)),
            SubmissionState::Failed(reason) => Err(UtilitiesError::SubmissionFailed {
                id: internal_transaction_id,
                reason,
            }),
            SubmissionState::Included {
                tx_hash,
                block_number,
            } => {
                self.inner
                    .included_status(internal_transaction_id, tx_hash, block_number)
                    .await
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::provider::MockEvmNode;
    use crate::chain::FeeData;
    use crate::jobs::tests::ManualJobExecutor;
    use ethers::types::{TransactionReceipt, U64};
    use ethers::utils::keccak256;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    const GWEI: u64 = 1_000_000_000;
    pub(crate) const TEST_KEY: &str =
        "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    pub(crate) fn test_wallet() -> LocalWallet {
        TEST_KEY.parse::<LocalWallet>().unwrap().with_chain_id(137u64)
    }

    /// Scriptable in-memory chain
    #[derive(Default)]
    pub(crate) struct FakeNode {
        pub(crate) block: AtomicU64,
        pub(crate) transaction_count: AtomicU64,
        pub(crate) base_fee: Option<U256>,
        pub(crate) sent: Mutex<Vec<H256>>,
        pub(crate) receipts: Mutex<HashMap<H256, TransactionReceipt>>,
        /// Returned by every `call`
        pub(crate) call_output: Mutex<Bytes>,
    }

    impl FakeNode {
        pub(crate) fn new(block: u64, transaction_count: u64) -> Self {
            Self {
                block: AtomicU64::new(block),
                transaction_count: AtomicU64::new(transaction_count),
                base_fee: Some(U256::from(10 * GWEI)),
                ..Default::default()
            }
        }

        pub(crate) fn include(&self, tx_hash: H256, block: u64, success: bool) {
            let receipt = TransactionReceipt {
                transaction_hash: tx_hash,
                block_number: Some(U64::from(block)),
                status: Some(U64::from(u64::from(success))),
                ..Default::default()
            };
            self.receipts.lock().unwrap().insert(tx_hash, receipt);
        }

        pub(crate) fn sent(&self) -> Vec<H256> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EvmNode for FakeNode {
        async fn block_number(&self) -> UtilitiesResult<u64> {
            Ok(self.block.load(Ordering::SeqCst))
        }

        async fn transaction_count(&self, _address: Address) -> UtilitiesResult<u64> {
            Ok(self.transaction_count.load(Ordering::SeqCst))
        }

        async fn balance(&self, _address: Address) -> UtilitiesResult<U256> {
            Ok(U256::zero())
        }

        async fn call(&self, _from: Address, _to: Address, _data: Bytes) -> UtilitiesResult<Bytes> {
            Ok(self.call_output.lock().unwrap().clone())
        }

        async fn code(&self, _address: Address) -> UtilitiesResult<Bytes> {
            Ok(Bytes::default())
        }

        async fn fee_data(&self) -> UtilitiesResult<FeeData> {
            Ok(FeeData {
                base_fee_per_gas: self.base_fee,
                gas_price: U256::from(10 * GWEI),
            })
        }

        async fn estimate_gas(
            &self,
            _from: Address,
            _to: Address,
            _data: Bytes,
            _value: Option<U256>,
        ) -> UtilitiesResult<U256> {
            Ok(U256::from(21_000))
        }

        async fn send_raw_transaction(&self, raw: Bytes) -> UtilitiesResult<H256> {
            let hash = H256::from(keccak256(&raw));
            self.sent.lock().unwrap().push(hash);
            Ok(hash)
        }

        async fn transaction_receipt(&self, hash: H256) -> UtilitiesResult<Option<TransactionReceipt>> {
            Ok(self.receipts.lock().unwrap().get(&hash).cloned())
        }
    }

    pub(crate) fn request(nonce: u64, cap: Option<u64>) -> TransactionSubmissionRequest {
        TransactionSubmissionRequest {
            contract_address: Address::repeat_byte(0x10),
            function_selector: contracts::HUB_TRANSFER_SELECTOR,
            function_args: vec![],
            gas: Some(U256::from(200_000)),
            amount: None,
            nonce,
            fee_policy: FeePolicy::new(GWEI.into(), cap.map(Into::into), 1.101, 2),
        }
    }

    fn engine(node: Arc<dyn EvmNode>, executor: Arc<ManualJobExecutor>) -> SubmissionEngine {
        SubmissionEngine::new(
            Blockchain::Polygon,
            node,
            test_wallet(),
            Duration::from_secs(2),
            2,
            executor,
        )
    }

    fn gas_price_of(engine: &SubmissionEngine, id: Uuid) -> GasPrice {
        engine.inner.submissions.get(&id).unwrap().gas_price
    }

    #[tokio::test]
    async fn test_nonce_below_account_nonce_never_broadcasts() {
        let mut node = MockEvmNode::new();
        node.expect_transaction_count().returning(|_| Ok(5));
        node.expect_send_raw_transaction().never();
        let executor = Arc::new(ManualJobExecutor::default());
        let engine = engine(Arc::new(node), executor.clone());

        let result = engine.start_transaction_submission(request(3, None)).await;

        assert!(matches!(result, Err(UtilitiesError::NonceTooLow(_))));
        assert_eq!(executor.len(), 0);
    }

    #[tokio::test]
    async fn test_fee_cap_exceeded_at_start() {
        let mut node = MockEvmNode::new();
        node.expect_transaction_count().returning(|_| Ok(3));
        node.expect_fee_data().returning(|| {
            Ok(FeeData {
                base_fee_per_gas: Some(U256::from(10 * GWEI)),
                gas_price: U256::from(10 * GWEI),
            })
        });
        node.expect_send_raw_transaction().never();
        let engine = engine(Arc::new(node), Arc::new(ManualJobExecutor::default()));

        let result = engine
            .start_transaction_submission(request(3, Some(5 * GWEI)))
            .await;

        assert!(matches!(
            result,
            Err(UtilitiesError::MaxTotalFeePerGasExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_returns_before_inclusion() {
        let node = Arc::new(FakeNode::new(100, 3));
        let executor = Arc::new(ManualJobExecutor::default());
        let engine = engine(node.clone(), executor.clone());

        let first = engine.start_transaction_submission(request(3, None)).await.unwrap();
        let second = engine.start_transaction_submission(request(4, None)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(node.sent().len(), 2);
        assert_eq!(executor.len(), 2);
        let status = engine.get_transaction_submission_status(first).await.unwrap();
        assert_eq!(status, SubmissionStatus::pending(TransactionStatus::Unincluded));
    }

    #[tokio::test]
    async fn test_resubmits_with_higher_fee_until_included() {
        let node = Arc::new(FakeNode::new(100, 3));
        let executor = Arc::new(ManualJobExecutor::default());
        let engine = engine(node.clone(), executor);
        let id = engine.start_transaction_submission(request(3, None)).await.unwrap();
        let initial = gas_price_of(&engine, id);

        assert!(matches!(engine.inner.poll(id).await.unwrap(), WatchStep::Continue));
        assert_eq!(node.sent().len(), 1);

        node.block.store(102, Ordering::SeqCst);
        assert!(matches!(engine.inner.poll(id).await.unwrap(), WatchStep::Continue));
        assert_eq!(node.sent().len(), 2);
        assert!(gas_price_of(&engine, id).total_fee_per_gas() > initial.total_fee_per_gas());

        let resubmitted = node.sent()[1];
        node.include(resubmitted, 103, true);
        node.transaction_count.store(4, Ordering::SeqCst);
        assert!(matches!(engine.inner.poll(id).await.unwrap(), WatchStep::Done));

        node.block.store(103, Ordering::SeqCst);
        let unconfirmed = engine.get_transaction_submission_status(id).await.unwrap();
        assert_eq!(unconfirmed, SubmissionStatus::pending(TransactionStatus::Unconfirmed));

        node.block.store(105, Ordering::SeqCst);
        let confirmed = engine.get_transaction_submission_status(id).await.unwrap();
        assert_eq!(
            confirmed,
            SubmissionStatus::completed(TransactionStatus::Confirmed, format!("{:#x}", resubmitted))
        );
    }

    #[tokio::test]
    async fn test_reverted_receipt() {
        let node = Arc::new(FakeNode::new(100, 3));
        let engine = engine(node.clone(), Arc::new(ManualJobExecutor::default()));
        let id = engine.start_transaction_submission(request(3, None)).await.unwrap();

        node.include(node.sent()[0], 101, false);
        node.transaction_count.store(4, Ordering::SeqCst);
        engine.inner.poll(id).await.unwrap();
        node.block.store(110, Ordering::SeqCst);

        let status = engine.get_transaction_submission_status(id).await.unwrap();
        assert!(status.completed);
        assert_eq!(status.status, TransactionStatus::Reverted);
    }

    #[tokio::test]
    async fn test_cap_exhaustion_fails_submission() {
        let node = Arc::new(FakeNode {
            base_fee: None,
            ..FakeNode::new(100, 3)
        });
        let engine = engine(node.clone(), Arc::new(ManualJobExecutor::default()));
        let id = engine
            .start_transaction_submission(request(3, Some(10 * GWEI)))
            .await
            .unwrap();

        node.block.store(102, Ordering::SeqCst);
        assert!(matches!(engine.inner.poll(id).await.unwrap(), WatchStep::Done));

        assert_eq!(node.sent().len(), 1);
        assert!(matches!(
            engine.get_transaction_submission_status(id).await,
            Err(UtilitiesError::SubmissionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_superseded_nonce_fails_submission() {
        let node = Arc::new(FakeNode::new(100, 3));
        let engine = engine(node.clone(), Arc::new(ManualJobExecutor::default()));
        let id = engine.start_transaction_submission(request(3, None)).await.unwrap();

        node.transaction_count.store(4, Ordering::SeqCst);
        assert!(matches!(engine.inner.poll(id).await.unwrap(), WatchStep::Done));
        assert!(engine
            .get_transaction_submission_status(id)
            .await
            .unwrap_err()
            .is_unresolvable());
    }

    #[tokio::test]
    async fn test_reorged_transaction_is_watched_again() {
        let node = Arc::new(FakeNode::new(100, 3));
        let executor = Arc::new(ManualJobExecutor::default());
        let engine = engine(node.clone(), executor.clone());
        let id = engine.start_transaction_submission(request(3, None)).await.unwrap();
        let tx_hash = node.sent()[0];

        node.include(tx_hash, 101, true);
        engine.inner.poll(id).await.unwrap();
        node.receipts.lock().unwrap().clear();
        node.block.store(110, Ordering::SeqCst);

        let status = engine.get_transaction_submission_status(id).await.unwrap();
        assert_eq!(status, SubmissionStatus::pending(TransactionStatus::Unincluded));
        assert_eq!(executor.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_submissions_are_evicted_after_retention() {
        let node = Arc::new(FakeNode::new(100, 3));
        let engine = engine(node.clone(), Arc::new(ManualJobExecutor::default()));
        let included = engine.start_transaction_submission(request(3, None)).await.unwrap();
        let failed = engine.start_transaction_submission(request(4, None)).await.unwrap();
        let pending = engine.start_transaction_submission(request(5, None)).await.unwrap();

        node.include(node.sent()[0], 101, true);
        node.transaction_count.store(4, Ordering::SeqCst);
        engine.inner.poll(included).await.unwrap();
        node.transaction_count.store(5, Ordering::SeqCst);
        engine.inner.poll(failed).await.unwrap();

        tokio::time::advance(SUBMISSION_RETENTION - Duration::from_secs(1)).await;
        engine.start_transaction_submission(request(6, None)).await.unwrap();
        assert_eq!(engine.inner.submissions.len(), 4);

        tokio::time::advance(Duration::from_secs(2)).await;
        engine.start_transaction_submission(request(7, None)).await.unwrap();

        assert_eq!(engine.inner.submissions.len(), 3);
        assert!(matches!(
            engine.get_transaction_submission_status(included).await,
            Err(UtilitiesError::UnknownSubmission(_))
        ));
        assert!(matches!(
            engine.get_transaction_submission_status(failed).await,
            Err(UtilitiesError::UnknownSubmission(_))
        ));
        assert!(engine.get_transaction_submission_status(pending).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_submission() {
        let engine = engine(
            Arc::new(FakeNode::new(1, 0)),
            Arc::new(ManualJobExecutor::default()),
        );
        assert!(matches!(
            engine.get_transaction_submission_status(Uuid::new_v4()).await,
            Err(UtilitiesError::UnknownSubmission(_))
        ));
    }
}
