//! Nonce management for the node's signing key
//!
//! Handles:
//! - Serialised nonce allocation across concurrent submissions
//! - Stable nonce assignment per transfer, so a retried transfer reuses its nonce
//! - Reuse of nonces that were reserved but never broadcast
//!
//! Once a nonce has been handed out the allocator never moves below it again.
//! A nonce returned through [`NonceManager::release`] is either given back to
//! the top of the range or kept as a gap that the next single allocation fills.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct NonceState {
    /// Next nonce above every nonce handed out, `None` until the first allocation
    next: Option<u64>,
    /// Internal transfer id -> assigned nonce
    assigned: HashMap<u64, u64>,
    /// Nonces of non-transfer submissions not yet known to be mined
    reserved: BTreeSet<u64>,
    /// Released nonces below `next`
    gaps: BTreeSet<u64>,
}

impl NonceState {
    /// Forget everything the chain has already consumed
    fn prune(&mut self, transaction_count: u64) {
        self.assigned.retain(|_, nonce| *nonce >= transaction_count);
        self.reserved = self.reserved.split_off(&transaction_count);
        self.gaps = self.gaps.split_off(&transaction_count);
    }

    /// Allocate `count` consecutive nonces above everything handed out
    fn allocate_range(&mut self, transaction_count: u64, count: u64) -> u64 {
        self.prune(transaction_count);
        let first = match self.next {
            Some(next) => next.max(transaction_count),
            None => transaction_count,
        };
        self.next = Some(first + count.max(1));
        debug!(first, count, "Allocated nonces");
        first
    }

    /// Allocate one nonce, filling the lowest gap first
    fn allocate_one(&mut self, transaction_count: u64) -> u64 {
        self.prune(transaction_count);
        if let Some(nonce) = self.gaps.pop_first() {
            debug!(nonce, "Allocated released nonce");
            return nonce;
        }
        self.allocate_range(transaction_count, 1)
    }
}

/// Nonce allocator of one chain's signing key
#[derive(Debug, Default)]
pub struct NonceManager {
    state: Mutex<NonceState>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next nonce given the account's current transaction count
    pub async fn next_nonce(&self, transaction_count: u64) -> u64 {
        let mut state = self.state.lock().await;
        let nonce = state.allocate_one(transaction_count);
        state.reserved.insert(nonce);
        nonce
    }

    /// Allocate `count` consecutive nonces, returning the first
    pub async fn reserve(&self, transaction_count: u64, count: u64) -> u64 {
        let mut state = self.state.lock().await;
        let first = state.allocate_range(transaction_count, count);
        state.reserved.extend(first..first + count.max(1));
        first
    }

    /// Nonce of a transfer, allocated on first request and stable afterwards
    pub async fn nonce_for_transfer(&self, internal_transfer_id: u64, transaction_count: u64) -> u64 {
        let mut state = self.state.lock().await;

        if let Some(&nonce) = state.assigned.get(&internal_transfer_id) {
            if nonce >= transaction_count {
                return nonce;
            }
            warn!(internal_transfer_id, nonce, transaction_count, "Assigned nonce already consumed");
        }

        let nonce = state.allocate_one(transaction_count);
        state.assigned.insert(internal_transfer_id, nonce);
        nonce
    }

    /// Forget a transfer's nonce. The transfer gets a fresh nonce on its next
    /// attempt; nonces held by other submissions are never handed out again.
    pub async fn reset_transfer(&self, internal_transfer_id: u64) {
        let mut state = self.state.lock().await;
        let previous = state.assigned.remove(&internal_transfer_id);
        debug!(internal_transfer_id, ?previous, "Reset transfer nonce");
    }

    /// Give back reserved nonces that were never broadcast
    pub async fn release(&self, nonces: Range<u64>) {
        let mut state = self.state.lock().await;
        let Some(next) = state.next else {
            return;
        };

        for nonce in nonces.filter(|nonce| *nonce < next) {
            state.reserved.remove(&nonce);
            state.gaps.insert(nonce);
        }

        // Gaps at the top shrink the allocated range
        while let Some(&last) = state.gaps.last() {
            if state.next != Some(last + 1) {
                break;
            }
            state.gaps.pop_last();
            state.next = Some(last);
        }

        debug!(next = ?state.next, gaps = state.gaps.len(), "Released nonces");
    }

    /// Number of nonces currently tracked
    #[cfg(test)]
    async fn tracked(&self) -> usize {
        let state = self.state.lock().await;
        state.assigned.len() + state.reserved.len() + state.gaps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_nonces_strictly_increase() {
        let manager = NonceManager::new();
        let first = manager.next_nonce(5).await;
        let second = manager.next_nonce(5).await;
        let third = manager.next_nonce(5).await;

        assert_eq!(first, 5);
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_chain_ahead_of_local_state() {
        let manager = NonceManager::new();
        manager.next_nonce(5).await;
        assert_eq!(manager.next_nonce(9).await, 9);
    }

    #[tokio::test]
    async fn test_transfer_nonce_is_stable() {
        let manager = NonceManager::new();
        let first = manager.nonce_for_transfer(42, 3).await;
        let other = manager.nonce_for_transfer(43, 3).await;
        let again = manager.nonce_for_transfer(42, 3).await;

        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_reset_never_reuses_in_flight_nonce() {
        let manager = NonceManager::new();
        let other = manager.nonce_for_transfer(2, 5).await;
        let first = manager.nonce_for_transfer(1, 5).await;

        manager.reset_transfer(1).await;
        let retried = manager.nonce_for_transfer(1, 5).await;

        assert_eq!((other, first), (5, 6));
        assert_ne!(retried, other);
        assert_ne!(retried, first);
        assert_eq!(retried, 7);
    }

    #[tokio::test]
    async fn test_reset_after_chain_moved_on() {
        let manager = NonceManager::new();
        manager.nonce_for_transfer(1, 3).await;
        manager.reset_transfer(1).await;

        assert_eq!(manager.nonce_for_transfer(1, 9).await, 9);
    }

    #[tokio::test]
    async fn test_reserve_consecutive_nonces() {
        let manager = NonceManager::new();
        let first = manager.reserve(7, 3).await;
        assert_eq!(first, 7);
        assert_eq!(manager.next_nonce(7).await, 10);
    }

    #[tokio::test]
    async fn test_released_top_nonce_is_reused() {
        let manager = NonceManager::new();
        let first = manager.reserve(5, 2).await;

        // The first nonce is mined, the second is never broadcast
        manager.release(first + 1..first + 2).await;

        assert_eq!(manager.next_nonce(6).await, 6);
    }

    #[tokio::test]
    async fn test_released_nonce_below_in_flight_fills_gap() {
        let manager = NonceManager::new();
        let first = manager.reserve(5, 2).await;
        let transfer = manager.nonce_for_transfer(1, 5).await;
        assert_eq!(transfer, 7);

        manager.release(first + 1..first + 2).await;

        assert_eq!(manager.nonce_for_transfer(2, 6).await, 6);
        assert_eq!(manager.next_nonce(6).await, 8);
    }

    #[tokio::test]
    async fn test_release_of_unallocated_nonces_is_ignored() {
        let manager = NonceManager::new();
        manager.release(0..3).await;
        assert_eq!(manager.next_nonce(4).await, 4);
    }

    #[tokio::test]
    async fn test_mined_nonces_are_pruned() {
        let manager = NonceManager::new();
        for transfer in 0..10 {
            manager.nonce_for_transfer(transfer, 0).await;
        }
        manager.reserve(0, 2).await;
        assert_eq!(manager.tracked().await, 12);

        manager.next_nonce(12).await;
        assert_eq!(manager.tracked().await, 1);
    }
}
