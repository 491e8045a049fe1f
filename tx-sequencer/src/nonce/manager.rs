use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{SequencerError, SequencerResult};
use crate::metrics::SequencerMetrics;
use crate::poll::with_timeout;
use crate::provider::ChainRpc;

use super::state::AccountNonceState;

type AccountSlot = Arc<Mutex<Option<AccountNonceState>>>;

/// Hands out gapless nonces per account.
///
/// State for an account is derived lazily from the node's pending nonce and
/// advanced locally afterwards. Allocations for one account are serialized by
/// that account's lock, which is held across the chain query. Accounts never
/// block each other.
pub struct NonceManager {
    provider: Arc<dyn ChainRpc>,
    accounts: Mutex<HashMap<Address, AccountSlot>>,
    metrics: SequencerMetrics,
    rpc_timeout: Duration,
}

impl NonceManager {
    pub fn new(
        provider: Arc<dyn ChainRpc>,
        metrics: SequencerMetrics,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            accounts: Mutex::new(HashMap::new()),
            metrics,
            rpc_timeout,
        }
    }

    pub async fn allocate_nonce(&self, address: &Address) -> SequencerResult<U256> {
        self.reserve(address, 1).await
    }

    /// Allocate `count` contiguous nonces, in ascending order.
    ///
    /// Queries the chain at most once, and only when nothing is cached for
    /// `address`.
    pub async fn allocate_batch(
        &self,
        address: &Address,
        count: usize,
    ) -> SequencerResult<Vec<U256>> {
        if count == 0 {
            return Err(SequencerError::InvalidBatchSize);
        }
        let first = self.reserve(address, count).await?;
        Ok((0..count)
            .map(|offset| first.saturating_add(U256::from(offset)))
            .collect())
    }

    /// Forget what is cached for `address`. The next allocation asks the chain.
    pub async fn reset_from_chain(&self, address: &Address) {
        let slot = self.slot(address).await;
        let previous = slot.lock().await.take();
        self.metrics.increment_nonce_resets(address);
        warn!(
            ?address,
            next_nonce = previous.map(|s| s.next_nonce.to_string()),
            in_flight = previous.map(|s| s.in_flight().to_string()),
            "Reset nonce state, next allocation re-derives it from chain"
        );
    }

    /// Next nonce that would be allocated, if the account is cached
    pub async fn next_nonce(&self, address: &Address) -> Option<U256> {
        let slot = self.slot(address).await;
        let state = *slot.lock().await;
        state.map(|s| s.next_nonce)
    }

    async fn reserve(&self, address: &Address, count: usize) -> SequencerResult<U256> {
        let slot = self.slot(address).await;
        let mut guard = slot.lock().await;

        let mut state = match *guard {
            Some(state) => state,
            None => {
                let pending =
                    with_timeout(self.rpc_timeout, self.provider.get_pending_nonce(address))
                        .await?;
                info!(
                    ?address,
                    pending_nonce = pending.to_string(),
                    "Fetched pending nonce from chain"
                );
                AccountNonceState::from_chain(pending)
            }
        };

        let first = state.take(count);
        *guard = Some(state);
        self.metrics.set_next_nonce(address, &state.next_nonce);

        info!(
            ?address,
            first_nonce = first.to_string(),
            count,
            next_nonce = state.next_nonce.to_string(),
            "Allocated nonces"
        );
        Ok(first)
    }

    async fn slot(&self, address: &Address) -> AccountSlot {
        let mut accounts = self.accounts.lock().await;
        accounts.entry(*address).or_default().clone()
    }
}
