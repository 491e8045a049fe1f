use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Block, BlockNumber, Bytes, H256, U256};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{SequencerError, SequencerResult};
use crate::poll::{cancellable, with_timeout};
use crate::provider::{ChainResult, ChainRpc};
use crate::settings::ChainConf;

/// Read-only access to the node. Every call is bounded by the RPC timeout
/// and by the caller's cancellation token.
pub struct ChainReader {
    provider: Arc<dyn ChainRpc>,
    rpc_timeout: Duration,
    expected_chain_id: Option<u64>,
    chain_id: OnceCell<u64>,
}

impl ChainReader {
    pub fn new(conf: &ChainConf, provider: Arc<dyn ChainRpc>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            rpc_timeout,
            expected_chain_id: conf.chain_id,
            chain_id: OnceCell::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ChainRpc> {
        &self.provider
    }

    /// Chain id reported by the node, resolved once.
    ///
    /// Fails with [`SequencerError::ChainIdMismatch`] on every call when the
    /// node disagrees with the configured chain id.
    pub async fn chain_id(&self, cancel: &CancellationToken) -> SequencerResult<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let actual = self
                    .query(cancel, "chain id", self.provider.get_chain_id())
                    .await?;
                if let Some(expected) = self.expected_chain_id {
                    if expected != actual {
                        return Err(SequencerError::ChainIdMismatch { expected, actual });
                    }
                }
                info!(chain_id = actual, "Resolved chain id");
                Ok::<_, SequencerError>(actual)
            })
            .await
            .copied()
    }

    pub async fn balance(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> SequencerResult<U256> {
        self.query(cancel, "balance", self.provider.get_balance(address))
            .await
    }

    pub async fn pending_nonce(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> SequencerResult<U256> {
        self.query(cancel, "pending nonce", self.provider.get_pending_nonce(address))
            .await
    }

    pub async fn block(
        &self,
        block: BlockNumber,
        cancel: &CancellationToken,
    ) -> SequencerResult<Option<Block<H256>>> {
        self.query(cancel, "block", self.provider.get_block(block))
            .await
    }

    pub async fn gas_price(&self, cancel: &CancellationToken) -> SequencerResult<U256> {
        self.query(cancel, "gas price", self.provider.get_gas_price())
            .await
    }

    pub async fn call(
        &self,
        tx: &TypedTransaction,
        block: Option<BlockNumber>,
        cancel: &CancellationToken,
    ) -> SequencerResult<Bytes> {
        self.query(cancel, "call", self.provider.call(tx, block))
            .await
    }

    async fn query<T, Fut>(
        &self,
        cancel: &CancellationToken,
        action: &str,
        fut: Fut,
    ) -> SequencerResult<T>
    where
        Fut: Future<Output = ChainResult<T>>,
    {
        let rpc_timeout = self.rpc_timeout;
        cancellable(cancel, action, async move {
            Ok(with_timeout(rpc_timeout, fut).await?)
        })
        .await
    }
}
