use std::time::Duration;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Block, BlockNumber, Bytes, TransactionReceipt, H256, U256};

pub use http::HttpChainRpc;

mod http;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Transport(_) | ChainError::Timeout(_))
    }
}

/// The subset of the node's JSON-RPC surface the sequencer relies on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Next nonce for `address` as seen by the node, including transactions
    /// still sitting in its pool
    async fn get_pending_nonce(&self, address: &Address) -> ChainResult<U256>;

    /// Balance of `address` at the latest block
    async fn get_balance(&self, address: &Address) -> ChainResult<U256>;

    async fn get_chain_id(&self) -> ChainResult<u64>;

    /// Gas price suggested by the node
    async fn get_gas_price(&self) -> ChainResult<U256>;

    /// Broadcast an RLP-encoded signed transaction, returning its hash
    async fn submit_raw_transaction(&self, payload: Bytes) -> ChainResult<H256>;

    /// Receipt of a transaction, `None` while it is not included
    async fn get_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

    async fn get_block(&self, block: BlockNumber) -> ChainResult<Option<Block<H256>>>;

    /// Read-only call, optionally pinned to a block
    async fn call(&self, tx: &TypedTransaction, block: Option<BlockNumber>) -> ChainResult<Bytes>;
}
