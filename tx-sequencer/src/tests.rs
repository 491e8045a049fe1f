use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Block, BlockNumber, Bytes, TransactionReceipt, H256, U256};

use crate::provider::{ChainResult, ChainRpc};



mockall::mock! {
    pub ChainProvider {}

    #[async_trait]
    impl ChainRpc for ChainProvider {
        async fn get_pending_nonce(&self, address: &Address) -> ChainResult<U256>;

        async fn get_balance(&self, address: &Address) -> ChainResult<U256>;

        async fn get_chain_id(&self) -> ChainResult<u64>;

        async fn get_gas_price(&self) -> ChainResult<U256>;

        /// Broadcast an RLP-encoded signed transaction
        async fn submit_raw_transaction(&self, payload: Bytes) -> ChainResult<H256>;

        async fn get_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

        async fn get_block(&self, block: BlockNumber) -> ChainResult<Option<Block<H256>>>;

        async fn call(&self, tx: &TypedTransaction, block: Option<BlockNumber>) -> ChainResult<Bytes>;
    }
}
