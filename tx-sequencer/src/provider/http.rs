use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Block, BlockNumber, Bytes, TransactionReceipt, H256, U256};
use tracing::debug;

use crate::settings::ChainConf;

use super::{ChainError, ChainResult, ChainRpc};

/// [`ChainRpc`] backed by an ethers HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpChainRpc {
    provider: Provider<Http>,
}

impl HttpChainRpc {
    pub fn new(conf: &ChainConf) -> Self {
        let provider = Provider::new(Http::new(conf.rpc_url.clone()));
        Self { provider }
    }
}

impl From<ProviderError> for ChainError {
    fn from(err: ProviderError) -> Self {
        if let Some(response) = err.as_error_response() {
            return ChainError::Rpc {
                code: response.code,
                message: response.message.clone(),
            };
        }
        ChainError::Transport(err.to_string())
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn get_pending_nonce(&self, address: &Address) -> ChainResult<U256> {
        let nonce = self
            .provider
            .get_transaction_count(*address, Some(BlockNumber::Pending.into()))
            .await?;
        debug!(?address, ?nonce, "fetched pending nonce");
        Ok(nonce)
    }

    async fn get_balance(&self, address: &Address) -> ChainResult<U256> {
        Ok(self.provider.get_balance(*address, None).await?)
    }

    async fn get_chain_id(&self) -> ChainResult<u64> {
        let chain_id = self.provider.get_chainid().await?;
        if chain_id > U256::from(u64::MAX) {
            return Err(ChainError::UnexpectedResponse(format!(
                "chain id {chain_id} does not fit in 64 bits"
            )));
        }
        Ok(chain_id.low_u64())
    }

    async fn get_gas_price(&self) -> ChainResult<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn submit_raw_transaction(&self, payload: Bytes) -> ChainResult<H256> {
        let pending = self.provider.send_raw_transaction(payload).await?;
        Ok(pending.tx_hash())
    }

    async fn get_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }

    async fn get_block(&self, block: BlockNumber) -> ChainResult<Option<Block<H256>>> {
        Ok(self.provider.get_block(block).await?)
    }

    async fn call(&self, tx: &TypedTransaction, block: Option<BlockNumber>) -> ChainResult<Bytes> {
        Ok(self.provider.call(tx, block.map(Into::into)).await?)
    }
}
