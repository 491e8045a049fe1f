use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, TransactionRequest, U256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SequencerError, SequencerResult};
use crate::reader::ChainReader;
use crate::transaction::{FeeSpec, TransferRequest};

const COUNTER_ABI: &[&str] = &[
    "function increment()",
    "function getCount() view returns (uint256)",
];

/// Client for a deployed `Counter` contract
#[derive(Debug, Clone)]
pub struct CounterContract {
    address: Address,
    contract: BaseContract,
}

impl CounterContract {
    pub fn new(address: Address) -> SequencerResult<Self> {
        let abi = parse_abi(COUNTER_ABI).map_err(|err| SequencerError::Abi(err.to_string()))?;
        Ok(Self {
            address,
            contract: BaseContract::from(abi),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Request calling `increment()`, to be sent through the sequencer
    pub fn increment_request(
        &self,
        gas_limit: U256,
        fee: FeeSpec,
    ) -> SequencerResult<TransferRequest> {
        let data = self
            .contract
            .encode("increment", ())
            .map_err(|err| SequencerError::Abi(err.to_string()))?;
        Ok(TransferRequest::new(self.address, U256::zero(), gas_limit, fee).with_data(data))
    }

    /// Read `getCount()`, at `block` when given and at the latest block otherwise.
    pub async fn get_count(
        &self,
        reader: &ChainReader,
        block: Option<u64>,
        cancel: &CancellationToken,
    ) -> SequencerResult<U256> {
        let data = self
            .contract
            .encode("getCount", ())
            .map_err(|err| SequencerError::Abi(err.to_string()))?;
        let tx: TypedTransaction = TransactionRequest::new().to(self.address).data(data).into();
        let block = block.map(|number| BlockNumber::Number(number.into()));

        let output = reader.call(&tx, block, cancel).await?;
        let count: U256 = self
            .contract
            .decode_output("getCount", output)
            .map_err(|err| SequencerError::Abi(err.to_string()))?;
        debug!(contract = ?self.address, ?block, count = %count, "Read counter");
        Ok(count)
    }
}
