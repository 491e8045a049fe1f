use std::sync::Arc;
use std::time::Duration;

use ethers::types::{TransactionReceipt, H256, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SequencerError, SequencerResult};
use crate::poll::{poll_until_ready, with_timeout, PollConfig, PollOutcome};
use crate::provider::ChainRpc;

/// Summary of an included transaction's receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Confirmation {
    pub hash: H256,
    pub block_number: u64,
    pub gas_used: U256,
    /// 1 on success, 0 when execution reverted
    pub status: u64,
}

impl Confirmation {
    /// `None` while the receipt does not name its block yet.
    ///
    /// Nodes which predate the status field report no status at all, those
    /// receipts count as successful.
    fn from_receipt(receipt: &TransactionReceipt) -> Option<Self> {
        let block_number = receipt.block_number?.as_u64();
        let status = receipt.status.map(|s| s.as_u64()).unwrap_or(1);
        Some(Self {
            hash: receipt.transaction_hash,
            block_number,
            gas_used: receipt.gas_used.unwrap_or_default(),
            status,
        })
    }

    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Poll for the receipt of `hash` until it is included, `poll.timeout`
/// elapses or `cancel` fires.
///
/// A reverted receipt is still returned as `Ok`. Callers decide what a
/// revert means for their record.
pub(crate) async fn await_receipt(
    provider: Arc<dyn ChainRpc>,
    hash: H256,
    poll: PollConfig,
    rpc_timeout: Duration,
    cancel: &CancellationToken,
) -> SequencerResult<Confirmation> {
    let outcome = poll_until_ready(poll, cancel, "transaction receipt", || {
        let provider = provider.clone();
        async move {
            let receipt = with_timeout(rpc_timeout, provider.get_receipt(hash)).await?;
            let confirmation = receipt.as_ref().and_then(Confirmation::from_receipt);
            if receipt.is_some() && confirmation.is_none() {
                debug!(?hash, "receipt has no block number yet");
            }
            Ok(confirmation)
        }
    })
    .await;

    match outcome {
        PollOutcome::Ready(confirmation) => {
            info!(
                ?hash,
                block_number = confirmation.block_number,
                gas_used = confirmation.gas_used.to_string(),
                status = confirmation.status,
                "Observed transaction receipt"
            );
            Ok(confirmation)
        }
        PollOutcome::TimedOut(waited) => {
            warn!(?hash, ?waited, "Gave up waiting for transaction receipt");
            Err(SequencerError::ConfirmationTimeout { hash, waited })
        }
        PollOutcome::Cancelled => {
            warn!(?hash, "Cancelled while waiting for transaction receipt");
            Err(SequencerError::Cancelled(format!("receipt of {hash:?}")))
        }
    }
}
