use ethers::types::{Address, U256};
use tracing::info;

use crate::error::SequencerResult;
use crate::signer::TxSigner;

use super::{PendingTransaction, TransferRequest};

/// Assembles transactions with an already allocated nonce.
pub struct TransactionFactory;

impl TransactionFactory {
    pub fn build(
        from: Address,
        nonce: U256,
        request: TransferRequest,
        chain_id: u64,
    ) -> PendingTransaction {
        PendingTransaction::new(from, nonce, chain_id, request)
    }

    /// Build a transaction from `request` and sign it for `chain_id`.
    ///
    /// The nonce is used as given, the factory never allocates one.
    pub async fn build_and_sign(
        nonce: U256,
        request: TransferRequest,
        chain_id: u64,
        signer: &dyn TxSigner,
    ) -> SequencerResult<PendingTransaction> {
        let mut tx = Self::build(signer.address(), nonce, request, chain_id);
        let payload = signer.sign(&tx.typed_tx(), chain_id).await?;
        tx.mark_signed(payload);

        info!(
            tx_uuid = ?tx.uuid,
            nonce = nonce.to_string(),
            chain_id,
            hash = ?tx.hash,
            "Built and signed transaction"
        );
        Ok(tx)
    }
}
