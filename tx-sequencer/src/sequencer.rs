use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::confirmation::{await_receipt, Confirmation};
use crate::error::{SequencerError, SequencerResult};
use crate::metrics::{SequencerMetrics, LABEL_SUCCESS};
use crate::nonce::NonceManager;
use crate::poll::{cancellable, with_timeout, PollConfig};
use crate::provider::ChainRpc;
use crate::reader::ChainReader;
use crate::settings::{ChainConf, SequencerSettings};
use crate::signer::TxSigner;
use crate::transaction::{
    PendingTransaction, TransactionFactory, TransactionStatus, TransferRequest,
};

/// Outcome of [`TransactionSequencer::send_batch`].
///
/// When `error` is set, the transaction at index `submitted` failed to submit
/// and it and everything after it are still `Signed`.
#[derive(Debug)]
pub struct BatchSubmission {
    pub transactions: Vec<PendingTransaction>,
    pub submitted: usize,
    pub error: Option<SequencerError>,
}

impl BatchSubmission {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Sends transactions from a single signer and tracks them until their
/// receipts.
///
/// [`send`](Self::send) and [`send_batch`](Self::send_batch) hold the
/// signer's submission lock from nonce allocation until the node answered, so
/// nonces reach the node in the order they were handed out. Callers driving
/// the lower level steps themselves have to keep that order on their own.
pub struct TransactionSequencer {
    reader: ChainReader,
    signer: Arc<dyn TxSigner>,
    nonce_manager: NonceManager,
    submission_lock: Mutex<()>,
    settings: SequencerSettings,
    metrics: SequencerMetrics,
}

impl TransactionSequencer {
    pub fn new(
        conf: &ChainConf,
        settings: SequencerSettings,
        provider: Arc<dyn ChainRpc>,
        signer: Arc<dyn TxSigner>,
        metrics: SequencerMetrics,
    ) -> Self {
        let nonce_manager =
            NonceManager::new(provider.clone(), metrics.clone(), settings.rpc_timeout);
        Self {
            reader: ChainReader::new(conf, provider, settings.rpc_timeout),
            signer,
            nonce_manager,
            submission_lock: Mutex::new(()),
            settings,
            metrics,
        }
    }

    /// Address transactions are sent from
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &SequencerMetrics {
        &self.metrics
    }

    pub fn reader(&self) -> &ChainReader {
        &self.reader
    }

    /// See [`ChainReader::chain_id`]
    pub async fn chain_id(&self, cancel: &CancellationToken) -> SequencerResult<u64> {
        self.reader.chain_id(cancel).await
    }

    pub async fn allocate_nonce(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> SequencerResult<U256> {
        cancellable(
            cancel,
            "nonce allocation",
            self.nonce_manager.allocate_nonce(address),
        )
        .await
    }

    pub async fn allocate_batch(
        &self,
        address: &Address,
        count: usize,
        cancel: &CancellationToken,
    ) -> SequencerResult<Vec<U256>> {
        cancellable(
            cancel,
            "nonce allocation",
            self.nonce_manager.allocate_batch(address, count),
        )
        .await
    }

    pub async fn reset_from_chain(&self, address: &Address) {
        self.nonce_manager.reset_from_chain(address).await;
    }

    /// Next nonce that would be allocated for `address`, if it is cached
    pub async fn next_nonce(&self, address: &Address) -> Option<U256> {
        self.nonce_manager.next_nonce(address).await
    }

    /// Build and sign `request` with an already allocated `nonce`.
    pub async fn build_and_sign(
        &self,
        nonce: U256,
        request: TransferRequest,
        cancel: &CancellationToken,
    ) -> SequencerResult<PendingTransaction> {
        let chain_id = self.chain_id(cancel).await?;
        TransactionFactory::build_and_sign(nonce, request, chain_id, self.signer.as_ref()).await
    }

    /// Broadcast a signed transaction.
    ///
    /// Any failure, including a timeout or cancellation of the broadcast
    /// itself, discards the sender's cached nonce state.
    #[instrument(skip_all, fields(tx_uuid = ?tx.uuid, nonce = %tx.nonce))]
    pub async fn submit(
        &self,
        tx: &mut PendingTransaction,
        cancel: &CancellationToken,
    ) -> SequencerResult<H256> {
        tx.ensure_status(TransactionStatus::Signed)?;
        let payload = tx
            .signed_payload
            .clone()
            .ok_or(SequencerError::InvalidStatus {
                uuid: tx.uuid,
                expected: TransactionStatus::Signed,
                actual: TransactionStatus::Built,
            })?;

        let provider = self.reader.provider().clone();
        let rpc_timeout = self.settings.rpc_timeout;
        let result = cancellable(cancel, "submission", async move {
            with_timeout(rpc_timeout, provider.submit_raw_transaction(payload))
                .await
                .map_err(SequencerError::from_submission)
        })
        .await;

        let node_hash = match result {
            Ok(hash) => hash,
            Err(err) => {
                warn!(?err, from = ?tx.from, "Submission failed, resetting nonce state");
                self.metrics
                    .increment_submissions(&tx.from, &err.to_metrics_label());
                self.nonce_manager.reset_from_chain(&tx.from).await;
                return Err(err);
            }
        };

        if tx.hash != Some(node_hash) {
            warn!(
                local_hash = ?tx.hash,
                ?node_hash,
                "Node returned a different transaction hash, keeping the node's"
            );
        }
        tx.mark_submitted(node_hash);
        self.metrics.increment_submissions(&tx.from, LABEL_SUCCESS);
        info!(hash = ?node_hash, "Submitted transaction");
        Ok(node_hash)
    }

    /// Wait for `tx` to be included, using the configured poll interval and
    /// confirmation timeout.
    pub async fn await_confirmation(
        &self,
        tx: &mut PendingTransaction,
        cancel: &CancellationToken,
    ) -> SequencerResult<Confirmation> {
        self.await_confirmation_with(tx, self.settings.poll_config(), cancel)
            .await
    }

    /// Wait for `tx` to be included.
    ///
    /// A successful receipt moves the record to `Confirmed`, a reverted one
    /// to `Failed`. Timeouts and cancellation leave it `Submitted`.
    #[instrument(skip_all, fields(tx_uuid = ?tx.uuid, hash = ?tx.hash))]
    pub async fn await_confirmation_with(
        &self,
        tx: &mut PendingTransaction,
        poll: PollConfig,
        cancel: &CancellationToken,
    ) -> SequencerResult<Confirmation> {
        tx.ensure_status(TransactionStatus::Submitted)?;
        let hash = tx.hash.ok_or(SequencerError::InvalidStatus {
            uuid: tx.uuid,
            expected: TransactionStatus::Submitted,
            actual: TransactionStatus::Signed,
        })?;

        let confirmation = match await_receipt(
            self.reader.provider().clone(),
            hash,
            poll,
            self.settings.rpc_timeout,
            cancel,
        )
        .await
        {
            Ok(confirmation) => confirmation,
            Err(err) => {
                self.metrics
                    .increment_confirmations(&tx.from, &err.to_metrics_label());
                return Err(err);
            }
        };

        if !confirmation.succeeded() {
            tx.mark_failed(confirmation);
            let err = SequencerError::ExecutionReverted {
                hash,
                block_number: confirmation.block_number,
                gas_used: confirmation.gas_used,
            };
            warn!(block_number = confirmation.block_number, "Transaction reverted");
            self.metrics
                .increment_confirmations(&tx.from, &err.to_metrics_label());
            return Err(err);
        }

        tx.mark_confirmed(confirmation);
        self.metrics.increment_confirmations(&tx.from, LABEL_SUCCESS);
        Ok(confirmation)
    }

    /// Check that the signer can afford `request` at its maximum fee.
    /// Returns the current balance.
    pub async fn preflight(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> SequencerResult<U256> {
        let address = self.address();
        let available = self.reader.balance(&address, cancel).await?;
        let required = request.max_cost();
        if required > available {
            return Err(SequencerError::InsufficientFunds {
                required,
                available,
            });
        }
        Ok(available)
    }

    /// Allocate a nonce, sign and submit a single transaction.
    pub async fn send(
        &self,
        request: TransferRequest,
        cancel: &CancellationToken,
    ) -> SequencerResult<PendingTransaction> {
        let address = self.address();
        let chain_id = self.chain_id(cancel).await?;
        let _ordered = self.lock_submissions(cancel).await?;
        let nonce = self.allocate_nonce(&address, cancel).await?;
        let mut tx = self.sign_allocated(nonce, request, chain_id).await?;
        self.submit(&mut tx, cancel).await?;
        Ok(tx)
    }

    /// Sign `requests` with one contiguous nonce range and submit them in
    /// nonce order, stopping at the first submission failure.
    ///
    /// Errors before the first submission are returned directly. Submission
    /// failures are reported in the returned [`BatchSubmission`].
    #[instrument(skip_all, fields(count = requests.len()))]
    pub async fn send_batch(
        &self,
        requests: Vec<TransferRequest>,
        cancel: &CancellationToken,
    ) -> SequencerResult<BatchSubmission> {
        let address = self.address();
        if requests.is_empty() {
            return Err(SequencerError::InvalidBatchSize);
        }
        let chain_id = self.chain_id(cancel).await?;
        let _ordered = self.lock_submissions(cancel).await?;
        let nonces = self.allocate_batch(&address, requests.len(), cancel).await?;

        let mut transactions = Vec::with_capacity(requests.len());
        for (nonce, request) in nonces.into_iter().zip(requests) {
            transactions.push(self.sign_allocated(nonce, request, chain_id).await?);
        }

        let total = transactions.len();
        let mut submitted = 0;
        let mut error = None;
        for tx in transactions.iter_mut() {
            if let Err(err) = self.submit(tx, cancel).await {
                error = Some(err);
                break;
            }
            submitted += 1;
        }
        if let Some(err) = &error {
            warn!(
                ?err,
                submitted,
                unsubmitted = total - submitted,
                "Stopped batch at first submission failure"
            );
        }

        Ok(BatchSubmission {
            transactions,
            submitted,
            error,
        })
    }

    /// Await every submitted transaction in nonce order.
    ///
    /// Transactions which were never submitted yield
    /// [`SequencerError::InvalidStatus`]. Records that already settled yield
    /// their recorded outcome without asking the node again.
    pub async fn await_batch(
        &self,
        transactions: &mut [PendingTransaction],
        cancel: &CancellationToken,
    ) -> Vec<SequencerResult<Confirmation>> {
        transactions.sort_by_key(|tx| tx.nonce);
        let mut outcomes = Vec::with_capacity(transactions.len());
        for tx in transactions.iter_mut() {
            let outcome = match tx.confirmation {
                Some(confirmation) if tx.status.is_terminal() => settled_outcome(confirmation),
                _ => self.await_confirmation(tx, cancel).await,
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn lock_submissions(
        &self,
        cancel: &CancellationToken,
    ) -> SequencerResult<MutexGuard<'_, ()>> {
        cancellable(cancel, "submission lock", async {
            Ok::<_, SequencerError>(self.submission_lock.lock().await)
        })
        .await
    }

    /// Sign with a nonce taken from the manager. A signing failure leaves a
    /// gap, so the cached state is dropped.
    async fn sign_allocated(
        &self,
        nonce: U256,
        request: TransferRequest,
        chain_id: u64,
    ) -> SequencerResult<PendingTransaction> {
        match TransactionFactory::build_and_sign(nonce, request, chain_id, self.signer.as_ref())
            .await
        {
            Ok(tx) => Ok(tx),
            Err(err) => {
                warn!(?err, nonce = %nonce, "Signing failed after nonce allocation");
                self.nonce_manager.reset_from_chain(&self.address()).await;
                Err(err)
            }
        }
    }
}

/// Outcome of a record whose receipt was already seen
fn settled_outcome(confirmation: Confirmation) -> SequencerResult<Confirmation> {
    if confirmation.succeeded() {
        return Ok(confirmation);
    }
    Err(SequencerError::ExecutionReverted {
        hash: confirmation.hash,
        block_number: confirmation.block_number,
        gas_used: confirmation.gas_used,
    })
}

#[cfg(test)]
mod tests;
