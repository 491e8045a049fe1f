use std::time::Duration;

use ethers::types::{H256, U256};

use crate::provider::ChainError;
use crate::signer::SignerError;
use crate::transaction::{TransactionStatus, TransactionUuid};

pub type SequencerResult<T> = Result<T, SequencerError>;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// The node could not be queried. Transient, the caller may retry.
    #[error("Chain query error: {0}")]
    ChainQuery(#[from] ChainError),
    /// The signer refused the key or the payload.
    #[error("Signing error: {0}")]
    Signing(#[from] SignerError),
    /// The node refused to admit the transaction into its pool.
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
    /// Included in a block, but execution failed. Nonce and gas are consumed.
    #[error("Transaction {hash:?} reverted in block {block_number} (gas used {gas_used})")]
    ExecutionReverted {
        hash: H256,
        block_number: u64,
        gas_used: U256,
    },
    /// No receipt was observed before the deadline. The transaction may still land.
    #[error("No receipt for transaction {hash:?} after {waited:?}")]
    ConfirmationTimeout { hash: H256, waited: Duration },
    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),
    #[error("Batch size must be positive")]
    InvalidBatchSize,
    #[error("Transaction {uuid} is {actual:?}, expected {expected:?}")]
    InvalidStatus {
        uuid: TransactionUuid,
        expected: TransactionStatus,
        actual: TransactionStatus,
    },
    #[error("Insufficient funds: required {required} wei, available {available} wei")]
    InsufficientFunds { required: U256, available: U256 },
    #[error("Chain id mismatch: configured {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    /// Call data could not be encoded, or a call's output decoded.
    #[error("Contract ABI error: {0}")]
    Abi(String),
}

impl SequencerError {
    /// Submission failures distinguish node rejections from transport problems.
    pub(crate) fn from_submission(err: ChainError) -> Self {
        match err {
            ChainError::Rpc { code, message } => {
                SequencerError::SubmissionRejected(format!("{message} (code {code})"))
            }
            other => SequencerError::ChainQuery(other),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SequencerError::ChainQuery(err) => err.is_retryable(),
            SequencerError::ConfirmationTimeout { .. } => true,
            SequencerError::Signing(_)
            | SequencerError::SubmissionRejected(_)
            | SequencerError::ExecutionReverted { .. }
            | SequencerError::Cancelled(_)
            | SequencerError::InvalidBatchSize
            | SequencerError::InvalidStatus { .. }
            | SequencerError::InsufficientFunds { .. }
            | SequencerError::ChainIdMismatch { .. }
            | SequencerError::Abi(_) => false,
        }
    }

    pub fn to_metrics_label(&self) -> String {
        match self {
            SequencerError::ChainQuery(_) => "ChainQuery",
            SequencerError::Signing(_) => "Signing",
            SequencerError::SubmissionRejected(_) => "SubmissionRejected",
            SequencerError::ExecutionReverted { .. } => "ExecutionReverted",
            SequencerError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            SequencerError::Cancelled(_) => "Cancelled",
            SequencerError::InvalidBatchSize => "InvalidBatchSize",
            SequencerError::InvalidStatus { .. } => "InvalidStatus",
            SequencerError::InsufficientFunds { .. } => "InsufficientFunds",
            SequencerError::ChainIdMismatch { .. } => "ChainIdMismatch",
            SequencerError::Abi(_) => "Abi",
        }
        .to_owned()
    }
}
