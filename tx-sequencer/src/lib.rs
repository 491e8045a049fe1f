#![deny(clippy::unwrap_used, clippy::panic)]

//! Nonce sequencing and confirmation tracking for transactions sent from a
//! single EVM account.
//!
//! The [`TransactionSequencer`] allocates gapless nonces per account, signs
//! transactions bound to a chain id, submits them through a [`ChainRpc`]
//! client and polls for their receipts. Cached nonce state is invalidated on
//! every submission failure so the next allocation re-derives it from the
//! chain.

pub use confirmation::Confirmation;
pub use contract::CounterContract;
pub use error::{SequencerError, SequencerResult};
pub use metrics::SequencerMetrics;
pub use nonce::NonceManager;
pub use poll::{deadline_token, PollConfig, PollOutcome};
pub use provider::{ChainError, ChainResult, ChainRpc, HttpChainRpc};
pub use reader::ChainReader;
pub use sequencer::{BatchSubmission, TransactionSequencer};
pub use settings::{ChainConf, SequencerSettings};
pub use signer::{LocalSigner, SignedPayload, SignerError, TxSigner};
pub use transaction::{
    FeeSpec, PendingTransaction, TransactionFactory, TransactionStatus, TransactionUuid,
    TransferRequest,
};

pub mod units;

mod confirmation;
mod contract;
mod error;
mod metrics;
mod nonce;
mod poll;
mod provider;
mod reader;
mod sequencer;
mod settings;
mod signer;
#[cfg(test)]
mod tests;
mod transaction;
