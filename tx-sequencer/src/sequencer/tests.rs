use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, BlockNumber, H256, U256};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::error::SequencerError;
use crate::poll::PollConfig;
use crate::provider::ChainError;
use crate::tests::test_utils::{
    dummy_signer, legacy_transfer, test_sequencer, FakeChain, SEPOLIA_CHAIN_ID,
};
use crate::tests::MockChainProvider;
use crate::transaction::{FeeSpec, TransactionFactory, TransactionStatus, TransferRequest};
use crate::TxSigner;

fn sender() -> Address {
    dummy_signer().address()
}

fn nonce_too_low() -> ChainError {
    ChainError::Rpc {
        code: -32000,
        message: "nonce too low".to_owned(),
    }
}

/// Mock node that accepts every submission and never produces a receipt
fn silent_node() -> MockChainProvider {
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_chain_id()
        .returning(|| Ok(SEPOLIA_CHAIN_ID));
    provider
        .expect_get_pending_nonce()
        .returning(|_| Ok(U256::zero()));
    provider
        .expect_submit_raw_transaction()
        .returning(|payload| Ok(H256::from(ethers::utils::keccak256(&payload))));
    provider.expect_get_receipt().returning(|_| Ok(None));
    provider
}

#[tokio::test]
async fn test_submit_requires_signed_record() {
    let sequencer = test_sequencer(Arc::new(FakeChain::new(SEPOLIA_CHAIN_ID)));
    let mut tx = TransactionFactory::build(sender(), U256::zero(), legacy_transfer(), SEPOLIA_CHAIN_ID);

    let err = sequencer
        .submit(&mut tx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SequencerError::InvalidStatus {
            expected: TransactionStatus::Signed,
            actual: TransactionStatus::Built,
            ..
        }
    ));
    assert_eq!(tx.status, TransactionStatus::Built);
}

#[tokio::test]
async fn test_rejection_resets_nonce_state() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID).with_pending_nonce(sender(), 5);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();

    chain.reject_next(nonce_too_low());
    let err = sequencer.send(legacy_transfer(), &cancel).await.unwrap_err();

    assert!(matches!(err, SequencerError::SubmissionRejected(ref msg) if msg.contains("nonce too low")));
    assert_eq!(sequencer.next_nonce(&sender()).await, None);
    assert_eq!(chain.nonce_queries(), 1);

    let tx = sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    assert_eq!(tx.nonce, U256::from(5u64));
    assert_eq!(tx.status, TransactionStatus::Submitted);
    assert_eq!(chain.nonce_queries(), 2);
}

#[tokio::test]
async fn test_transport_failure_on_submit_also_resets() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();

    chain.reject_next(ChainError::Transport("connection reset".to_owned()));
    let err = sequencer.send(legacy_transfer(), &cancel).await.unwrap_err();

    assert!(matches!(err, SequencerError::ChainQuery(ChainError::Transport(_))));
    assert!(err.is_retryable());
    assert_eq!(sequencer.next_nonce(&sender()).await, None);
}

#[tokio::test]
async fn test_allocations_resume_from_chain_after_external_use() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID).with_pending_nonce(sender(), 2);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();

    sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    // another wallet sent two transactions from the same key
    chain.bump_pending_nonce(sender(), 2);

    let err = sequencer.send(legacy_transfer(), &cancel).await.unwrap_err();
    assert!(matches!(err, SequencerError::SubmissionRejected(_)));

    let tx = sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    assert_eq!(tx.nonce, U256::from(5u64));
}

#[tokio::test]
#[traced_test]
async fn test_node_hash_is_kept_on_mismatch() {
    let node_hash = H256::repeat_byte(0x42);
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_chain_id()
        .returning(|| Ok(SEPOLIA_CHAIN_ID));
    provider
        .expect_submit_raw_transaction()
        .times(1)
        .returning(move |_| Ok(node_hash));
    let sequencer = test_sequencer(Arc::new(provider));
    let cancel = CancellationToken::new();

    let mut tx = sequencer
        .build_and_sign(U256::zero(), legacy_transfer(), &cancel)
        .await
        .unwrap();
    let local_hash = tx.hash;

    let hash = sequencer.submit(&mut tx, &cancel).await.unwrap();

    assert_ne!(local_hash, Some(node_hash));
    assert_eq!(hash, node_hash);
    assert_eq!(tx.hash, Some(node_hash));
    assert!(logs_contain("Node returned a different transaction hash"));
}

#[tokio::test]
async fn test_revert_marks_record_failed() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();

    chain.revert_next();
    let mut tx = sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    let err = sequencer
        .await_confirmation(&mut tx, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::ExecutionReverted { .. }));
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.confirmation.map(|c| c.status), Some(0));
    // the reverted transaction still consumed its nonce
    let next = sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    assert_eq!(next.nonce, U256::one());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_leaves_record_submitted() {
    let sequencer = test_sequencer(Arc::new(silent_node()));
    let cancel = CancellationToken::new();

    let mut tx = sequencer.send(legacy_transfer(), &cancel).await.unwrap();
    let err = sequencer
        .await_confirmation(&mut tx, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::ConfirmationTimeout { .. }));
    assert_eq!(tx.status, TransactionStatus::Submitted);
    assert!(tx.confirmation.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_leaves_record_submitted() {
    let sequencer = test_sequencer(Arc::new(silent_node()));
    let cancel = CancellationToken::new();
    let mut tx = sequencer.send(legacy_transfer(), &cancel).await.unwrap();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });
    let poll = PollConfig::new(Duration::from_secs(1), Duration::from_secs(60));
    let err = sequencer
        .await_confirmation_with(&mut tx, poll, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::Cancelled(_)));
    assert_eq!(tx.status, TransactionStatus::Submitted);
}

#[tokio::test]
async fn test_awaiting_unsubmitted_record_is_invalid() {
    let sequencer = test_sequencer(Arc::new(FakeChain::new(SEPOLIA_CHAIN_ID)));
    let cancel = CancellationToken::new();
    let mut tx = sequencer
        .build_and_sign(U256::zero(), legacy_transfer(), &cancel)
        .await
        .unwrap();

    let err = sequencer
        .await_confirmation(&mut tx, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SequencerError::InvalidStatus {
            expected: TransactionStatus::Submitted,
            actual: TransactionStatus::Signed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_chain_id_mismatch_blocks_signing() {
    let chain = FakeChain::new(1);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();

    let err = sequencer
        .build_and_sign(U256::zero(), legacy_transfer(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SequencerError::ChainIdMismatch {
            expected: SEPOLIA_CHAIN_ID,
            actual: 1
        }
    ));

    let err = sequencer.send(legacy_transfer(), &cancel).await.unwrap_err();
    assert!(matches!(err, SequencerError::ChainIdMismatch { .. }));
    assert_eq!(chain.nonce_queries(), 0);
}

#[tokio::test]
async fn test_preflight_rejects_unaffordable_transfer() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID).with_balance(U256::exp10(15));
    let sequencer = test_sequencer(Arc::new(chain));
    let cancel = CancellationToken::new();

    let request = legacy_transfer();
    let err = sequencer.preflight(&request, &cancel).await.unwrap_err();

    match err {
        SequencerError::InsufficientFunds {
            required,
            available,
        } => {
            assert_eq!(required, request.max_cost());
            assert_eq!(available, U256::exp10(15));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_preflight_returns_balance() {
    let sequencer = test_sequencer(Arc::new(FakeChain::new(SEPOLIA_CHAIN_ID)));
    let balance = sequencer
        .preflight(&legacy_transfer(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(balance, U256::exp10(18));
}

#[tokio::test]
async fn test_batch_stops_at_first_rejection() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID).with_pending_nonce(sender(), 5);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();
    chain.reject_nonce(6, nonce_too_low());

    let batch = sequencer
        .send_batch(vec![legacy_transfer(); 3], &cancel)
        .await
        .unwrap();

    assert!(!batch.is_complete());
    assert_eq!(batch.submitted, 1);
    assert!(matches!(batch.error, Some(SequencerError::SubmissionRejected(_))));
    let statuses = batch
        .transactions
        .iter()
        .map(|tx| tx.status)
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            TransactionStatus::Submitted,
            TransactionStatus::Signed,
            TransactionStatus::Signed
        ]
    );
    assert_eq!(chain.submitted().len(), 1);

    // the next allocation is re-derived from the chain, which has seen nonce 5
    assert_eq!(sequencer.next_nonce(&sender()).await, None);
    let nonce = sequencer
        .allocate_nonce(&sender(), &cancel)
        .await
        .unwrap();
    assert_eq!(nonce, U256::from(6u64));
    assert_eq!(chain.nonce_queries(), 2);
}

#[tokio::test]
async fn test_settled_records_are_not_polled_again() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();
    chain.revert_next();

    let batch = sequencer
        .send_batch(vec![legacy_transfer(); 2], &cancel)
        .await
        .unwrap();
    let mut transactions = batch.transactions;
    let first = sequencer.await_batch(&mut transactions, &cancel).await;
    assert!(matches!(first[0], Err(SequencerError::ExecutionReverted { .. })));
    let confirmed = *first[1].as_ref().unwrap();

    // a node query would fail on this token
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let second = sequencer.await_batch(&mut transactions, &cancelled).await;

    assert!(matches!(second[0], Err(SequencerError::ExecutionReverted { .. })));
    assert_eq!(*second[1].as_ref().unwrap(), confirmed);
    assert_eq!(transactions[0].status, TransactionStatus::Failed);
    assert_eq!(transactions[1].status, TransactionStatus::Confirmed);
}

#[tokio::test]
async fn test_empty_batch_is_rejected_without_queries() {
    let mut provider = MockChainProvider::new();
    provider.expect_get_chain_id().never();
    provider.expect_get_pending_nonce().never();
    let sequencer = test_sequencer(Arc::new(provider));

    let err = sequencer
        .send_batch(Vec::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::InvalidBatchSize));
}

#[tokio::test]
async fn test_eip1559_transfer_is_submitted() {
    let chain = FakeChain::new(SEPOLIA_CHAIN_ID);
    let sequencer = test_sequencer(Arc::new(chain.clone()));
    let cancel = CancellationToken::new();
    let request = TransferRequest::new(
        Address::repeat_byte(0x22),
        U256::exp10(15),
        U256::from(21_000u64),
        FeeSpec::Eip1559 {
            max_fee_per_gas: U256::from(3_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
        },
    );

    let mut tx = sequencer.send(request, &cancel).await.unwrap();
    let confirmation = sequencer.await_confirmation(&mut tx, &cancel).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Confirmed);
    assert_eq!(Some(confirmation), tx.confirmation);
}

#[tokio::test]
async fn test_cancelled_queries_fail_fast() {
    let sequencer = test_sequencer(Arc::new(FakeChain::new(SEPOLIA_CHAIN_ID)));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = sequencer
        .reader()
        .block(BlockNumber::Latest, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SequencerError::Cancelled(_)));

    let err = sequencer.send(legacy_transfer(), &cancel).await.unwrap_err();
    assert!(matches!(err, SequencerError::Cancelled(_)));
}
