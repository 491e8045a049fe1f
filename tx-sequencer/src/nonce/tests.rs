use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};

use crate::error::SequencerError;
use crate::metrics::SequencerMetrics;
use crate::provider::ChainError;
use crate::tests::MockChainProvider;

use super::NonceManager;

fn manager(provider: MockChainProvider) -> NonceManager {
    NonceManager::new(
        Arc::new(provider),
        SequencerMetrics::dummy_instance(),
        Duration::from_secs(1),
    )
}

fn nonces(values: &[u64]) -> Vec<U256> {
    values.iter().copied().map(U256::from).collect()
}

#[tokio::test]
async fn test_batch_issues_a_single_nonce_query() {
    let address = Address::random();
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_pending_nonce()
        .times(1)
        .returning(|_| Ok(U256::from(5u64)));
    let manager = manager(provider);

    let batch = manager.allocate_batch(&address, 3).await.unwrap();

    assert_eq!(batch, nonces(&[5, 6, 7]));
}

#[tokio::test]
async fn test_sequential_batches_are_contiguous() {
    let address = Address::random();
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_pending_nonce()
        .times(1)
        .returning(|_| Ok(U256::from(10u64)));
    let manager = manager(provider);

    let first = manager.allocate_batch(&address, 2).await.unwrap();
    let single = manager.allocate_nonce(&address).await.unwrap();
    let second = manager.allocate_batch(&address, 3).await.unwrap();

    assert_eq!(first, nonces(&[10, 11]));
    assert_eq!(single, U256::from(12u64));
    assert_eq!(second, nonces(&[13, 14, 15]));
    assert_eq!(manager.next_nonce(&address).await, Some(U256::from(16u64)));
}

#[tokio::test]
async fn test_zero_sized_batch_is_rejected_without_query() {
    let mut provider = MockChainProvider::new();
    provider.expect_get_pending_nonce().never();
    let manager = manager(provider);

    let err = manager
        .allocate_batch(&Address::random(), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::InvalidBatchSize));
}

#[tokio::test]
async fn test_reset_requeries_chain() {
    let address = Address::random();
    let mut provider = MockChainProvider::new();
    let mut answers = vec![U256::from(3u64), U256::from(0u64)];
    provider
        .expect_get_pending_nonce()
        .times(2)
        .returning(move |_| Ok(answers.pop().unwrap_or_default()));
    let metrics = SequencerMetrics::dummy_instance();
    let manager = NonceManager::new(Arc::new(provider), metrics.clone(), Duration::from_secs(1));

    assert_eq!(manager.allocate_nonce(&address).await.unwrap(), U256::zero());
    assert_eq!(manager.allocate_nonce(&address).await.unwrap(), U256::one());

    manager.reset_from_chain(&address).await;
    assert_eq!(manager.next_nonce(&address).await, None);

    assert_eq!(
        manager.allocate_nonce(&address).await.unwrap(),
        U256::from(3u64)
    );
    assert_eq!(metrics.get_nonce_resets(&address), 1);
    assert_eq!(metrics.get_next_nonce(&address), 4);
}

#[tokio::test]
async fn test_query_failure_leaves_state_cold() {
    let address = Address::random();
    let mut provider = MockChainProvider::new();
    let mut calls = 0;
    provider
        .expect_get_pending_nonce()
        .times(2)
        .returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(ChainError::Transport("connection refused".to_owned()))
            } else {
                Ok(U256::from(9u64))
            }
        });
    let manager = manager(provider);

    let err = manager.allocate_nonce(&address).await.unwrap_err();
    assert!(matches!(err, SequencerError::ChainQuery(ChainError::Transport(_))));
    assert_eq!(manager.next_nonce(&address).await, None);

    assert_eq!(
        manager.allocate_nonce(&address).await.unwrap(),
        U256::from(9u64)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_never_collide() {
    let address = Address::random();
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_pending_nonce()
        .times(1)
        .returning(|_| Ok(U256::from(100u64)));
    let manager = Arc::new(manager(provider));

    let handles = (0..50)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.allocate_nonce(&address).await.unwrap() })
        })
        .collect::<Vec<_>>();

    let mut allocated = HashSet::new();
    for handle in handles {
        assert!(allocated.insert(handle.await.unwrap()));
    }

    let expected = (100u64..150).map(U256::from).collect::<HashSet<_>>();
    assert_eq!(allocated, expected);
}

#[tokio::test]
async fn test_accounts_are_independent() {
    let alice = Address::repeat_byte(0xa1);
    let bob = Address::repeat_byte(0xb0);
    let mut provider = MockChainProvider::new();
    provider
        .expect_get_pending_nonce()
        .times(2)
        .returning(move |address| {
            if *address == alice {
                Ok(U256::from(1u64))
            } else {
                Ok(U256::from(40u64))
            }
        });
    let manager = manager(provider);

    assert_eq!(manager.allocate_batch(&alice, 2).await.unwrap(), nonces(&[1, 2]));
    assert_eq!(manager.allocate_batch(&bob, 2).await.unwrap(), nonces(&[40, 41]));

    manager.reset_from_chain(&alice).await;
    assert_eq!(manager.next_nonce(&alice).await, None);
    assert_eq!(manager.next_nonce(&bob).await, Some(U256::from(42u64)));
}
