use std::str::FromStr;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer, WalletError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Transaction sender {tx_from:?} does not match signer {signer:?}")]
    SenderMismatch { tx_from: Address, signer: Address },
    #[error("Transaction is bound to chain {tx_chain_id}, refusing to sign for chain {chain_id}")]
    ChainIdMismatch { tx_chain_id: u64, chain_id: u64 },
}

/// RLP-encoded signed transaction, ready to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub raw: Bytes,
    /// keccak-256 of `raw`
    pub hash: H256,
}

#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `tx` so that the signature is only valid on `chain_id`.
    async fn sign(&self, tx: &TypedTransaction, chain_id: u64)
        -> Result<SignedPayload, SignerError>;
}

/// Signer holding a secp256k1 private key in memory
#[derive(Debug, Clone)]
pub struct LocalSigner {
    wallet: LocalWallet,
}

impl LocalSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Accepts a hex encoded key, with or without the `0x` prefix.
    pub fn from_private_key(private_key: &str) -> Result<Self, SignerError> {
        let wallet = LocalWallet::from_str(private_key.trim())?;
        Ok(Self::new(wallet))
    }
}

#[async_trait]
impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign(
        &self,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<SignedPayload, SignerError> {
        let signer = self.address();
        if let Some(tx_from) = tx.from() {
            if *tx_from != signer {
                return Err(SignerError::SenderMismatch {
                    tx_from: *tx_from,
                    signer,
                });
            }
        }
        if let Some(tx_chain_id) = tx.chain_id() {
            if tx_chain_id.as_u64() != chain_id {
                return Err(SignerError::ChainIdMismatch {
                    tx_chain_id: tx_chain_id.as_u64(),
                    chain_id,
                });
            }
        }

        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        let wallet = self.wallet.clone().with_chain_id(chain_id);
        let signature = wallet.sign_transaction(&tx).await?;

        let raw = tx.rlp_signed(&signature);
        let hash = tx.hash(&signature);
        debug!(?hash, chain_id, nonce = ?tx.nonce(), "signed transaction");

        Ok(SignedPayload { raw, hash })
    }
}
