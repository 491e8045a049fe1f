use std::fmt;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, H256, U256};
use uuid::Uuid;

use crate::confirmation::Confirmation;
use crate::error::{SequencerError, SequencerResult};
use crate::signer::SignedPayload;
use crate::units::total_cost;

/// Local identifier of a transaction, used to correlate log lines
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub struct TransactionUuid(Uuid);

impl TransactionUuid {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for TransactionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TransactionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum FeeSpec {
    /// Pre-London pricing, signed with EIP-155 replay protection
    Legacy { gas_price: U256 },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeSpec {
    /// Highest price per unit of gas the sender may be charged
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeSpec::Legacy { gas_price } => *gas_price,
            FeeSpec::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// What the caller wants sent, before a nonce is attached
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct TransferRequest {
    pub to: Address,
    /// in wei
    pub value: U256,
    pub gas_limit: U256,
    pub fee: FeeSpec,
    /// call data, empty for plain transfers
    pub data: Option<Bytes>,
}

impl TransferRequest {
    pub fn new(to: Address, value: U256, gas_limit: U256, fee: FeeSpec) -> Self {
        Self {
            to,
            value,
            gas_limit,
            fee,
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// `value + gas_limit * max_price_per_gas`, saturating
    pub fn max_cost(&self) -> U256 {
        total_cost(self.value, self.gas_limit, self.fee.max_price_per_gas())
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum TransactionStatus {
    /// assembled, nonce attached, not signed
    #[default]
    Built,
    /// signed payload and hash are known
    Signed,
    /// accepted into the node's pool. Not a confirmation
    Submitted,
    /// included with a successful receipt
    Confirmed,
    /// included, but execution reverted
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
    }
}

/// A single transaction tracked from construction to its receipt
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PendingTransaction {
    pub uuid: TransactionUuid,
    pub from: Address,
    pub nonce: U256,
    pub chain_id: u64,
    pub request: TransferRequest,
    pub signed_payload: Option<Bytes>,
    /// computed locally after signing, replaced by the node's answer on submission
    pub hash: Option<H256>,
    pub status: TransactionStatus,
    pub confirmation: Option<Confirmation>,
}

impl fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("uuid", &self.uuid)
            .field("from", &self.from)
            .field("nonce", &self.nonce)
            .field("chain_id", &self.chain_id)
            .field("to", &self.request.to)
            .field("value", &self.request.value)
            .field("hash", &self.hash)
            .field("status", &self.status)
            .finish()
    }
}

impl PendingTransaction {
    pub fn new(from: Address, nonce: U256, chain_id: u64, request: TransferRequest) -> Self {
        Self {
            uuid: TransactionUuid::random(),
            from,
            nonce,
            chain_id,
            request,
            signed_payload: None,
            hash: None,
            status: TransactionStatus::Built,
            confirmation: None,
        }
    }

    /// Canonical unsigned form, chain id included
    pub fn typed_tx(&self) -> TypedTransaction {
        let request = &self.request;
        let data = request.data.clone().unwrap_or_default();
        match request.fee {
            FeeSpec::Legacy { gas_price } => TransactionRequest::new()
                .from(self.from)
                .to(request.to)
                .value(request.value)
                .gas(request.gas_limit)
                .gas_price(gas_price)
                .nonce(self.nonce)
                .data(data)
                .chain_id(self.chain_id)
                .into(),
            FeeSpec::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .from(self.from)
                .to(request.to)
                .value(request.value)
                .gas(request.gas_limit)
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .nonce(self.nonce)
                .data(data)
                .chain_id(self.chain_id)
                .into(),
        }
    }

    pub(crate) fn ensure_status(&self, expected: TransactionStatus) -> SequencerResult<()> {
        if self.status == expected {
            return Ok(());
        }
        Err(SequencerError::InvalidStatus {
            uuid: self.uuid,
            expected,
            actual: self.status,
        })
    }

    pub(crate) fn mark_signed(&mut self, payload: SignedPayload) {
        self.hash = Some(payload.hash);
        self.signed_payload = Some(payload.raw);
        self.status = TransactionStatus::Signed;
    }

    pub(crate) fn mark_submitted(&mut self, hash: H256) {
        self.hash = Some(hash);
        self.status = TransactionStatus::Submitted;
    }

    pub(crate) fn mark_confirmed(&mut self, confirmation: Confirmation) {
        self.confirmation = Some(confirmation);
        self.status = TransactionStatus::Confirmed;
    }

    pub(crate) fn mark_failed(&mut self, confirmation: Confirmation) {
        self.confirmation = Some(confirmation);
        self.status = TransactionStatus::Failed;
    }
}
