use ethers::types::{Address, Block, H256, U256};
use serde_json::json;
use tracing::warn;

use tx_sequencer::units::{format_eth, format_gwei};
use tx_sequencer::{BatchSubmission, Confirmation, PendingTransaction, SequencerError};

/// Turns typed results into output for people, or JSON lines for scripts.
pub struct Reporter {
    json: bool,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit(&self, value: serde_json::Value, prose: impl FnOnce() -> String) {
        println!("{}", self.render(value, prose));
    }

    fn render(&self, value: serde_json::Value, prose: impl FnOnce() -> String) -> String {
        if self.json {
            value.to_string()
        } else {
            prose()
        }
    }

    pub fn block(&self, label: &str, block: &Block<H256>) {
        let number = block.number.map(|n| n.as_u64());
        self.emit(
            json!({
                "block": label,
                "number": number,
                "hash": block.hash,
                "timestamp": block.timestamp,
                "transactions": block.transactions.len(),
            }),
            || {
                format!(
                    "{label} block: number={} hash={:?} timestamp={} transactions={}",
                    number.map(|n| n.to_string()).unwrap_or_else(|| "pending".into()),
                    block.hash.unwrap_or_default(),
                    block.timestamp,
                    block.transactions.len(),
                )
            },
        );
    }

    pub fn missing_block(&self, number: u64) {
        self.emit(json!({ "block": number, "found": false }), || {
            format!("block {number} not found")
        });
    }

    pub fn balance(&self, address: &Address, wei: U256, pending_nonce: U256) {
        self.emit(
            json!({
                "address": address,
                "balanceWei": wei.to_string(),
                "pendingNonce": pending_nonce.to_string(),
            }),
            || {
                format!(
                    "account {address:?}: balance {} ETH, pending nonce {pending_nonce}",
                    format_eth(wei)
                )
            },
        );
    }

    pub fn plan(&self, value: U256, gas_limit: U256, gas_price: U256, max_cost: U256, balance: U256) {
        self.emit(
            json!({
                "valueWei": value.to_string(),
                "gasLimit": gas_limit.to_string(),
                "gasPriceWei": gas_price.to_string(),
                "maxCostWei": max_cost.to_string(),
                "balanceWei": balance.to_string(),
            }),
            || {
                format!(
                    "sending {} ETH with gas limit {gas_limit} at {} gwei, at most {} ETH of {} ETH available",
                    format_eth(value),
                    format_gwei(gas_price),
                    format_eth(max_cost),
                    format_eth(balance),
                )
            },
        );
    }

    pub fn submitted(&self, tx: &PendingTransaction) {
        let raw = tx
            .signed_payload
            .as_ref()
            .map(|raw| format!("0x{}", hex::encode(raw)));
        self.emit(
            json!({
                "event": "submitted",
                "uuid": tx.uuid,
                "nonce": tx.nonce.to_string(),
                "chainId": tx.chain_id,
                "hash": tx.hash,
                "raw": raw,
            }),
            || {
                format!(
                    "submitted nonce {} on chain {}: {:?}",
                    tx.nonce,
                    tx.chain_id,
                    tx.hash.unwrap_or_default()
                )
            },
        );
    }

    pub fn confirmed(&self, tx: &PendingTransaction, confirmation: &Confirmation) {
        self.emit(
            json!({
                "event": "confirmed",
                "uuid": tx.uuid,
                "nonce": tx.nonce.to_string(),
                "confirmation": confirmation,
            }),
            || {
                format!(
                    "nonce {} confirmed in block {} using {} gas",
                    tx.nonce, confirmation.block_number, confirmation.gas_used
                )
            },
        );
    }

    pub fn failed(&self, tx: &PendingTransaction, err: &SequencerError) {
        self.emit(
            json!({
                "event": "failed",
                "uuid": tx.uuid,
                "nonce": tx.nonce.to_string(),
                "status": format!("{:?}", tx.status),
                "error": err.to_string(),
                "retryable": err.is_retryable(),
            }),
            || format!("nonce {} ({:?}): {err}", tx.nonce, tx.status),
        );
    }

    pub fn batch(&self, batch: &BatchSubmission) {
        let unsubmitted = batch.transactions.len() - batch.submitted;
        self.emit(
            json!({
                "event": "batch",
                "submitted": batch.submitted,
                "unsubmitted": unsubmitted,
                "error": batch.error.as_ref().map(|err| err.to_string()),
            }),
            || match &batch.error {
                None => format!("submitted all {} transactions", batch.submitted),
                Some(err) => format!(
                    "submitted {} transactions, {unsubmitted} left unsubmitted: {err}",
                    batch.submitted
                ),
            },
        );
    }

    pub fn counter(&self, before: U256, after: U256, block_number: u64) {
        if after <= before {
            warn!(%before, %after, block_number, "Counter did not increase");
        }
        println!("{}", self.counter_line(before, after, block_number));
    }

    fn counter_line(&self, before: U256, after: U256, block_number: u64) -> String {
        let incremented = after > before;
        self.render(
            json!({
                "countBefore": before.to_string(),
                "countAfter": after.to_string(),
                "block": block_number,
                "incremented": incremented,
            }),
            || {
                if incremented {
                    format!("count went from {before} to {after} as of block {block_number}")
                } else {
                    format!(
                        "WARNING: count did not increase, {before} before and {after} as of block {block_number}"
                    )
                }
            },
        )
    }

    pub fn metrics(&self, text: &str) {
        print!("{text}");
    }
}
