use ethers::types::U256;

/// Cached view of one account's nonce sequence.
///
/// `confirmed_nonce` is the pending nonce last fetched from the node and
/// `next_nonce` the next one to hand out. `next_nonce >= confirmed_nonce`
/// holds for as long as the state is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AccountNonceState {
    pub confirmed_nonce: U256,
    pub next_nonce: U256,
}

impl AccountNonceState {
    pub fn from_chain(pending_nonce: U256) -> Self {
        Self {
            confirmed_nonce: pending_nonce,
            next_nonce: pending_nonce,
        }
    }

    /// Reserve `count` contiguous nonces, returning the first one.
    pub fn take(&mut self, count: usize) -> U256 {
        let first = self.next_nonce;
        self.next_nonce = first.saturating_add(U256::from(count));
        first
    }

    /// Nonces handed out since the state was derived from the chain
    pub fn in_flight(&self) -> U256 {
        self.next_nonce.saturating_sub(self.confirmed_nonce)
    }
}
