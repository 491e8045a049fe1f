use ethers::types::{Address, U256};
use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, Encoder,
    IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};

const METRICS_NAMESPACE: &str = "tx_sequencer";

pub const LABEL_SUCCESS: &str = "success";

fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

/// Prometheus metrics for nonce allocation, submission and confirmation
#[derive(Clone)]
pub struct SequencerMetrics {
    registry: Registry,
    /// Next nonce to be handed out, per signer
    next_nonce: IntGaugeVec,
    /// Times the cached nonce state was discarded
    nonce_resets: IntCounterVec,
    // outcome is "success" or the error's metrics label
    submissions: IntCounterVec,
    confirmations: IntCounterVec,
}

impl SequencerMetrics {
    pub fn new(registry: Registry) -> prometheus::Result<Self> {
        let next_nonce = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced("next_nonce"),
                "The next nonce the sequencer will allocate",
            ),
            &["signer",],
            registry.clone()
        )?;
        let nonce_resets = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("nonce_resets"),
                "The number of times the nonce state was re-derived from the chain",
            ),
            &["signer",],
            registry.clone()
        )?;
        let submissions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("submissions"),
                "The number of transaction submissions, by outcome",
            ),
            &["signer", "outcome",],
            registry.clone()
        )?;
        let confirmations = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("confirmations"),
                "The number of confirmation waits, by outcome",
            ),
            &["signer", "outcome",],
            registry.clone()
        )?;

        Ok(Self {
            registry,
            next_nonce,
            nonce_resets,
            submissions,
            confirmations,
        })
    }

    pub fn set_next_nonce(&self, signer: &Address, nonce: &U256) {
        let value = if *nonce > U256::from(i64::MAX as u64) {
            i64::MAX
        } else {
            nonce.as_u64() as i64
        };
        self.next_nonce
            .with_label_values(&[&format!("{signer:?}")])
            .set(value);
    }

    pub fn increment_nonce_resets(&self, signer: &Address) {
        self.nonce_resets
            .with_label_values(&[&format!("{signer:?}")])
            .inc();
    }

    pub fn increment_submissions(&self, signer: &Address, outcome: &str) {
        self.submissions
            .with_label_values(&[&format!("{signer:?}"), outcome])
            .inc();
    }

    pub fn increment_confirmations(&self, signer: &Address, outcome: &str) {
        self.confirmations
            .with_label_values(&[&format!("{signer:?}"), outcome])
            .inc();
    }

    /// Text exposition of everything registered in the registry
    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
impl SequencerMetrics {
    pub fn dummy_instance() -> Self {
        let registry = Registry::new();
        let instance = Self::new(registry);
        instance.unwrap()
    }

    pub fn get_next_nonce(&self, signer: &Address) -> i64 {
        self.next_nonce
            .with_label_values(&[&format!("{signer:?}")])
            .get()
    }

    pub fn get_nonce_resets(&self, signer: &Address) -> u64 {
        self.nonce_resets
            .with_label_values(&[&format!("{signer:?}")])
            .get()
    }

    pub fn get_submissions(&self, signer: &Address, outcome: &str) -> u64 {
        self.submissions
            .with_label_values(&[&format!("{signer:?}"), outcome])
            .get()
    }
}
