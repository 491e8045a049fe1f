use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::poll::PollConfig;

/// Connection details for the node. The endpoint has no default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConf {
    pub rpc_url: Url,
    /// When set, the chain id reported by the node must match
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl ChainConf {
    pub fn new(rpc_url: Url, chain_id: Option<u64>) -> Self {
        Self { rpc_url, chain_id }
    }
}

/// Time bounds for the sequencer's network calls
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencerSettings {
    /// Upper bound for a single RPC round trip
    #[serde(default = "default_rpc_timeout", deserialize_with = "human_duration")]
    pub rpc_timeout: Duration,
    /// Pause between two receipt lookups
    #[serde(default = "default_poll_interval", deserialize_with = "human_duration")]
    pub poll_interval: Duration,
    /// Total time to wait for a receipt
    #[serde(
        default = "default_confirmation_timeout",
        deserialize_with = "human_duration"
    )]
    pub confirmation_timeout: Duration,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            rpc_timeout: default_rpc_timeout(),
            poll_interval: default_poll_interval(),
            confirmation_timeout: default_confirmation_timeout(),
        }
    }
}

impl SequencerSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll_interval, self.confirmation_timeout)
    }
}

fn default_rpc_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_confirmation_timeout() -> Duration {
    Duration::from_secs(120)
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}
