use std::time::Duration;

use clap::{Parser, Subcommand};
use ethers::types::Address;
use url::Url;

use tx_sequencer::{ChainConf, SequencerSettings};

use crate::trace::{Level, Style};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Url,

    /// Chain id the node must report. Signing is refused on a mismatch
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Hex encoded private key of the sending account
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Upper bound for a single RPC round trip
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub rpc_timeout: Duration,

    /// Pause between two receipt lookups
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Total time to wait for a receipt
    #[arg(long, default_value = "2m", value_parser = humantime::parse_duration)]
    pub confirmation_timeout: Duration,

    /// Cancel the whole command once this much time has passed
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    #[arg(long, value_enum, env = "LOG_LEVEL", default_value_t = Level::Info)]
    pub log_level: Level,

    #[arg(long, value_enum, default_value_t = Style::Full)]
    pub log_format: Style,

    /// Print results as JSON lines instead of prose
    #[arg(long)]
    pub json: bool,

    /// Dump the collected metrics after the command
    #[arg(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn chain_conf(&self) -> ChainConf {
        ChainConf::new(self.rpc_url.clone(), self.chain_id)
    }

    pub fn settings(&self) -> SequencerSettings {
        SequencerSettings {
            rpc_timeout: self.rpc_timeout,
            poll_interval: self.poll_interval,
            confirmation_timeout: self.confirmation_timeout,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the latest block, and another one by number
    Block {
        #[arg(long)]
        number: Option<u64>,
    },
    /// Show the balance and pending nonce of an account
    Balance {
        /// Defaults to the account of the private key
        #[arg(long, env = "ACCOUNT_ADDR")]
        address: Option<Address>,
    },
    /// Send ether to a recipient
    Transfer {
        #[arg(long, env = "RECIPIENT_ADDR")]
        to: Address,
        #[arg(long, default_value = "0.001")]
        amount_eth: String,
        #[arg(long, default_value_t = 21_000)]
        gas_limit: u64,
        /// Use EIP-1559 fees instead of a legacy gas price
        #[arg(long)]
        eip1559: bool,
        /// Return once the node accepted the transaction
        #[arg(long)]
        no_wait: bool,
    },
    /// Send several transfers with consecutive nonces
    Batch {
        #[arg(long, env = "RECIPIENT_ADDR")]
        to: Address,
        #[arg(long, default_value = "0.001")]
        amount_eth: String,
        #[arg(long, default_value_t = 3)]
        count: usize,
        #[arg(long, default_value_t = 21_000)]
        gas_limit: u64,
        #[arg(long)]
        eip1559: bool,
    },
    /// Call increment() on a Counter contract and read the count back
    Counter {
        #[arg(long, env = "CONTRACT_ADDR")]
        contract: Address,
        #[arg(long, default_value_t = 100_000)]
        gas_limit: u64,
        #[arg(long)]
        eip1559: bool,
    },
}
