//! Conversions between wei and the units shown to people.

use ethers::types::U256;
use ethers::utils::{parse_ether, ConversionError};

const ETHER_DECIMALS: u32 = 18;
const GWEI_DECIMALS: u32 = 9;

/// `wei` in ether, rounded half up to 6 decimals
pub fn format_eth(wei: U256) -> String {
    format_rounded(wei, ETHER_DECIMALS, 6)
}

/// `wei` in gwei, rounded half up to 2 decimals
pub fn format_gwei(wei: U256) -> String {
    format_rounded(wei, GWEI_DECIMALS, 2)
}

/// Parse a decimal ether amount such as `"0.001"` into wei.
pub fn parse_eth(amount: &str) -> Result<U256, ConversionError> {
    parse_ether(amount.trim())
}

/// Upper bound on what a transfer costs the sender
pub fn total_cost(value: U256, gas_limit: U256, gas_price: U256) -> U256 {
    gas_limit.saturating_mul(gas_price).saturating_add(value)
}

fn format_rounded(amount: U256, decimals: u32, shown: u32) -> String {
    let dropped = U256::exp10((decimals - shown) as usize);
    let half = dropped / 2;
    let rounded = amount.saturating_add(half) / dropped;

    let scale = U256::exp10(shown as usize);
    let whole = rounded / scale;
    let fraction = (rounded % scale).as_u64();
    format!("{whole}.{fraction:0width$}", width = shown as usize)
}
