//! Conversions between native amounts, wei hex quantities and display strings.

use std::str::FromStr;

use alloy::primitives::{Address, U256};

use crate::config::{BALANCE_DISPLAY_DECIMALS, WEI_PER_NATIVE};
use crate::types::Side;

/// Parse a `0x` hex quantity (as returned by `eth_getBalance` / `eth_chainId`).
/// Zero-padded 256-bit words are fine as long as the value fits in 128 bits.
pub fn parse_hex_quantity(hex: &str) -> Option<u128> {
    let hex = hex.trim();
    let digits = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(0);
    }
    let value = U256::from_str_radix(digits, 16).ok()?;
    u128::try_from(value).ok()
}

/// Native amount to wei, flooring fractional wei.
pub fn native_to_wei(amount: f64) -> u128 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * WEI_PER_NATIVE).floor() as u128
}

pub fn wei_to_hex(wei: u128) -> String {
    format!("0x{wei:x}")
}

/// Balance in wei rendered with the fixed display precision.
pub fn format_balance(wei: u128) -> String {
    format!("{:.*}", BALANCE_DISPLAY_DECIMALS, wei as f64 / WEI_PER_NATIVE)
}

/// Auxiliary transaction data tagging a wager: hex of `bet:{id}:{side}`.
pub fn bet_payload(bet_id: &str, side: Side) -> String {
    format!("0x{}", hex::encode(format!("bet:{bet_id}:{side}")))
}

/// `0x` followed by 40 hex digits. Checksum casing is not enforced.
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with("0x") && Address::from_str(address).is_ok()
}

/// `0x1234...abcd` form for narrow columns.
pub fn short_address(address: &str) -> String {
    elide(address, 6, 4)
}

/// `0x12345678abcd...1234abcd` form for transaction ids.
pub fn short_tx_hash(hash: &str) -> String {
    elide(hash, 14, 8)
}

// Counts chars, not bytes: provider strings are not guaranteed ASCII.
fn elide(s: &str, head: usize, tail: usize) -> String {
    let len = s.chars().count();
    if len <= head + tail {
        return s.to_string();
    }
    let start: String = s.chars().take(head).collect();
    let end: String = s.chars().skip(len - tail).collect();
    format!("{start}...{end}")
}
