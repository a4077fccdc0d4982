//! Chain constants, input currencies and amount helpers
//!
//! The agent trades on a single chain. Everything that depends on the chain's
//! well-known tokens (native coin sentinel, the stablecoin) lives here.

use crate::{Error, Result};
use alloy::primitives::U256;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Chain ID constants
pub mod chains {
    pub const BASE: u64 = 8453;

    /// Chain tag used by DexScreener for Base pairs
    pub const BASE_TAG: &str = "base";
}

/// Well-known token addresses on Base (lowercase hex)
pub mod addresses {
    /// Relay uses the zero address for the chain's native coin
    pub const NATIVE: &str = "0x0000000000000000000000000000000000000000";
    pub const USDC_BASE: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
}

pub const NATIVE_DECIMALS: u8 = 18;
pub const STABLE_DECIMALS: u8 = 6;

/// Currency spent by a trade
///
/// Deserializes through `FromStr`, so `ETH`, `Eth` and `native` all parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InputCurrency {
    /// The chain's native coin (ETH on Base)
    Native,
    /// The chain's stablecoin (USDC on Base)
    Stable,
}

impl InputCurrency {
    pub fn decimals(&self) -> u8 {
        match self {
            InputCurrency::Native => NATIVE_DECIMALS,
            InputCurrency::Stable => STABLE_DECIMALS,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            InputCurrency::Native => "ETH",
            InputCurrency::Stable => "USDC",
        }
    }
}

impl std::str::FromStr for InputCurrency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "eth" => Ok(InputCurrency::Native),
            "stable" | "usdc" => Ok(InputCurrency::Stable),
            other => Err(Error::InvalidArgument(format!(
                "Unknown input currency \"{}\" (expected native or stable)",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for InputCurrency {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Returns true iff `s` is `0x` followed by exactly 40 hex digits.
pub fn is_valid_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Convert a human decimal amount into the currency's smallest unit.
///
/// Fraction digits beyond `decimals` are truncated, never rounded up.
/// Only plain decimal notation is accepted (`"0.1"`, `"10"`, `".5"`).
pub fn to_smallest_unit(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(Error::InvalidArgument(format!(
            "Amount \"{}\" is not a non-negative decimal number",
            amount
        )));
    }

    let decimals = decimals as usize;
    let kept = &fraction[..fraction.len().min(decimals)];
    let digits = format!("{}{}{}", whole, kept, "0".repeat(decimals - kept.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10)
        .map_err(|e| Error::InvalidArgument(format!("Amount \"{}\" out of range: {}", amount, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let forty = "a".repeat(40);
        assert!(is_valid_address(&format!("0x{}", forty)));
        assert!(is_valid_address(addresses::USDC_BASE));
        assert!(is_valid_address(addresses::NATIVE));
        assert!(is_valid_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
    }

    #[test]
    fn test_invalid_address() {
        assert!(!is_valid_address(&format!("0x{}", "a".repeat(39))));
        assert!(!is_valid_address(&format!("0x{}", "a".repeat(41))));
        assert!(!is_valid_address(&"a".repeat(42)));
        assert!(!is_valid_address(&format!("0x{}g", "a".repeat(39))));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_native_amount() {
        let wei = to_smallest_unit("0.1", NATIVE_DECIMALS).unwrap();
        assert_eq!(wei.to_string(), "100000000000000000");
    }

    #[test]
    fn test_stable_amount() {
        let units = to_smallest_unit("10", STABLE_DECIMALS).unwrap();
        assert_eq!(units.to_string(), "10000000");
    }

    #[test]
    fn test_excess_fraction_truncates() {
        let units = to_smallest_unit("1.2345679", STABLE_DECIMALS).unwrap();
        assert_eq!(units.to_string(), "1234567");
        assert_eq!(to_smallest_unit("0.0000001", 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_amount_edge_forms() {
        assert_eq!(to_smallest_unit(".5", 6).unwrap().to_string(), "500000");
        assert_eq!(to_smallest_unit("3.", 6).unwrap().to_string(), "3000000");
        assert_eq!(to_smallest_unit("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_rejects_non_numeric() {
        for bad in ["", ".", "abc", "-1", "1e18", "1.2.3", "0x10"] {
            let err = to_smallest_unit(bad, 18).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_input_currency_aliases() {
        let eth: InputCurrency = serde_json::from_str("\"ETH\"").unwrap();
        let native: InputCurrency = serde_json::from_str("\"native\"").unwrap();
        let usdc: InputCurrency = serde_json::from_str("\"USDC\"").unwrap();
        assert_eq!(eth, InputCurrency::Native);
        assert_eq!(native, InputCurrency::Native);
        assert_eq!(usdc, InputCurrency::Stable);
        assert_eq!(usdc.decimals(), 6);
        assert_eq!(eth.symbol(), "ETH");
    }

    #[test]
    fn test_input_currency_from_str() {
        assert_eq!("Native".parse::<InputCurrency>().unwrap(), InputCurrency::Native);
        assert_eq!("usdc".parse::<InputCurrency>().unwrap(), InputCurrency::Stable);
        assert!("dai".parse::<InputCurrency>().is_err());
    }

    #[test]
    fn test_json_and_text_parsing_agree() {
        for raw in ["Eth", "ETH", "native", "NATIVE", "Usdc", "stable", " usdc ", "dai", ""] {
            let from_text = raw.parse::<InputCurrency>().ok();
            let from_json = serde_json::from_value::<InputCurrency>(serde_json::json!(raw)).ok();
            assert_eq!(from_text, from_json, "disagree on {raw:?}");
        }
        assert_eq!(
            serde_json::to_value(InputCurrency::Stable).unwrap(),
            serde_json::json!("stable")
        );
        assert!(serde_json::from_value::<InputCurrency>(serde_json::json!(1)).is_err());
    }
}
