//! Relay Protocol client
//!
//! Two-phase swap protocol:
//! - `QuoteService::get_quote` prices a route and returns the steps to run
//! - `SwapExecutor::execute` broadcasts the route's transactions
//!
//! The quote payload is treated as opaque; only the parts the executor needs
//! (steps and their transaction items) and a few display fields are typed.

mod execute;
mod quote;

pub use execute::SwapExecutor;
pub use quote::{
    Quote, QuoteDetails, QuoteRequest, QuoteService, QuoteStep, RelayClient, StepItem, StepKind,
    TradeType,
};

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse an EVM quantity given as a JSON number, decimal string or 0x-hex string
pub(crate) fn parse_quantity(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) if hex.is_empty() => Some(U256::ZERO),
                Some(hex) => U256::from_str_radix(hex, 16).ok(),
                None => U256::from_str_radix(s, 10).ok(),
            }
        }
        _ => None,
    }
}

/// Accept strings or numbers as an optional display string
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
