//! Quote requests and the Relay quote endpoint

use super::lenient_string;
use crate::tokens::is_valid_address;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Only exact-input swaps are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    ExactInput,
}

/// Parameters of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub to_chain_id: u64,
    pub input_currency_address: String,
    pub output_currency_address: String,
    /// Base-10 integer in the INPUT currency's smallest unit
    pub amount_in_smallest_unit: String,
    pub trader_address: String,
    /// Defaults to the trader
    pub recipient_address: Option<String>,
    pub trade_type: TradeType,
    pub slippage_bps: Option<u32>,
}

impl QuoteRequest {
    pub fn recipient(&self) -> &str {
        self.recipient_address
            .as_deref()
            .unwrap_or(&self.trader_address)
    }

    /// Check addresses and amount before any network call
    pub fn validate(&self) -> Result<()> {
        let addresses = [
            ("input currency", self.input_currency_address.as_str()),
            ("output currency", self.output_currency_address.as_str()),
            ("trader", self.trader_address.as_str()),
            ("recipient", self.recipient()),
        ];
        for (label, address) in addresses {
            if !is_valid_address(address) {
                return Err(Error::InvalidArgument(format!(
                    "Invalid {} address: {}",
                    label, address
                )));
            }
        }

        let amount = &self.amount_in_smallest_unit;
        if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidArgument(format!(
                "Amount must be a base-10 integer in smallest units, got \"{}\"",
                amount
            )));
        }
        Ok(())
    }
}

/// Kind of a route step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Transaction,
    Signature,
    #[default]
    #[serde(other)]
    Other,
}

/// One item of a step; for transaction steps `data` is the transaction
#[derive(Debug, Clone, Deserialize)]
pub struct StepItem {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl StepItem {
    pub fn is_complete(&self) -> bool {
        self.status.eq_ignore_ascii_case("complete")
    }
}

/// One step of a route (e.g. "approve", "swap")
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: StepKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub items: Vec<StepItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyAmount {
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount_formatted: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Impact {
    #[serde(default, deserialize_with = "lenient_string")]
    pub percent: Option<String>,
}

/// Display fields of a quote, used for logging only
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDetails {
    #[serde(default)]
    pub currency_out: Option<CurrencyAmount>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rate: Option<String>,
    #[serde(default)]
    pub total_impact: Option<Impact>,
}

#[derive(Debug, Deserialize)]
struct QuoteProjection {
    #[serde(default)]
    steps: Vec<QuoteStep>,
    #[serde(default)]
    details: Option<QuoteDetails>,
}

/// A priced route. The raw payload is kept untouched.
#[derive(Debug, Clone)]
pub struct Quote {
    steps: Vec<QuoteStep>,
    details: Option<QuoteDetails>,
    raw: Value,
}

impl Quote {
    pub fn from_payload(raw: Value) -> Result<Self> {
        let projection: QuoteProjection = serde_json::from_value(raw.clone())?;
        Ok(Self {
            steps: projection.steps,
            details: projection.details,
            raw,
        })
    }

    pub fn steps(&self) -> &[QuoteStep] {
        &self.steps
    }

    pub fn details(&self) -> Option<&QuoteDetails> {
        self.details.as_ref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Expected output amount, formatted, if the service reported it
    pub fn expected_output(&self) -> Option<&str> {
        self.details
            .as_ref()?
            .currency_out
            .as_ref()?
            .amount_formatted
            .as_deref()
    }

    pub fn price_impact_percent(&self) -> Option<&str> {
        self.details.as_ref()?.total_impact.as_ref()?.percent.as_deref()
    }
}

/// Prices a swap
#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayQuoteBody<'a> {
    user: &'a str,
    recipient: &'a str,
    origin_chain_id: u64,
    destination_chain_id: u64,
    origin_currency: &'a str,
    destination_currency: &'a str,
    amount: &'a str,
    trade_type: TradeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    slippage_tolerance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<&'a str>,
}

impl<'a> RelayQuoteBody<'a> {
    fn from_request(request: &'a QuoteRequest, referrer: Option<&'a str>) -> Self {
        Self {
            user: &request.trader_address,
            recipient: request.recipient(),
            origin_chain_id: request.chain_id,
            destination_chain_id: request.to_chain_id,
            origin_currency: &request.input_currency_address,
            destination_currency: &request.output_currency_address,
            amount: &request.amount_in_smallest_unit,
            trade_type: request.trade_type,
            slippage_tolerance: request.slippage_bps.map(|bps| bps.to_string()),
            referrer,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayErrorBody {
    message: Option<String>,
    error_code: Option<String>,
}

/// Longest provider error text carried into an error message
const MAX_ERROR_BODY: usize = 300;

fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<RelayErrorBody>(body) {
        Ok(RelayErrorBody {
            message: Some(message),
            error_code,
        }) => match error_code {
            Some(code) => format!("{} ({})", message, code),
            None => message,
        },
        _ => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

/// HTTP client for the Relay API
pub struct RelayClient {
    client: Client,
    base_url: String,
    referrer: Option<String>,
}

impl RelayClient {
    pub fn new(client: Client, base_url: &str, referrer: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            referrer,
        }
    }
}

#[async_trait]
impl QuoteService for RelayClient {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote> {
        request.validate()?;

        let body = RelayQuoteBody::from_request(request, self.referrer.as_deref());
        tracing::debug!(
            origin = %body.origin_currency,
            destination = %body.destination_currency,
            amount = %body.amount,
            slippage_bps = ?request.slippage_bps,
            "Requesting Relay quote"
        );

        let response = self
            .client
            .post(format!("{}/quote", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                service: "relay",
                status: status.as_u16(),
                message: upstream_message(&text),
            });
        }

        let payload: Value = response.json().await?;
        Quote::from_payload(payload)
    }
}
