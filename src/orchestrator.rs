//! Trade orchestration
//!
//! Composes credential lookup, ticker resolution, quoting and execution into
//! one flow:
//!
//! ```text
//! validate -> fetch credentials -> build signer -> resolve -> quote -> execute
//! ```
//!
//! Every failure is reported as a `TradeResult` naming the stage that failed.
//! Input validation happens first so malformed input never reaches the secret
//! store.

use crate::config::{ChainConfig, Config, RpcConfig, TradingConfig};
use crate::error::ErrorKind;
use crate::relay::{QuoteRequest, QuoteService, RelayClient, SwapExecutor, TradeType};
use crate::resolver::{ResolvedToken, TickerResolver};
use crate::secrets::{CredentialFetcher, OpenServSecretStore};
use crate::tokens::{to_smallest_unit, InputCurrency};
use crate::wallet::{RpcSignerFactory, SignerFactory};
use crate::{Error, Result};
use alloy::primitives::U256;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use ts_rs::TS;
use uuid::Uuid;

/// Arguments of a `trade_token` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    /// Ticker of the token to buy, e.g. "SERV" or "$brett"
    pub ticker: String,
    /// Human-readable amount of the input currency, e.g. "0.1"
    pub amount: String,
    /// Currency to spend
    #[serde(alias = "input_currency")]
    pub input_currency: InputCurrency,
    /// Slippage tolerance in percent, e.g. "2" or "0.5%"
    #[serde(default, deserialize_with = "slippage_text")]
    #[schemars(with = "Option<String>")]
    #[ts(optional)]
    pub slippage: Option<String>,
    /// Name of the workspace secret holding the private key
    #[serde(alias = "pk_name", alias = "secret_name")]
    pub secret_name: String,
}

/// Slippage arrives as text ("2%") or as a bare number
fn slippage_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "slippage must be a string or number, got {}",
            other
        ))),
    }
}

/// Stage of the trade flow, reported when a trade fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStage {
    Validate,
    FetchCredentials,
    BuildSigner,
    ResolveToken,
    GetQuote,
    Execute,
}

/// Outcome of a trade. Either every success field is set or every failure
/// field is; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_token: Option<ResolvedToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<TradeStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_secrets: Option<Vec<String>>,
}

impl TradeResult {
    pub fn success(
        transaction_hash: String,
        chain: &ChainConfig,
        token: ResolvedToken,
        request: &TradeRequest,
    ) -> Self {
        let message = format!(
            "Swapped {} {} for {} on {}",
            request.amount,
            request.input_currency.symbol(),
            token.symbol,
            chain.name
        );
        Self {
            success: true,
            explorer_url: Some(chain.explorer_url(&transaction_hash)),
            transaction_hash: Some(transaction_hash),
            resolved_token: Some(token),
            input_amount: Some(request.amount.clone()),
            input_currency: Some(request.input_currency.symbol().to_string()),
            ticker: Some(request.ticker.clone()),
            chain: Some(chain.name.clone()),
            message: Some(message),
            error_kind: None,
            error_message: None,
            failed_stage: None,
            available_secrets: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            explorer_url: None,
            resolved_token: None,
            input_amount: None,
            input_currency: None,
            ticker: None,
            chain: None,
            message: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            failed_stage: None,
            available_secrets: None,
        }
    }

    fn from_error(error: Error, stage: TradeStage, ticker: &str) -> Self {
        let mut result = Self::failure(error.kind(), error.to_string());
        result.failed_stage = Some(stage);
        if !ticker.is_empty() {
            result.ticker = Some(ticker.to_string());
        }
        if let Error::SecretNotFound { available, .. } = error {
            result.available_secrets = Some(available);
        }
        result
    }
}

/// Parse a slippage percentage ("2", "0.5%") into basis points
pub fn slippage_bps(slippage: &str) -> Result<u32> {
    let trimmed = slippage.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let percent: f64 = number
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid slippage \"{}\"", slippage)))?;
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(Error::InvalidArgument(format!(
            "Slippage must be between 0 and 100 percent, got {}",
            slippage
        )));
    }
    Ok(percent_to_bps(percent))
}

pub fn percent_to_bps(percent: f64) -> u32 {
    (percent * 100.0).round() as u32
}

struct StageError {
    stage: TradeStage,
    error: Error,
}

trait AtStage<T> {
    fn at(self, stage: TradeStage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: TradeStage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Validated, converted trade inputs
struct TradePlan {
    amount_in: U256,
    slippage_bps: u32,
}

/// Runs `trade_token`
pub struct TradeOrchestrator {
    credentials: CredentialFetcher,
    resolver: TickerResolver,
    quotes: Arc<dyn QuoteService>,
    executor: SwapExecutor,
    signers: Arc<dyn SignerFactory>,
    chain: ChainConfig,
    trading: TradingConfig,
}

impl TradeOrchestrator {
    pub fn new(
        credentials: CredentialFetcher,
        resolver: TickerResolver,
        quotes: Arc<dyn QuoteService>,
        signers: Arc<dyn SignerFactory>,
        config: &Config,
    ) -> Self {
        Self {
            credentials,
            resolver,
            quotes,
            executor: SwapExecutor::new(config.chain.chain_id),
            signers,
            chain: config.chain.clone(),
            trading: config.trading.clone(),
        }
    }

    /// Wire the live HTTP and RPC collaborators
    pub fn from_config(config: &Config, rpc: &RpcConfig) -> Result<Self> {
        let client = config.http.build_client()?;

        let api_key = Config::openserv_api_key().map(SecretString::from);
        if api_key.is_none() {
            tracing::warn!("OPENSERV_API_KEY is not set; trades will fail at credential lookup");
        }
        let store = OpenServSecretStore::new(
            client.clone(),
            &config.endpoints.openserv_api_url,
            api_key,
        );

        let rpc_url = config.chain.rpc_endpoint(rpc)?;
        let signers = RpcSignerFactory::new(
            rpc_url,
            config.chain.chain_id,
            config.http.receipt_timeout(),
        )?;

        let quotes = RelayClient::new(
            client.clone(),
            &config.endpoints.relay_api_url,
            Some(config.trading.referrer.clone()).filter(|r| !r.is_empty()),
        );

        Ok(Self::new(
            CredentialFetcher::new(Box::new(store)),
            TickerResolver::with_default_sources(client, config),
            Arc::new(quotes),
            Arc::new(signers),
            config,
        ))
    }

    /// Execute a trade. Never fails: errors become failure results.
    pub async fn trade(&self, workspace_id: Option<&str>, request: &TradeRequest) -> TradeResult {
        let span = tracing::info_span!(
            "trade",
            trade_id = %Uuid::new_v4(),
            ticker = %request.ticker,
            currency = request.input_currency.symbol(),
        );

        async {
            match self.run(workspace_id, request).await {
                Ok(result) => result,
                Err(StageError { stage, error }) => {
                    tracing::error!(stage = ?stage, kind = ?error.kind(), error = %error, "Trade failed");
                    TradeResult::from_error(error, stage, &request.ticker)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn validate(&self, request: &TradeRequest) -> Result<TradePlan> {
        if request.ticker.trim().is_empty() {
            return Err(Error::InvalidArgument("Ticker is required".to_string()));
        }
        if request.secret_name.trim().is_empty() {
            return Err(Error::InvalidArgument("Secret name is required".to_string()));
        }

        let amount_in = to_smallest_unit(&request.amount, request.input_currency.decimals())?;
        if amount_in.is_zero() {
            return Err(Error::InvalidArgument(format!(
                "Amount {} {} is zero in smallest units",
                request.amount,
                request.input_currency.symbol()
            )));
        }

        let slippage_bps = match request.slippage.as_deref() {
            Some(s) if !s.trim().is_empty() => slippage_bps(s)?,
            _ => percent_to_bps(self.trading.default_slippage_percent),
        };

        Ok(TradePlan {
            amount_in,
            slippage_bps,
        })
    }

    async fn run(
        &self,
        workspace_id: Option<&str>,
        request: &TradeRequest,
    ) -> std::result::Result<TradeResult, StageError> {
        let workspace_id = workspace_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Config("Workspace context is missing".to_string()))
            .at(TradeStage::Validate)?;

        let plan = self.validate(request).at(TradeStage::Validate)?;

        let key = self
            .credentials
            .fetch_private_key(workspace_id, &request.secret_name)
            .await
            .at(TradeStage::FetchCredentials)?;

        let signer = self.signers.signer(&key).at(TradeStage::BuildSigner)?;
        drop(key);
        let trader = signer.address().to_string().to_lowercase();

        let token = self
            .resolver
            .resolve(&request.ticker)
            .await
            .ok_or_else(|| Error::TokenNotFound(request.ticker.clone()))
            .at(TradeStage::ResolveToken)?;

        let quote_request = QuoteRequest {
            chain_id: self.chain.chain_id,
            to_chain_id: self.chain.chain_id,
            input_currency_address: self
                .chain
                .currency_address(request.input_currency)
                .to_lowercase(),
            output_currency_address: token.address.clone(),
            amount_in_smallest_unit: plan.amount_in.to_string(),
            trader_address: trader,
            recipient_address: None,
            trade_type: TradeType::ExactInput,
            slippage_bps: Some(plan.slippage_bps),
        };

        let quote = self
            .quotes
            .get_quote(&quote_request)
            .await
            .at(TradeStage::GetQuote)?;

        tracing::info!(
            amount_in = %quote_request.amount_in_smallest_unit,
            slippage_bps = plan.slippage_bps,
            expected_out = quote.expected_output().unwrap_or("unknown"),
            price_impact_percent = quote.price_impact_percent().unwrap_or("unknown"),
            steps = quote.steps().len(),
            "Quote received"
        );

        let tx_hash = self
            .executor
            .execute(&quote, signer.as_ref())
            .await
            .at(TradeStage::Execute)?;

        tracing::info!(tx_hash = %tx_hash, token = %token.address, "Trade executed");
        Ok(TradeResult::success(tx_hash, &self.chain, token, request))
    }
}
