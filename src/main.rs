//! Relay Trading Agent CLI
//!
//! `serve` runs the agent over stdio; the other commands exercise the
//! pipeline by hand.

use clap::{Parser, Subcommand};
use relay_trading_agent::relay::{QuoteRequest, QuoteService, RelayClient, TradeType};
use relay_trading_agent::resolver::TickerResolver;
use relay_trading_agent::tokens::{is_valid_address, to_smallest_unit, InputCurrency};
use relay_trading_agent::{
    AgentRunner, Config, Error, Result, RpcConfig, TradeOrchestrator, TradeRequest,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "relay-agent")]
#[command(about = "Buy tokens on Base by ticker through Relay Protocol")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tool calls as JSON lines on stdin/stdout
    Serve,

    /// List tools with their input schemas
    Tools,

    /// Resolve a ticker to a token address
    Resolve {
        /// Ticker, e.g. SERV or $brett
        ticker: String,
    },

    /// Get a swap quote without executing it
    Quote {
        /// Ticker of the token to buy
        #[arg(long)]
        ticker: String,

        /// Amount of the input currency, e.g. 0.1
        #[arg(long)]
        amount: String,

        /// Input currency: native (ETH) or stable (USDC)
        #[arg(long, default_value = "native")]
        currency: InputCurrency,

        /// Address the quote is built for
        #[arg(long)]
        trader: String,

        /// Slippage tolerance in percent
        #[arg(long)]
        slippage: Option<f64>,
    },

    /// Execute a trade using a key from the workspace secret store
    Trade {
        /// Workspace holding the key secret
        #[arg(long)]
        workspace: String,

        /// Name of the secret holding the private key
        #[arg(long)]
        secret: String,

        /// Ticker of the token to buy
        #[arg(long)]
        ticker: String,

        /// Amount of the input currency, e.g. 0.1
        #[arg(long)]
        amount: String,

        /// Input currency: native (ETH) or stable (USDC)
        #[arg(long, default_value = "native")]
        currency: InputCurrency,

        /// Slippage tolerance in percent
        #[arg(long)]
        slippage: Option<String>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries responses
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let (plain, json) = if cli.log_json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Serve => {
            let runner = AgentRunner::from_config(&config, &RpcConfig::from_env())?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            runner.serve(stdin, tokio::io::stdout()).await?;
        }
        Commands::Tools => {
            let runner = AgentRunner::from_config(&config, &RpcConfig::from_env())?;
            let definitions = runner.registry().definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Commands::Resolve { ticker } => {
            run_resolve(&config, &ticker).await?;
        }
        Commands::Quote {
            ticker,
            amount,
            currency,
            trader,
            slippage,
        } => {
            run_quote(&config, &ticker, &amount, currency, &trader, slippage).await?;
        }
        Commands::Trade {
            workspace,
            secret,
            ticker,
            amount,
            currency,
            slippage,
        } => {
            let orchestrator = TradeOrchestrator::from_config(&config, &RpcConfig::from_env())?;
            let request = TradeRequest {
                ticker,
                amount,
                input_currency: currency,
                slippage,
                secret_name: secret,
            };
            let result = orchestrator.trade(Some(&workspace), &request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!(
                "{} set: {}",
                relay_trading_agent::OPENSERV_API_KEY_ENV,
                Config::openserv_api_key().is_some()
            );
        }
    }

    Ok(())
}

async fn run_resolve(config: &Config, ticker: &str) -> Result<()> {
    let resolver = TickerResolver::with_default_sources(config.http.build_client()?, config);

    match resolver.resolve(ticker).await {
        Some(token) => {
            println!("{}", serde_json::to_string_pretty(&token)?);
            Ok(())
        }
        None => Err(Error::TokenNotFound(ticker.to_string())),
    }
}

async fn run_quote(
    config: &Config,
    ticker: &str,
    amount: &str,
    currency: InputCurrency,
    trader: &str,
    slippage: Option<f64>,
) -> Result<()> {
    if !is_valid_address(trader) {
        return Err(Error::InvalidArgument(format!("Invalid trader address: {}", trader)));
    }

    let client = config.http.build_client()?;
    let resolver = TickerResolver::with_default_sources(client.clone(), config);
    let token = resolver
        .resolve(ticker)
        .await
        .ok_or_else(|| Error::TokenNotFound(ticker.to_string()))?;

    let slippage = slippage.unwrap_or(config.trading.default_slippage_percent);
    let request = QuoteRequest {
        chain_id: config.chain.chain_id,
        to_chain_id: config.chain.chain_id,
        input_currency_address: config.chain.currency_address(currency).to_lowercase(),
        output_currency_address: token.address.clone(),
        amount_in_smallest_unit: to_smallest_unit(amount, currency.decimals())?.to_string(),
        trader_address: trader.to_lowercase(),
        recipient_address: None,
        trade_type: TradeType::ExactInput,
        slippage_bps: Some(relay_trading_agent::orchestrator::percent_to_bps(slippage)),
    };

    let relay = RelayClient::new(
        client,
        &config.endpoints.relay_api_url,
        Some(config.trading.referrer.clone()),
    );
    let quote = relay.get_quote(&request).await?;

    tracing::info!(
        token = %token.address,
        expected_out = quote.expected_output().unwrap_or("unknown"),
        steps = quote.steps().len(),
        "Quote received"
    );
    println!("{}", serde_json::to_string_pretty(quote.raw())?);
    Ok(())
}
