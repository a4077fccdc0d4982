//! Relay Trading Agent
//!
//! Buys tokens on Base by ticker:
//! - Resolves a ticker ("SERV", "$brett") to a contract via the Relay
//!   currency list, falling back to DexScreener search
//! - Prices the swap with a Relay quote
//! - Executes the quote's transactions with a key fetched from the
//!   workspace secret store
//!
//! # Security Model
//!
//! - Private keys are read from the workspace secret store per call and held
//!   as `SecretString` until turned into a signer
//! - Only a bounded key preview is ever logged
//! - All tool calls pass through the interceptor pipeline
//! - Broadcasts are never retried

pub mod config;
pub mod interceptors;
pub mod orchestrator;
pub mod relay;
pub mod resolver;
pub mod runner;
pub mod secrets;
pub mod tokens;
pub mod tools;
pub mod wallet;

mod error;

#[cfg(test)]
mod test_http;

// Re-export commonly used types
pub use config::{Config, RpcConfig, OPENSERV_API_KEY_ENV};
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::{TradeOrchestrator, TradeRequest, TradeResult};
pub use runner::AgentRunner;
