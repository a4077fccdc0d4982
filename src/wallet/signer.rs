//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where private keys are turned into signers.
//! - Keys are held in alloy's PrivateKeySigner which handles crypto securely
//! - Keys are never serialized to JSON
//! - Keys are never logged

use crate::{Error, Result};
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A transaction ready for signing and broadcast
#[derive(Debug, Clone, Serialize)]
pub struct PreparedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub chain_id: u64,
}

/// Capability to sign and broadcast transactions from one account
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account the signer sends from
    fn address(&self) -> Address;

    /// Sign, broadcast and wait for inclusion. Returns the transaction hash.
    ///
    /// Implementations must not retry: a failed wait does not mean the
    /// transaction was not broadcast.
    async fn send_transaction(&self, tx: PreparedTransaction) -> Result<String>;
}

/// Builds a signer from private key material
pub trait SignerFactory: Send + Sync {
    fn signer(&self, key: &SecretString) -> Result<Arc<dyn TransactionSigner>>;
}

/// Secure wallet that protects private keys
///
/// The private key is:
/// - Stored in alloy's PrivateKeySigner (handles crypto securely)
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations
pub struct SecureWallet {
    /// Public address (safe to expose)
    address: Address,
    /// Ethereum wallet for alloy integration
    wallet: EthereumWallet,
}

impl SecureWallet {
    /// Create a wallet from a hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {}", e)))?;

        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        Ok(Self { address, wallet })
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Get a reference to the EthereumWallet for use with alloy providers
    ///
    /// This is safe because EthereumWallet only exposes signing operations,
    /// not the raw private key.
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

/// Wallet bound to one chain's JSON-RPC endpoint
pub struct ChainSigner {
    wallet: SecureWallet,
    rpc_url: Url,
    chain_id: u64,
    receipt_timeout: Duration,
}

impl ChainSigner {
    pub fn new(wallet: SecureWallet, rpc_url: Url, chain_id: u64, receipt_timeout: Duration) -> Self {
        Self {
            wallet,
            rpc_url,
            chain_id,
            receipt_timeout,
        }
    }

    fn build_request(&self, tx: PreparedTransaction) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(self.wallet.address())
            .with_to(tx.to)
            .with_input(tx.data)
            .with_value(tx.value)
            .with_chain_id(tx.chain_id);

        if let Some(gas) = tx.gas_limit {
            request = request.with_gas_limit(gas);
        }
        if let Some(fee) = tx.max_fee_per_gas {
            request = request.with_max_fee_per_gas(fee);
        }
        if let Some(tip) = tx.max_priority_fee_per_gas {
            request = request.with_max_priority_fee_per_gas(tip);
        }
        request
    }
}

#[async_trait]
impl TransactionSigner for ChainSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn send_transaction(&self, tx: PreparedTransaction) -> Result<String> {
        if tx.chain_id != self.chain_id {
            return Err(Error::Execution(format!(
                "Transaction targets chain {} but signer is bound to chain {}",
                tx.chain_id, self.chain_id
            )));
        }

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.wallet().clone())
            .connect_http(self.rpc_url.clone());

        let to = tx.to;
        let pending = provider
            .send_transaction(self.build_request(tx))
            .await
            .map_err(|e| Error::Execution(format!("Broadcast to {} failed: {}", to, e)))?;

        let tx_hash = pending.tx_hash().to_string();
        tracing::info!(tx_hash = %tx_hash, to = %to, "Transaction broadcast, awaiting receipt");

        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| Error::Timeout(format!("Receipt for transaction {}", tx_hash)))?
            .map_err(|e| {
                Error::Execution(format!("Transaction {} not confirmed: {}", tx_hash, e))
            })?;

        if !receipt.status() {
            return Err(Error::Execution(format!("Transaction {} reverted", tx_hash)));
        }

        tracing::info!(
            tx_hash = %tx_hash,
            block = ?receipt.block_number(),
            "Transaction confirmed"
        );
        Ok(tx_hash)
    }
}

/// Creates chain-bound signers over a JSON-RPC endpoint
pub struct RpcSignerFactory {
    rpc_url: Url,
    chain_id: u64,
    receipt_timeout: Duration,
}

impl RpcSignerFactory {
    pub fn new(rpc_url: &str, chain_id: u64, receipt_timeout: Duration) -> Result<Self> {
        let rpc_url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            rpc_url,
            chain_id,
            receipt_timeout,
        })
    }
}

impl SignerFactory for RpcSignerFactory {
    fn signer(&self, key: &SecretString) -> Result<Arc<dyn TransactionSigner>> {
        let wallet = SecureWallet::from_hex(key.expose_secret())?;
        tracing::info!(address = %wallet.address_string(), chain_id = self.chain_id, "Wallet initialized");
        Ok(Arc::new(ChainSigner::new(
            wallet,
            self.rpc_url.clone(),
            self.chain_id,
            self.receipt_timeout,
        )))
    }
}
