//! Secure wallet management
//!
//! This module handles private key handling and transaction broadcast.
//! The private key NEVER leaves this module once a signer is built.

mod signer;

pub use signer::{
    ChainSigner, PreparedTransaction, RpcSignerFactory, SecureWallet, SignerFactory,
    TransactionSigner,
};
