use std::time::Duration;

use alloy_primitives::{B256, U256};
use thiserror::Error;

/// Failure at the transport boundary: the request never produced a JSON-RPC
/// response (connection refused, timeout, malformed HTTP body, ...).
///
/// Kept apart from [`EthError::Rpc`] so callers can decide whether a retry
/// makes sense.
#[derive(Debug, Clone, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Errors produced by the client engine.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("abi encode error: {0}")]
    AbiEncode(String),

    #[error("abi decode error: {0}")]
    AbiDecode(String),

    #[error("no abi entry matches {0}")]
    UnknownEntry(String),

    #[error("{name} is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousEntry { name: String, candidates: Vec<String> },

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no receipt for {tx_hash} after {waited:?}")]
    ReceiptTimeout { tx_hash: B256, waited: Duration },

    #[error("gas limit {provided} is below the minimum of {minimum}")]
    InsufficientGasLimit { provided: u64, minimum: u64 },

    #[error("insufficient funds: need {required} wei, have {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("transaction build error: {0}")]
    TransactionBuild(String),

    #[error("contract deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EthError {
    /// True when the failure happened before the node saw the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, EthError::Transport(_))
    }
}
