//! Typed JSON-RPC client.
//!
//! # Responsibilities
//! - Map each network operation to exactly one request/response pair
//! - Turn JSON-RPC error objects into [`EthError::Rpc`]
//! - Keep transport failures distinguishable as [`EthError::Transport`]
//!
//! The client never batches, caches or retries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::address::Address;
use crate::config::ClientConfig;
use crate::error::EthError;
use crate::rpc::quantity;
use crate::rpc::transport::{RpcRequest, Transport};
use crate::rpc::types::{Block, BlockNumber, CallRequest, Log, LogFilter, Receipt, TransactionInfo};

/// JSON-RPC client over a caller-supplied [`Transport`].
///
/// Cloning is cheap; clones share the transport and the request id counter.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
    normalize_poa_headers: bool,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            next_id: Arc::new(AtomicU64::new(1)),
            normalize_poa_headers: config.normalize_poa_headers,
        }
    }

    pub fn normalizes_poa_headers(&self) -> bool {
        self.normalize_poa_headers
    }

    /// Sends one request and deserializes its `result`.
    ///
    /// A `null` or missing result deserializes as JSON `null`, so `T =
    /// Option<_>` yields `None` while other types fail with
    /// [`EthError::Encoding`].
    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, EthError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method, id, "rpc request");

        let response = self
            .transport
            .round_trip(RpcRequest::new(id, method, params))
            .await
            .inspect_err(|e| tracing::warn!(method, id, error = %e, "rpc transport failure"))?;

        if let Some(error) = response.error {
            tracing::debug!(method, id, code = error.code, message = %error.message, "rpc error");
            let message = match error.data {
                Some(Value::String(data)) => format!("{} ({data})", error.message),
                _ => error.message,
            };
            return Err(EthError::Rpc {
                code: error.code,
                message,
            });
        }

        if let Some(response_id) = response.id {
            if response_id != id {
                return Err(EthError::Encoding(format!(
                    "{method}: response id {response_id} does not match request id {id}"
                )));
            }
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| EthError::Encoding(format!("{method}: unexpected result shape: {e}")))
    }

    async fn request_quantity(&self, method: &'static str, params: Value) -> Result<u64, EthError> {
        let raw: String = self.request(method, params).await?;
        quantity::parse(&raw).map_err(|e| EthError::Encoding(format!("{method}: {e}")))
    }

    /// Balance in wei at the latest block.
    pub async fn get_balance(&self, address: Address) -> Result<U256, EthError> {
        self.request("eth_getBalance", json!([address, BlockNumber::Latest]))
            .await
    }

    /// Number of transactions sent from `address`, i.e. its next nonce.
    pub async fn get_transaction_count(&self, address: Address) -> Result<u64, EthError> {
        self.request_quantity(
            "eth_getTransactionCount",
            json!([address, BlockNumber::Latest]),
        )
        .await
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> Result<U256, EthError> {
        self.request("eth_gasPrice", json!([])).await
    }

    pub async fn chain_id(&self) -> Result<u64, EthError> {
        self.request_quantity("eth_chainId", json!([])).await
    }

    pub async fn block_number(&self) -> Result<u64, EthError> {
        self.request_quantity("eth_blockNumber", json!([])).await
    }

    /// Executes a read-only call against the latest state.
    pub async fn call(&self, call: &CallRequest) -> Result<Bytes, EthError> {
        self.request("eth_call", json!([call, BlockNumber::Latest]))
            .await
    }

    /// Submits a serialized signed transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, EthError> {
        let hash: B256 = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        tracing::info!(tx_hash = %hash, "transaction submitted");
        Ok(hash)
    }

    /// `None` while the transaction is pending or unknown.
    pub async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, EthError> {
        self.request("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    pub async fn get_transaction(&self, tx_hash: B256) -> Result<Option<TransactionInfo>, EthError> {
        self.request("eth_getTransactionByHash", json!([tx_hash]))
            .await
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, EthError> {
        self.request("eth_getLogs", json!([filter])).await
    }

    /// Fetches a block header with transaction hashes, applying PoA header
    /// normalization when configured.
    pub async fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, EthError> {
        let block: Option<Block> = self
            .request("eth_getBlockByNumber", json!([number, false]))
            .await?;

        block
            .map(|b| b.normalize_poa(self.normalize_poa_headers))
            .transpose()
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("normalize_poa_headers", &self.normalize_poa_headers)
            .finish()
    }
}
