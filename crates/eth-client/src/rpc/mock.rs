//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use alloy_primitives::B256;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::address::Address;
use crate::error::TransportError;
use crate::rpc::transport::{RpcRequest, RpcResponse, Transport};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
    pub at: Instant,
}

#[derive(Debug, Clone)]
enum Scripted {
    Result(Value),
    RpcError(i64, String),
    TransportError(String),
}

/// Answers each method from its own queue, falling back to a per-method
/// default once the queue is empty.
#[derive(Default)]
pub struct MockTransport {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: &str, scripted: Scripted) {
        self.queues
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub fn push_result(&self, method: &str, result: Value) {
        self.push(method, Scripted::Result(result));
    }

    pub fn push_error(&self, method: &str, code: i64, message: &str) {
        self.push(method, Scripted::RpcError(code, message.to_string()));
    }

    pub fn push_transport_error(&self, method: &str, message: &str) {
        self.push(method, Scripted::TransportError(message.to_string()));
    }

    pub fn set_default(&self, method: &str, result: Value) {
        self.defaults
            .lock()
            .unwrap()
            .insert(method.to_string(), result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// A minimal mined receipt for `tx_hash`.
    pub fn receipt_json(tx_hash: B256, status: &str, contract_address: Option<Address>) -> Value {
        json!({
            "transactionHash": tx_hash,
            "status": status,
            "blockNumber": "0x10",
            "blockHash": B256::repeat_byte(0xbb),
            "gasUsed": "0x5208",
            "from": "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            "to": null,
            "contractAddress": contract_address,
            "logs": []
        })
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn round_trip(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            id: request.id,
            method: request.method.clone(),
            params: request.params.clone(),
            at: Instant::now(),
        });

        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.method)
            .and_then(VecDeque::pop_front);

        let scripted = match next {
            Some(s) => s,
            None => match self.defaults.lock().unwrap().get(&request.method) {
                Some(v) => Scripted::Result(v.clone()),
                None => {
                    return Err(TransportError(format!(
                        "no scripted response for {}",
                        request.method
                    )))
                }
            },
        };

        match scripted {
            Scripted::Result(v) => Ok(RpcResponse::success(request.id, v)),
            Scripted::RpcError(code, message) => Ok(RpcResponse::failure(request.id, code, message)),
            Scripted::TransportError(message) => Err(TransportError(message)),
        }
    }
}
