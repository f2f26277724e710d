//! In-memory node for integration tests.
//!
//! Keeps balances and nonces, validates and "mines" raw transactions, and
//! answers `eth_call` from a selector table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{B256, U256};
use eth_client::rpc::{RpcRequest, RpcResponse};
use eth_client::signer::SignedTransaction;
use eth_client::{recover_sender, Address, Transport, TransportError};
use serde_json::{json, Value};

#[derive(Default)]
struct NodeState {
    chain_id: u64,
    gas_price: U256,
    block: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    /// Receipt polls answered with `null` before a mined receipt is returned.
    pending_polls: u32,
    receipts: HashMap<B256, Value>,
    call_results: HashMap<[u8; 4], Vec<u8>>,
    logs: Vec<Value>,
    extra_data: Vec<u8>,
    sent: Vec<SignedTransaction>,
    methods: Vec<String>,
}

pub struct FakeNode {
    state: Mutex<NodeState>,
}

#[allow(dead_code)]
impl FakeNode {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NodeState {
                chain_id,
                gas_price: U256::from(1_000_000_000u64),
                block: 100,
                ..Default::default()
            }),
        })
    }

    pub fn fund(&self, address: Address, wei: U256) {
        self.state.lock().unwrap().balances.insert(address, wei);
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_pending_polls(&self, polls: u32) {
        self.state.lock().unwrap().pending_polls = polls;
    }

    pub fn set_call_result(&self, selector: [u8; 4], data: Vec<u8>) {
        self.state.lock().unwrap().call_results.insert(selector, data);
    }

    pub fn push_log(&self, log: Value) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn set_extra_data(&self, extra_data: Vec<u8>) {
        self.state.lock().unwrap().extra_data = extra_data;
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().methods.clone()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, (i64, String)> {
        let mut state = self.state.lock().unwrap();
        state.methods.push(method.to_string());

        match method {
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "eth_blockNumber" => Ok(json!(format!("{:#x}", state.block))),
            "eth_gasPrice" => Ok(json!(state.gas_price)),
            "eth_getBalance" => {
                let who = param_address(params)?;
                Ok(json!(state.balances.get(&who).copied().unwrap_or_default()))
            }
            "eth_getTransactionCount" => {
                let who = param_address(params)?;
                let nonce = state.nonces.get(&who).copied().unwrap_or_default();
                Ok(json!(format!("{nonce:#x}")))
            }
            "eth_sendRawTransaction" => {
                let raw = param_bytes(params)?;
                let signed = SignedTransaction::decode(&raw).map_err(invalid)?;
                let sender = recover_sender(&signed).map_err(invalid)?;

                if signed.tx.chain_id != state.chain_id {
                    return Err((-32000, "invalid chain id".into()));
                }
                let expected = state.nonces.get(&sender).copied().unwrap_or_default();
                if signed.tx.nonce != expected {
                    return Err((-32000, format!("nonce too low: expected {expected}")));
                }

                let cost = signed.tx.value + U256::from(signed.tx.gas_limit) * signed.tx.gas_price;
                let balance = state.balances.get(&sender).copied().unwrap_or_default();
                if balance < cost {
                    return Err((-32000, "insufficient funds for gas * price + value".into()));
                }
                state.balances.insert(sender, balance - cost);
                if let Some(to) = signed.tx.to {
                    *state.balances.entry(to).or_default() += signed.tx.value;
                }
                state.nonces.insert(sender, expected + 1);
                state.block += 1;

                let hash = signed.hash();
                let contract_address = signed
                    .tx
                    .to
                    .is_none()
                    .then(|| Address::create(&sender, signed.tx.nonce));
                let receipt = json!({
                    "transactionHash": hash,
                    "status": "0x1",
                    "blockNumber": format!("{:#x}", state.block),
                    "blockHash": B256::repeat_byte(0xbb),
                    "gasUsed": "0x5208",
                    "from": sender,
                    "to": signed.tx.to,
                    "contractAddress": contract_address,
                    "logs": []
                });
                state.receipts.insert(hash, receipt);
                state.sent.push(signed);
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                if state.pending_polls > 0 {
                    state.pending_polls -= 1;
                    return Ok(Value::Null);
                }
                let hash: B256 = serde_json::from_value(params[0].clone())
                    .map_err(|e| (-32602, e.to_string()))?;
                Ok(state.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            "eth_call" => {
                let data = params[0]["data"]
                    .as_str()
                    .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok())
                    .ok_or((-32602, "bad call data".to_string()))?;
                let selector: [u8; 4] = data
                    .get(..4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or((-32602, "call data without selector".to_string()))?;
                state
                    .call_results
                    .get(&selector)
                    .map(|out| json!(format!("0x{}", hex::encode(out))))
                    .ok_or((3, "execution reverted".to_string()))
            }
            "eth_getLogs" => Ok(Value::Array(state.logs.clone())),
            "eth_getBlockByNumber" => Ok(json!({
                "number": format!("{:#x}", state.block),
                "hash": B256::repeat_byte(0x01),
                "parentHash": B256::repeat_byte(0x02),
                "timestamp": "0x65000000",
                "gasLimit": "0x1c9c380",
                "gasUsed": "0x0",
                "miner": Address::ZERO,
                "extraData": format!("0x{}", hex::encode(&state.extra_data)),
                "transactions": []
            })),
            other => Err((-32601, format!("method {other} not found"))),
        }
    }
}

#[async_trait::async_trait]
impl Transport for FakeNode {
    async fn round_trip(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        Ok(match self.handle(&request.method, &request.params) {
            Ok(result) => RpcResponse::success(request.id, result),
            Err((code, message)) => RpcResponse::failure(request.id, code, message),
        })
    }
}

fn param_address(params: &Value) -> Result<Address, (i64, String)> {
    params[0]
        .as_str()
        .and_then(|s| Address::parse(s).ok())
        .ok_or((-32602, "expected an address".to_string()))
}

fn param_bytes(params: &Value) -> Result<Vec<u8>, (i64, String)> {
    params[0]
        .as_str()
        .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok())
        .ok_or((-32602, "expected hex data".to_string()))
}

fn invalid(e: eth_client::EthError) -> (i64, String) {
    (-32000, e.to_string())
}
