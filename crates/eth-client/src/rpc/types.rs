//! Typed shapes of the JSON-RPC results the client consumes.

use alloy_primitives::{Bytes, B256, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::abi::AbiEntry;
use crate::address::Address;
use crate::error::EthError;
use crate::rpc::quantity;

/// Block selector for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockNumber {
    #[default]
    Latest,
    Earliest,
    Pending,
    Number(u64),
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockNumber::Latest => serializer.serialize_str("latest"),
            BlockNumber::Earliest => serializer.serialize_str("earliest"),
            BlockNumber::Pending => serializer.serialize_str("pending"),
            BlockNumber::Number(n) => serializer.serialize_str(&quantity::format(*n)),
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        BlockNumber::Number(n)
    }
}

/// Parameters of a read-only `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

/// An event log as returned by `eth_getLogs` or inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default, with = "quantity::opt")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// Execution outcome recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

impl Serialize for ReceiptStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReceiptStatus::Success => serializer.serialize_str("0x1"),
            ReceiptStatus::Failure => serializer.serialize_str("0x0"),
        }
    }
}

impl<'de> Deserialize<'de> for ReceiptStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match quantity::deserialize(deserializer)? {
            1 => Ok(ReceiptStatus::Success),
            0 => Ok(ReceiptStatus::Failure),
            other => Err(de::Error::custom(format!("unknown receipt status {other}"))),
        }
    }
}

/// The network's record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
    pub status: ReceiptStatus,
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub block_hash: B256,
    #[serde(with = "quantity")]
    pub gas_used: u64,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: B256,
    #[serde(with = "quantity")]
    pub nonce: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub value: U256,
    #[serde(with = "quantity")]
    pub gas: u64,
    #[serde(default)]
    pub gas_price: Option<U256>,
    pub input: Bytes,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub chain_id: Option<u64>,
}

/// Maximum `extraData` length of a standard block header.
pub const MAX_EXTRA_DATA_LEN: usize = 32;

/// A block header with transaction hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(with = "quantity")]
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    #[serde(with = "quantity")]
    pub timestamp: u64,
    #[serde(with = "quantity")]
    pub gas_limit: u64,
    #[serde(with = "quantity")]
    pub gas_used: u64,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
    pub miner: Address,
    pub extra_data: Bytes,
    #[serde(default)]
    pub proof_of_authority_data: Option<Bytes>,
    #[serde(default)]
    pub transactions: Vec<B256>,
}

impl Block {
    /// Proof-of-authority networks pack signer data into `extraData`, past the
    /// 32-byte limit. With `normalize` set such bytes move to
    /// `proof_of_authority_data`; without it the header is rejected.
    pub fn normalize_poa(mut self, normalize: bool) -> Result<Self, EthError> {
        if self.extra_data.len() <= MAX_EXTRA_DATA_LEN {
            return Ok(self);
        }

        if !normalize {
            return Err(EthError::Encoding(format!(
                "block {} has {} bytes of extraData (max {MAX_EXTRA_DATA_LEN}); \
                 enable PoA header normalization for this network",
                self.number,
                self.extra_data.len()
            )));
        }

        self.proof_of_authority_data = Some(std::mem::take(&mut self.extra_data));
        Ok(self)
    }
}

/// Parameters of `eth_getLogs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Positional topic constraints; `None` matches anything.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Option<B256>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockNumber>,
}

impl LogFilter {
    /// Logs of `event` emitted by `address`.
    ///
    /// Anonymous events have no signature topic, so only the address is
    /// constrained for them.
    pub fn for_event(address: Address, event: &AbiEntry) -> Self {
        let topics = if event.anonymous {
            Vec::new()
        } else {
            vec![Some(event.topic())]
        };

        Self {
            address: Some(address),
            topics,
            ..Self::default()
        }
    }

    pub fn from_block(mut self, block: impl Into<BlockNumber>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockNumber>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    /// Constrains topic `position` (0 is the event signature).
    pub fn topic(mut self, position: usize, value: B256) -> Self {
        if self.topics.len() <= position {
            self.topics.resize(position + 1, None);
        }
        self.topics[position] = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_number_serializes_tags_and_hex() {
        assert_eq!(json!(BlockNumber::Latest), json!("latest"));
        assert_eq!(json!(BlockNumber::Pending), json!("pending"));
        assert_eq!(json!(BlockNumber::Number(4_096)), json!("0x1000"));
    }

    #[test]
    fn receipt_from_node_json() {
        let receipt: Receipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "status": "0x0",
            "blockNumber": "0x10",
            "blockHash": format!("0x{}", "22".repeat(32)),
            "gasUsed": "0x5208",
            "from": "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            "to": null,
            "contractAddress": "0x000000000000000000000000000000000000dead",
            "logs": [],
            "cumulativeGasUsed": "0x5208",
            "type": "0x0"
        }))
        .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Failure);
        assert!(!receipt.succeeded());
        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.gas_used, 21_000);
        assert!(receipt.to.is_none());
        assert!(receipt.contract_address.is_some());
        assert!(receipt.effective_gas_price.is_none());
    }

    #[test]
    fn log_with_pending_fields() {
        let log: Log = serde_json::from_value(json!({
            "address": "0x000000000000000000000000000000000000dead",
            "topics": [format!("0x{}", "ab".repeat(32))],
            "data": "0x",
            "blockNumber": null,
            "transactionHash": null,
            "logIndex": null
        }))
        .unwrap();

        assert!(log.block_number.is_none());
        assert!(log.data.is_empty());
        assert!(!log.removed);
    }

    fn block_json(extra_data: &str) -> serde_json::Value {
        json!({
            "number": "0x1",
            "hash": format!("0x{}", "01".repeat(32)),
            "parentHash": format!("0x{}", "00".repeat(32)),
            "timestamp": "0x6553f100",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x0",
            "miner": "0x0000000000000000000000000000000000000000",
            "extraData": extra_data,
            "transactions": []
        })
    }

    #[test]
    fn short_extra_data_is_untouched() {
        let block: Block = serde_json::from_value(block_json("0xd883010d00")).unwrap();
        let block = block.normalize_poa(false).unwrap();
        assert_eq!(block.extra_data.len(), 5);
        assert!(block.proof_of_authority_data.is_none());
        assert_eq!(block.timestamp, 0x6553f100);
    }

    #[test]
    fn long_extra_data_moves_when_normalizing() {
        let extra = format!("0x{}", "ee".repeat(97));
        let block: Block = serde_json::from_value(block_json(&extra)).unwrap();

        let normalized = block.clone().normalize_poa(true).unwrap();
        assert!(normalized.extra_data.is_empty());
        assert_eq!(normalized.proof_of_authority_data.unwrap().len(), 97);

        let err = block.normalize_poa(false).unwrap_err();
        assert!(matches!(err, EthError::Encoding(_)));
    }

    #[test]
    fn log_filter_serializes_camel_case() {
        let filter = LogFilter {
            address: Some(Address([0x11; 20])),
            ..LogFilter::default()
        }
        .topic(2, B256::repeat_byte(0x22))
        .from_block(100)
        .to_block(BlockNumber::Latest);

        let value = json!(filter);
        assert_eq!(value["fromBlock"], json!("0x64"));
        assert_eq!(value["toBlock"], json!("latest"));
        assert_eq!(value["topics"][0], json!(null));
        assert_eq!(value["topics"][1], json!(null));
        assert_eq!(value["topics"][2], json!(format!("0x{}", "22".repeat(32))));
    }
}
