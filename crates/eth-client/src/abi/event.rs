use alloy_primitives::B256;

use super::codec;
use super::interface::{AbiEntry, EntryKind};
use super::param_type::ParamType;
use super::value::AbiValue;
use crate::error::EthError;
use crate::hash::keccak256;
use crate::rpc::Log;

/// The value recovered from an indexed event parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedValue {
    /// Value types are stored verbatim in the topic.
    Value(AbiValue),
    /// Dynamic and composite types only leave the Keccak-256 of their
    /// encoding; the original value cannot be recovered.
    Hashed(B256),
}

/// An event log decoded against its ABI entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub event: String,
    /// Indexed parameters in declaration order.
    pub indexed: Vec<(String, IndexedValue)>,
    /// Non-indexed parameters in declaration order.
    pub data: Vec<(String, AbiValue)>,
}

impl DecodedLog {
    /// Looks up a parameter by name, in the data section first and then among
    /// indexed parameters whose value survived.
    pub fn get(&self, name: &str) -> Option<&AbiValue> {
        self.data
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| {
                self.indexed.iter().find_map(|(n, v)| match v {
                    IndexedValue::Value(value) if n == name => Some(value),
                    _ => None,
                })
            })
    }

    pub fn indexed(&self, name: &str) -> Option<&IndexedValue> {
        self.indexed.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Decodes `log` as an emission of `event`.
pub fn decode_log(event: &AbiEntry, log: &Log) -> Result<DecodedLog, EthError> {
    if event.kind != EntryKind::Event {
        return Err(EthError::AbiDecode(format!(
            "{} is not an event",
            event.signature()
        )));
    }

    let indexed_count = event.inputs.iter().filter(|p| p.indexed).count();
    let expected_topics = indexed_count + usize::from(!event.anonymous);
    if log.topics.len() != expected_topics {
        return Err(EthError::AbiDecode(format!(
            "{} expects {expected_topics} topics, log has {}",
            event.signature(),
            log.topics.len()
        )));
    }

    let mut topics = log.topics.iter();
    if !event.anonymous {
        let topic0 = topics.next().copied().unwrap_or_default();
        if topic0 != event.topic() {
            return Err(EthError::AbiDecode(format!(
                "topic {topic0} is not the signature hash of {}",
                event.signature()
            )));
        }
    }

    let mut indexed = Vec::with_capacity(indexed_count);
    for (param, topic) in event.inputs.iter().filter(|p| p.indexed).zip(topics) {
        let value = if param.kind.is_value_type() {
            let mut decoded = codec::decode(std::slice::from_ref(&param.kind), topic.as_slice())?;
            IndexedValue::Value(decoded.remove(0))
        } else {
            IndexedValue::Hashed(*topic)
        };
        indexed.push((param.name.clone(), value));
    }

    let (names, types): (Vec<String>, Vec<ParamType>) = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| (p.name.clone(), p.kind.clone()))
        .unzip();
    let values = codec::decode(&types, &log.data)?;

    Ok(DecodedLog {
        event: event.name.clone(),
        indexed,
        data: names.into_iter().zip(values).collect(),
    })
}

/// The topic an indexed parameter of type `ty` holding `value` produces,
/// for building log filters.
pub fn encode_topic(ty: &ParamType, value: &AbiValue) -> Result<B256, EthError> {
    match (ty, value) {
        (ParamType::String, AbiValue::String(s)) => Ok(keccak256(s.as_bytes())),
        (ParamType::Bytes, AbiValue::Bytes(b)) => Ok(keccak256(b)),
        _ if ty.is_value_type() => {
            let word = codec::encode(std::slice::from_ref(ty), std::slice::from_ref(value))?;
            Ok(B256::from_slice(&word))
        }
        _ => Err(EthError::AbiEncode(format!(
            "topic filtering on {ty} values is not supported"
        ))),
    }
}
