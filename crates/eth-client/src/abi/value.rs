use alloy_primitives::{I256, U256};

use crate::address::Address;

/// A decoded (or to-be-encoded) ABI value.
///
/// Integers are carried at full width; the declared `uint<N>`/`int<N>` of
/// the parameter bounds them at encode and decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Payload of `bytes` or `bytes<N>`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of an array or tuple.
    pub fn as_slice(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(v) | AbiValue::FixedArray(v) | AbiValue::Tuple(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Address> for AbiValue {
    fn from(a: Address) -> Self {
        AbiValue::Address(a)
    }
}

impl From<bool> for AbiValue {
    fn from(b: bool) -> Self {
        AbiValue::Bool(b)
    }
}

impl From<U256> for AbiValue {
    fn from(u: U256) -> Self {
        AbiValue::Uint(u)
    }
}

impl From<u64> for AbiValue {
    fn from(u: u64) -> Self {
        AbiValue::Uint(U256::from(u))
    }
}

impl From<I256> for AbiValue {
    fn from(i: I256) -> Self {
        AbiValue::Int(i)
    }
}

impl From<&str> for AbiValue {
    fn from(s: &str) -> Self {
        AbiValue::String(s.to_string())
    }
}

impl From<String> for AbiValue {
    fn from(s: String) -> Self {
        AbiValue::String(s)
    }
}
