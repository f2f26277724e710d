//! Solidity ABI head/tail encoding.
//!
//! A sequence of values is encoded as a head of fixed-size slots followed by
//! a tail. Static values sit in the head verbatim; each dynamic value leaves
//! a 32-byte offset (relative to the start of the enclosing sequence) in the
//! head and appends its own encoding to the tail.

use alloy_primitives::{I256, U256};

use super::interface::{AbiEntry, EntryKind};
use super::param_type::{sum_head_sizes, ParamType};
use super::value::AbiValue;
use crate::address::Address;
use crate::error::EthError;

const WORD: usize = 32;

/// Encodes call data for `entry`.
///
/// Functions are prefixed with their 4-byte selector. Constructors are not:
/// their encoded arguments are appended to the creation bytecode.
pub fn encode_call(entry: &AbiEntry, args: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    let types = entry.input_types();
    match entry.kind {
        EntryKind::Function => {
            let body = encode(&types, args)?;
            let mut data = Vec::with_capacity(4 + body.len());
            data.extend_from_slice(&entry.selector());
            data.extend_from_slice(&body);
            Ok(data)
        }
        EntryKind::Constructor => encode(&types, args),
        kind => Err(EthError::AbiEncode(format!(
            "cannot encode a call to a {kind:?} entry"
        ))),
    }
}

/// Decodes the return data of a call to `entry`.
pub fn decode_return(entry: &AbiEntry, data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    decode(&entry.output_types(), data)
}

/// Decodes selector-prefixed call data against `entry`.
pub fn decode_input(entry: &AbiEntry, data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    if data.len() < 4 {
        return Err(EthError::AbiDecode(format!(
            "call data is {} bytes, shorter than a selector",
            data.len()
        )));
    }
    let (selector, body) = data.split_at(4);
    if selector != entry.selector() {
        return Err(EthError::AbiDecode(format!(
            "selector 0x{} does not match {}",
            hex::encode(selector),
            entry.signature()
        )));
    }
    decode(&entry.input_types(), body)
}

/// Encodes `values` as the tuple `types`.
pub fn encode(types: &[ParamType], values: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    if types.len() != values.len() {
        return Err(EthError::AbiEncode(format!(
            "expected {} values, got {}",
            types.len(),
            values.len()
        )));
    }

    let head_len = sum_head_sizes(types)
        .ok_or_else(|| EthError::AbiEncode("encoded head does not fit in memory".into()))?;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        let encoded = encode_value(ty, value)?;
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend_from_slice(&encoded);
        } else {
            head.extend_from_slice(&encoded);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

/// Decodes `data` as the tuple `types`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = 0usize;

    for ty in types {
        let size = ty
            .head_size()
            .ok_or_else(|| EthError::AbiDecode(format!("{ty} is too large to decode")))?;
        let value = if ty.is_dynamic() {
            let offset = read_usize(data, cursor)?;
            decode_value(ty, tail_at(data, offset)?)?
        } else {
            decode_value(ty, tail_at(data, cursor)?)?
        };
        values.push(value);
        cursor = cursor.saturating_add(size);
    }

    Ok(values)
}

fn encode_value(ty: &ParamType, value: &AbiValue) -> Result<Vec<u8>, EthError> {
    match (ty, value) {
        (ParamType::Address, AbiValue::Address(addr)) => {
            // Left-pad: 12 zero bytes + 20 address bytes.
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(addr.as_bytes());
            Ok(word.to_vec())
        }
        (ParamType::Bool, AbiValue::Bool(b)) => {
            let mut word = [0u8; WORD];
            word[31] = u8::from(*b);
            Ok(word.to_vec())
        }
        (ParamType::Uint(bits), AbiValue::Uint(u)) => {
            if u.bit_len() > *bits {
                return Err(EthError::AbiEncode(format!("{u} does not fit in uint{bits}")));
            }
            Ok(u.to_be_bytes::<WORD>().to_vec())
        }
        (ParamType::Int(bits), AbiValue::Int(i)) => {
            let raw = i.into_raw();
            if !fits_signed(raw, *bits) {
                return Err(EthError::AbiEncode(format!("{i} does not fit in int{bits}")));
            }
            Ok(raw.to_be_bytes::<WORD>().to_vec())
        }
        (ParamType::FixedBytes(len), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *len {
                return Err(EthError::AbiEncode(format!(
                    "bytes{len} given {} bytes",
                    bytes.len()
                )));
            }
            // Right-pad: data + trailing zero bytes.
            let mut word = [0u8; WORD];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word.to_vec())
        }
        (ParamType::Bytes, AbiValue::Bytes(bytes)) => Ok(encode_packed_bytes(bytes)),
        (ParamType::String, AbiValue::String(s)) => Ok(encode_packed_bytes(s.as_bytes())),
        (ParamType::Array(inner), AbiValue::Array(items) | AbiValue::FixedArray(items)) => {
            let types = vec![(**inner).clone(); items.len()];
            let mut out = usize_word(items.len()).to_vec();
            out.extend_from_slice(&encode(&types, items)?);
            Ok(out)
        }
        (ParamType::FixedArray(inner, n), AbiValue::FixedArray(items) | AbiValue::Array(items)) => {
            if items.len() != *n {
                return Err(EthError::AbiEncode(format!(
                    "{ty} given {} elements",
                    items.len()
                )));
            }
            let types = vec![(**inner).clone(); *n];
            encode(&types, items)
        }
        (ParamType::Tuple(members), AbiValue::Tuple(items)) => encode(members, items),
        _ => Err(EthError::AbiEncode(format!(
            "value {value:?} does not match type {ty}"
        ))),
    }
}

/// `data` starts where the value's encoding starts: in the head for static
/// values, at the resolved offset for dynamic ones.
fn decode_value(ty: &ParamType, data: &[u8]) -> Result<AbiValue, EthError> {
    match ty {
        ParamType::Address => {
            let word = read_word(data, 0)?;
            require_zero(&word[..12], ty)?;
            Ok(AbiValue::Address(Address::from_slice(&word[12..])?))
        }
        ParamType::Bool => {
            let word = read_word(data, 0)?;
            require_zero(&word[..31], ty)?;
            match word[31] {
                0 => Ok(AbiValue::Bool(false)),
                1 => Ok(AbiValue::Bool(true)),
                b => Err(EthError::AbiDecode(format!("invalid bool byte 0x{b:02x}"))),
            }
        }
        ParamType::Uint(bits) => {
            let value = U256::from_be_bytes(*read_word(data, 0)?);
            if value.bit_len() > *bits {
                return Err(EthError::AbiDecode(format!(
                    "value {value} does not fit in uint{bits}"
                )));
            }
            Ok(AbiValue::Uint(value))
        }
        ParamType::Int(bits) => {
            let raw = U256::from_be_bytes(*read_word(data, 0)?);
            if !fits_signed(raw, *bits) {
                return Err(EthError::AbiDecode(format!(
                    "word is not a sign-extended int{bits}"
                )));
            }
            Ok(AbiValue::Int(I256::from_raw(raw)))
        }
        ParamType::FixedBytes(len) => {
            let word = read_word(data, 0)?;
            require_zero(&word[*len..], ty)?;
            Ok(AbiValue::FixedBytes(word[..*len].to_vec()))
        }
        ParamType::Bytes => Ok(AbiValue::Bytes(read_packed_bytes(data)?.to_vec())),
        ParamType::String => {
            let raw = read_packed_bytes(data)?;
            let s = std::str::from_utf8(raw)
                .map_err(|e| EthError::AbiDecode(format!("string is not utf-8: {e}")))?;
            Ok(AbiValue::String(s.to_string()))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, 0)?;
            let items = tail_at(data, WORD)?;
            ensure_room(inner, len, items.len())?;
            let types = vec![(**inner).clone(); len];
            Ok(AbiValue::Array(decode(&types, items)?))
        }
        ParamType::FixedArray(inner, n) => {
            ensure_room(inner, *n, data.len())?;
            let types = vec![(**inner).clone(); *n];
            Ok(AbiValue::FixedArray(decode(&types, data)?))
        }
        ParamType::Tuple(members) => Ok(AbiValue::Tuple(decode(members, data)?)),
    }
}

/// Every element needs at least its head slot, and at least one byte, so
/// an array is never allocated beyond the size of its input.
fn ensure_room(inner: &ParamType, count: usize, available: usize) -> Result<(), EthError> {
    let needed = inner
        .head_size()
        .and_then(|size| size.max(1).checked_mul(count));
    if needed.map_or(true, |needed| needed > available) {
        return Err(EthError::AbiDecode(format!(
            "{count} elements of {inner} exceed the {available} bytes available"
        )));
    }
    Ok(())
}

/// Length word followed by the payload right-padded to a word boundary.
fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn read_packed_bytes(data: &[u8]) -> Result<&[u8], EthError> {
    let len = read_usize(data, 0)?;
    let end = WORD
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            EthError::AbiDecode(format!(
                "length {len} exceeds the {} bytes available",
                data.len().saturating_sub(WORD)
            ))
        })?;
    Ok(&data[WORD..end])
}

fn usize_word(n: usize) -> [u8; WORD] {
    U256::from(n).to_be_bytes::<WORD>()
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8; WORD], EthError> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            EthError::AbiDecode(format!(
                "buffer too short: need a word at byte {at}, have {}",
                data.len()
            ))
        })
}

/// Reads a word holding an offset or length.
fn read_usize(data: &[u8], at: usize) -> Result<usize, EthError> {
    let value = U256::from_be_bytes(*read_word(data, at)?);
    usize::try_from(value)
        .ok()
        .filter(|n| *n <= data.len())
        .ok_or_else(|| {
            EthError::AbiDecode(format!(
                "offset or length {value} at byte {at} is outside the {}-byte buffer",
                data.len()
            ))
        })
}

fn tail_at(data: &[u8], at: usize) -> Result<&[u8], EthError> {
    data.get(at..).ok_or_else(|| {
        EthError::AbiDecode(format!(
            "offset {at} is outside the {}-byte buffer",
            data.len()
        ))
    })
}

fn require_zero(padding: &[u8], ty: &ParamType) -> Result<(), EthError> {
    if padding.iter().any(|b| *b != 0) {
        return Err(EthError::AbiDecode(format!("dirty padding in {ty} word")));
    }
    Ok(())
}

/// True when `raw`, read as two's complement, is in range for `int<bits>`:
/// every bit from `bits - 1` upward equals the sign bit.
fn fits_signed(raw: U256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let high = raw >> (bits - 1);
    high == U256::ZERO || high == U256::MAX >> (bits - 1)
}
