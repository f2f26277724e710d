use std::fmt;
use std::str::FromStr;

use alloy_rlp::{Encodable, RlpEncodable};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EthError;
use crate::hash::keccak256;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Builds an address from exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EthError> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            EthError::InvalidAddress(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Derives the address of a secp256k1 public key: the low 20 bytes of
    /// Keccak-256 over the 64-byte uncompressed point (format byte dropped).
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let uncompressed = public_key.to_encoded_point(false);
        let hash = keccak256(&uncompressed.as_bytes()[1..]);

        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Self(addr)
    }

    /// Same as [`Address::from_public_key`] for a raw 65-byte `0x04 || x || y`
    /// encoding.
    pub fn from_uncompressed(uncompressed_pubkey: &[u8; 65]) -> Result<Self, EthError> {
        if uncompressed_pubkey[0] != 0x04 {
            return Err(EthError::InvalidKey(
                "uncompressed key must start with 0x04".into(),
            ));
        }

        let hash = keccak256(&uncompressed_pubkey[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Ok(Self(addr))
    }

    /// Address of a contract created by `sender` at `nonce`:
    /// `keccak256(rlp([sender, nonce]))[12..]`.
    pub fn create(sender: &Address, nonce: u64) -> Self {
        let input = CreateInput {
            sender: *sender,
            nonce,
        };
        let mut buf = Vec::new();
        input.encode(&mut buf);

        let hash = keccak256(&buf);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Self(addr)
    }

    /// Parses `0x` + 40 hex characters.
    ///
    /// All-lowercase and all-uppercase input is accepted as is. Mixed case must
    /// be a valid EIP-55 checksum.
    pub fn parse(address: &str) -> Result<Self, EthError> {
        let hex_part = strip_and_check(address)?;

        if has_mixed_case(hex_part) && to_checksum_hex(&hex_part.to_ascii_lowercase()) != hex_part
        {
            return Err(EthError::InvalidAddress(format!(
                "checksum mismatch for {address}"
            )));
        }

        let bytes = hex::decode(hex_part)
            .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// EIP-55 mixed-case rendering.
    pub fn to_checksum(&self) -> String {
        format!("0x{}", to_checksum_hex(&hex::encode(self.0)))
    }

    /// Lowercase `0x`-prefixed rendering.
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = EthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// RLP: a 20-byte string.
impl Encodable for Address {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

#[derive(RlpEncodable)]
struct CreateInput {
    sender: Address,
    nonce: u64,
}

/// Validates an address string.
///
/// Format problems (prefix, length, non-hex characters) are errors. A
/// well-formed address whose mixed case does not match its EIP-55 checksum
/// returns `Ok(false)`.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let hex_part = strip_and_check(address)?;

    if !has_mixed_case(hex_part) {
        return Ok(true);
    }

    Ok(to_checksum_hex(&hex_part.to_ascii_lowercase()) == hex_part)
}

/// Applies EIP-55 mixed-case checksum encoding to an address string of any
/// case.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    let hex_part = strip_and_check(address)?;
    Ok(format!(
        "0x{}",
        to_checksum_hex(&hex_part.to_ascii_lowercase())
    ))
}

fn strip_and_check(address: &str) -> Result<&str, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    Ok(hex_part)
}

fn has_mixed_case(hex_part: &str) -> bool {
    let any_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let any_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    any_lower && any_upper
}

/// EIP-55 over 40 lowercase hex characters (no prefix).
fn to_checksum_hex(lower_hex: &str) -> String {
    let hash = keccak256(lower_hex.as_bytes());

    lower_hex
        .chars()
        .enumerate()
        .map(|(i, c)| {
            // Nibble i of the hash decides the case of character i.
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}
