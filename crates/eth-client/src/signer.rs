//! Legacy transaction signing with EIP-155 replay protection.
//!
//! The signing pre-image is `rlp([nonce, gasPrice, gasLimit, to, value, data,
//! chainId, 0, 0])`; chain id 0 falls back to the six-field Frontier form.
//! Signatures are normalized to low-s (EIP-2) and carry
//! `v = recid + chainId * 2 + 35` (or `27 + recid` without a chain id).

use alloy_primitives::{uint, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, Header, RlpEncodable};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::PublicKey;

use crate::address::Address;
use crate::error::EthError;
use crate::hash::keccak256;
use crate::keys::Account;
use crate::transaction::UnsignedTransaction;

/// secp256k1 group order.
const SECP256K1_N: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// Largest `s` accepted after EIP-2.
const SECP256K1_N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// A signed legacy transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedTransaction {
    /// The network transaction hash: Keccak-256 of the serialized bytes.
    pub fn hash(&self) -> B256 {
        keccak256(serialize(self))
    }

    /// Parses a serialized legacy transaction, inferring the chain id from
    /// `v`.
    pub fn decode(raw: &[u8]) -> Result<Self, EthError> {
        let mut buf = raw;
        let header = Header::decode(&mut buf).map_err(rlp_error)?;
        if !header.list {
            return Err(EthError::Encoding(
                "signed transaction must be an rlp list".into(),
            ));
        }
        if header.payload_length != buf.len() {
            return Err(EthError::Encoding(format!(
                "rlp list declares {} bytes, {} present",
                header.payload_length,
                buf.len()
            )));
        }

        let nonce = u64::decode(&mut buf).map_err(rlp_error)?;
        let gas_price = U256::decode(&mut buf).map_err(rlp_error)?;
        let gas_limit = u64::decode(&mut buf).map_err(rlp_error)?;
        let to = RlpTo::decode(&mut buf)?.0;
        let value = U256::decode(&mut buf).map_err(rlp_error)?;
        let data = Bytes::decode(&mut buf).map_err(rlp_error)?;
        let v = u64::decode(&mut buf).map_err(rlp_error)?;
        let r = U256::decode(&mut buf).map_err(rlp_error)?;
        let s = U256::decode(&mut buf).map_err(rlp_error)?;

        if !buf.is_empty() {
            return Err(EthError::Encoding(
                "signed transaction has more than nine fields".into(),
            ));
        }

        let chain_id = match v {
            27 | 28 => 0,
            v if v >= 35 => (v - 35) / 2,
            v => return Err(EthError::InvalidSignature(format!("unsupported v value {v}"))),
        };

        Ok(Self {
            tx: UnsignedTransaction {
                nonce,
                to,
                value,
                gas_limit,
                gas_price,
                chain_id,
                data,
            },
            v,
            r,
            s,
        })
    }
}

/// Keccak-256 of the signing pre-image.
pub fn signing_hash(tx: &UnsignedTransaction) -> B256 {
    let mut buf = Vec::new();
    if tx.chain_id == 0 {
        FrontierPreimage {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: RlpTo(tx.to),
            value: tx.value,
            data: tx.data.clone(),
        }
        .encode(&mut buf);
    } else {
        Eip155Preimage {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: RlpTo(tx.to),
            value: tx.value,
            data: tx.data.clone(),
            chain_id: tx.chain_id,
            empty_r: 0,
            empty_s: 0,
        }
        .encode(&mut buf);
    }
    keccak256(&buf)
}

/// Signs `tx` with `account`'s key.
pub fn sign(tx: &UnsignedTransaction, account: &Account) -> Result<SignedTransaction, EthError> {
    let hash = signing_hash(tx);

    // Sign the hash using PrehashSigner (signs a raw 32-byte hash).
    let (signature, recovery_id): (Signature, RecoveryId) = account
        .signing_key()
        .sign_prehash(hash.as_slice())
        .map_err(|e| EthError::InvalidSignature(e.to_string()))?;

    let r = U256::from_be_slice(&signature.r().to_bytes());
    let mut s = U256::from_be_slice(&signature.s().to_bytes());
    let mut parity = u64::from(recovery_id.is_y_odd());

    // Negating s mirrors R, which flips the recovery parity.
    if s > SECP256K1_N_HALF {
        s = SECP256K1_N - s;
        parity ^= 1;
    }

    let v = if tx.chain_id == 0 {
        27 + parity
    } else {
        tx.chain_id
            .checked_mul(2)
            .and_then(|c| c.checked_add(35 + parity))
            .ok_or_else(|| {
                EthError::TransactionBuild(format!("chain id {} is too large", tx.chain_id))
            })?
    };

    let signed = SignedTransaction {
        tx: tx.clone(),
        v,
        r,
        s,
    };
    tracing::debug!(
        from = %account.address(),
        nonce = tx.nonce,
        chain_id = tx.chain_id,
        "signed transaction"
    );
    Ok(signed)
}

/// Network encoding: `rlp([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`.
pub fn serialize(signed: &SignedTransaction) -> Vec<u8> {
    let fields = SignedFields {
        nonce: signed.tx.nonce,
        gas_price: signed.tx.gas_price,
        gas_limit: signed.tx.gas_limit,
        to: RlpTo(signed.tx.to),
        value: signed.tx.value,
        data: signed.tx.data.clone(),
        v: signed.v,
        r: signed.r,
        s: signed.s,
    };

    let mut out = Vec::with_capacity(fields.length());
    fields.encode(&mut out);
    out
}

/// Recovers the address that produced `signed`'s signature.
pub fn recover_sender(signed: &SignedTransaction) -> Result<Address, EthError> {
    let parity = recovery_parity(signed.v, signed.tx.chain_id)?;

    if signed.s > SECP256K1_N_HALF {
        return Err(EthError::InvalidSignature("s is not in the lower half order".into()));
    }

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signed.r.to_be_bytes::<32>());
    rs[32..].copy_from_slice(&signed.s.to_be_bytes::<32>());
    let signature =
        Signature::from_slice(&rs).map_err(|e| EthError::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| EthError::InvalidSignature("bad recovery id".into()))?;

    let hash = signing_hash(&signed.tx);
    let verifying_key =
        VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
            .map_err(|e| EthError::InvalidSignature(e.to_string()))?;

    Ok(Address::from_public_key(&PublicKey::from(&verifying_key)))
}

/// Maps `v` back to the recovery parity, checking it belongs to `chain_id`.
fn recovery_parity(v: u64, chain_id: u64) -> Result<u8, EthError> {
    let base = if chain_id == 0 {
        Some(27)
    } else {
        chain_id.checked_mul(2).and_then(|c| c.checked_add(35))
    };

    match base {
        Some(base) if v == base => Ok(0),
        Some(base) if v == base + 1 => Ok(1),
        _ => Err(EthError::InvalidSignature(format!(
            "v {v} does not match chain id {chain_id}"
        ))),
    }
}

fn rlp_error(e: alloy_rlp::Error) -> EthError {
    EthError::Encoding(format!("rlp: {e}"))
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct Eip155Preimage {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: RlpTo,
    value: U256,
    data: Bytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

#[derive(RlpEncodable)]
struct FrontierPreimage {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: RlpTo,
    value: U256,
    data: Bytes,
}

#[derive(RlpEncodable)]
struct SignedFields {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: RlpTo,
    value: U256,
    data: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

/// Recipient field: a 20-byte string, or the empty string for contract
/// creation.
struct RlpTo(Option<Address>);

impl RlpTo {
    fn decode(buf: &mut &[u8]) -> Result<Self, EthError> {
        let raw = Bytes::decode(buf).map_err(rlp_error)?;
        match raw.len() {
            0 => Ok(RlpTo(None)),
            20 => Ok(RlpTo(Some(Address::from_slice(&raw)?))),
            n => Err(EthError::Encoding(format!("recipient is {n} bytes"))),
        }
    }
}

impl Encodable for RlpTo {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match &self.0 {
            Some(address) => address.encode(out),
            None => [0u8; 0].as_slice().encode(out),
        }
    }

    fn length(&self) -> usize {
        match &self.0 {
            Some(address) => address.length(),
            None => 1,
        }
    }
}
