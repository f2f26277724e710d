use alloy_primitives::B256;
use sha3::{Digest, Keccak256};

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    B256::from_slice(&Keccak256::digest(data.as_ref()))
}
