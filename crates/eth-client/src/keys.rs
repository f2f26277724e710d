//! Account key material.
//!
//! An [`Account`] only exists as the result of deriving it from a secret
//! scalar, so its address can never drift from its key.

use std::fmt;

use k256::ecdsa::SigningKey;
use k256::{PublicKey, SecretKey};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::address::Address;
use crate::error::EthError;

/// A secp256k1 key pair plus its derived address.
#[derive(Clone)]
pub struct Account {
    secret: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Account {
    /// Draws a fresh private key from the operating system CSPRNG.
    ///
    /// Candidates equal to zero or not below the curve order are rejected and
    /// redrawn.
    pub fn generate() -> Self {
        loop {
            let mut candidate = Zeroizing::new([0u8; 32]);
            OsRng.fill_bytes(candidate.as_mut());

            if let Ok(secret) = SecretKey::from_bytes((&*candidate).into()) {
                let account = Self::from_secret(secret);
                tracing::debug!(address = %account.address, "generated account");
                return account;
            }
        }
    }

    /// Derives an account from a raw 32-byte big-endian scalar.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, EthError> {
        let raw: &[u8; 32] = bytes.try_into().map_err(|_| {
            EthError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;

        let secret = SecretKey::from_bytes(raw.into()).map_err(|_| {
            EthError::InvalidKey("scalar is zero or not below the curve order".into())
        })?;

        Ok(Self::from_secret(secret))
    }

    /// Derives an account from a hex private key, with or without `0x`.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, EthError> {
        let key_hex = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);

        let bytes = Zeroizing::new(
            hex::decode(key_hex).map_err(|e| EthError::InvalidKey(format!("invalid hex: {e}")))?,
        );
        Self::from_private_key(&bytes)
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public_key = secret.public_key();
        let address = Address::from_public_key(&public_key);
        Self {
            secret,
            public_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    /// The raw scalar. Wiped when the returned value is dropped.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// `0x`-prefixed hex of the raw scalar.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.private_key_bytes())))
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.public_key == other.public_key
    }
}

impl Eq for Account {}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// The two-field record a host persists for an account.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyRecord {
    pub address: String,
    #[serde(alias = "privateKey")]
    pub private_key: String,
}

impl KeyRecord {
    pub fn from_account(account: &Account) -> Self {
        Self {
            address: account.address().to_checksum(),
            private_key: account.private_key_hex().as_str().to_owned(),
        }
    }

    pub fn to_json(&self) -> Result<String, EthError> {
        serde_json::to_string(self).map_err(|e| EthError::Encoding(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, EthError> {
        serde_json::from_str(json).map_err(|e| EthError::Encoding(e.to_string()))
    }

    /// Re-derives the account and checks that the stored address belongs to
    /// the stored key.
    pub fn into_account(self) -> Result<Account, EthError> {
        let account = Account::from_hex(&self.private_key)?;
        let stored = Address::parse(&self.address)?;

        if stored != account.address() {
            return Err(EthError::InvalidKey(format!(
                "record address {stored} does not match key address {}",
                account.address()
            )));
        }

        Ok(account)
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
