use std::time::Duration;

use serde::Deserialize;

use crate::error::EthError;
use crate::transaction::TRANSFER_GAS;

/// Sepolia testnet chain id.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Longest accepted `receipt_timeout_secs`, one day.
pub const MAX_RECEIPT_TIMEOUT_SECS: u64 = 86_400;

/// Client-wide settings.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration for Sepolia.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// EIP-155 chain id used when signing.
    pub chain_id: u64,
    /// Move oversized `extraData` of proof-of-authority headers aside instead
    /// of rejecting the block.
    pub normalize_poa_headers: bool,
    /// Upper bound on waiting for a receipt.
    pub receipt_timeout_secs: u64,
    /// Delay between receipt polls.
    pub poll_interval_ms: u64,
    /// Gas limit for contract calls when the caller supplies none.
    pub call_gas_limit: u64,
    /// Gas limit for deployments when the caller supplies none.
    pub deploy_gas_limit: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            normalize_poa_headers: true,
            receipt_timeout_secs: 120,
            poll_interval_ms: 1_000,
            call_gas_limit: 2_000_000,
            deploy_gas_limit: 3_000_000,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, EthError> {
        let config: ClientConfig =
            toml::from_str(source).map_err(|e| EthError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EthError> {
        if self.chain_id == 0 {
            return Err(EthError::Config("chain_id must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(EthError::Config("poll_interval_ms must be non-zero".into()));
        }
        if self.receipt_timeout_secs == 0 {
            return Err(EthError::Config(
                "receipt_timeout_secs must be non-zero".into(),
            ));
        }
        if self.receipt_timeout_secs > MAX_RECEIPT_TIMEOUT_SECS {
            return Err(EthError::Config(format!(
                "receipt_timeout_secs {} exceeds {MAX_RECEIPT_TIMEOUT_SECS}",
                self.receipt_timeout_secs
            )));
        }
        for (name, limit) in [
            ("call_gas_limit", self.call_gas_limit),
            ("deploy_gas_limit", self.deploy_gas_limit),
        ] {
            if limit < TRANSFER_GAS {
                return Err(EthError::Config(format!(
                    "{name} {limit} is below the {TRANSFER_GAS} intrinsic minimum"
                )));
            }
        }
        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
