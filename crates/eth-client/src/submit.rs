//! The shared path from an unsigned transaction to a network hash.
//!
//! ```text
//! UnsignedTransaction → funds check → sign → serialize → eth_sendRawTransaction
//! ```

use alloy_primitives::{B256, U256};

use crate::address::Address;
use crate::error::EthError;
use crate::keys::Account;
use crate::rpc::RpcClient;
use crate::signer;
use crate::transaction::{TransactionBuilder, UnsignedTransaction};

/// Per-submission overrides. Unset fields are filled from configuration
/// defaults or from the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<U256>,
    /// Wei attached to the transaction.
    pub value: U256,
    pub nonce: Option<u64>,
}

impl SendOptions {
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Copies the overrides onto `builder`, using `default_gas_limit` when no
    /// gas limit was given.
    pub(crate) fn apply(
        &self,
        builder: TransactionBuilder,
        default_gas_limit: Option<u64>,
    ) -> TransactionBuilder {
        let mut builder = builder.value(self.value);
        if let Some(limit) = self.gas_limit.or(default_gas_limit) {
            builder = builder.gas_limit(limit);
        }
        if let Some(price) = self.gas_price {
            builder = builder.gas_price(price);
        }
        if let Some(nonce) = self.nonce {
            builder = builder.nonce(nonce);
        }
        builder
    }
}

/// Fails with `InsufficientFunds` unless `sender` can pay for the value and
/// the full gas allowance of `tx`.
pub async fn ensure_funds(
    rpc: &RpcClient,
    sender: Address,
    tx: &UnsignedTransaction,
) -> Result<(), EthError> {
    let required = tx.max_cost();
    let available = rpc.get_balance(sender).await?;

    if available < required {
        tracing::warn!(
            from = %sender,
            %required,
            %available,
            "insufficient funds for transaction"
        );
        return Err(EthError::InsufficientFunds {
            required,
            available,
        });
    }
    Ok(())
}

/// Checks funds, signs and submits `tx`, returning its hash.
pub async fn send_transaction(
    rpc: &RpcClient,
    account: &Account,
    tx: &UnsignedTransaction,
) -> Result<B256, EthError> {
    ensure_funds(rpc, account.address(), tx).await?;

    let signed = signer::sign(tx, account)?;
    let raw = signer::serialize(&signed);
    let hash = rpc.send_raw_transaction(&raw).await?;

    let local_hash = signed.hash();
    if hash != local_hash {
        tracing::warn!(node = %hash, local = %local_hash, "node reported a different transaction hash");
    }
    Ok(hash)
}

/// Sends `value` wei from `account` to `to`.
///
/// `options.value` is ignored in favour of `value`; the gas limit defaults to
/// the 21000 of a plain transfer.
#[tracing::instrument(skip(rpc, account, options), fields(from = %account.address()))]
pub async fn transfer(
    rpc: &RpcClient,
    account: &Account,
    to: Address,
    value: U256,
    chain_id: u64,
    options: SendOptions,
) -> Result<B256, EthError> {
    let builder = options
        .apply(TransactionBuilder::new(chain_id).to(to), None)
        .value(value);
    let tx = builder.build_with(account.address(), rpc).await?;
    send_transaction(rpc, account, &tx).await
}
