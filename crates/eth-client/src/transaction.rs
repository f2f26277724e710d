use alloy_primitives::{Bytes, U256};

use crate::address::Address;
use crate::error::EthError;
use crate::rpc::RpcClient;

/// Intrinsic gas of a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// An unsigned legacy (pre-EIP-2718) Ethereum transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    /// Transfer value in wei.
    pub value: U256,
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    pub chain_id: u64,
    /// Calldata, or init code for contract creation.
    pub data: Bytes,
}

impl UnsignedTransaction {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Upper bound on the wei this transaction can take from the sender:
    /// `value + gas_limit * gas_price`.
    pub fn max_cost(&self) -> U256 {
        self.value
            .saturating_add(U256::from(self.gas_limit).saturating_mul(self.gas_price))
    }
}

/// Assembles an [`UnsignedTransaction`].
///
/// Nonce and gas price can be left unset and filled from the node by
/// [`build_with`](TransactionBuilder::build_with).
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    chain_id: u64,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    nonce: Option<u64>,
    gas_price: Option<U256>,
    gas_limit: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Builds without touching the network.
    pub fn build(self) -> Result<UnsignedTransaction, EthError> {
        let nonce = self
            .nonce
            .ok_or_else(|| EthError::TransactionBuild("nonce not set".into()))?;
        let gas_price = self
            .gas_price
            .ok_or_else(|| EthError::TransactionBuild("gas price not set".into()))?;
        let gas_limit = self.resolve_gas_limit()?;

        Ok(UnsignedTransaction {
            nonce,
            to: self.to,
            value: self.value,
            gas_limit,
            gas_price,
            chain_id: self.chain_id,
            data: self.data,
        })
    }

    /// Builds, asking the node for whichever of nonce and gas price were not
    /// supplied.
    pub async fn build_with(
        mut self,
        sender: Address,
        rpc: &RpcClient,
    ) -> Result<UnsignedTransaction, EthError> {
        // Fail on gas before spending any round trips.
        self.resolve_gas_limit()?;

        if self.nonce.is_none() {
            self.nonce = Some(rpc.get_transaction_count(sender).await?);
        }
        if self.gas_price.is_none() {
            self.gas_price = Some(rpc.get_gas_price().await?);
        }

        let tx = self.build()?;
        tracing::debug!(
            from = %sender,
            nonce = tx.nonce,
            gas_limit = tx.gas_limit,
            gas_price = %tx.gas_price,
            "built transaction"
        );
        Ok(tx)
    }

    fn resolve_gas_limit(&self) -> Result<u64, EthError> {
        let plain_transfer = self.to.is_some() && self.data.is_empty();

        match (self.gas_limit, plain_transfer) {
            (Some(limit), true) if limit < TRANSFER_GAS => Err(EthError::InsufficientGasLimit {
                provided: limit,
                minimum: TRANSFER_GAS,
            }),
            (Some(limit), _) => Ok(limit),
            (None, true) => Ok(TRANSFER_GAS),
            (None, false) if self.to.is_none() => Err(EthError::TransactionBuild(
                "contract creation requires an explicit gas limit".into(),
            )),
            (None, false) => Err(EthError::TransactionBuild(
                "a call with data requires an explicit gas limit".into(),
            )),
        }
    }
}
