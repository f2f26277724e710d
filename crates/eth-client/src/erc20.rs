//! ERC-20 token access on top of [`ContractProxy`].

use alloy_primitives::{B256, U256};

use crate::abi::{self, AbiValue, ContractInterface};
use crate::address::Address;
use crate::config::ClientConfig;
use crate::contract::ContractProxy;
use crate::error::EthError;
use crate::keys::Account;
use crate::rpc::RpcClient;
use crate::submit::SendOptions;
use crate::units;

/// The standard ERC-20 interface, functions and events.
pub const ERC20_ABI: &str = r#"[
  {"type":"function","name":"name","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"symbol","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"decimals","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint8"}]},
  {"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"balance","type":"uint256"}]},
  {"type":"function","name":"allowance","stateMutability":"view","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"transfer","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"transferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"event","name":"Transfer","anonymous":false,"inputs":[{"name":"from","type":"address","indexed":true},{"name":"to","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]},
  {"type":"event","name":"Approval","anonymous":false,"inputs":[{"name":"owner","type":"address","indexed":true},{"name":"spender","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]}
]"#;

/// Token metadata read from the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// In base units.
    pub total_supply: U256,
}

impl TokenInfo {
    /// Total supply in whole tokens, e.g. `"1000000.0"`.
    pub fn formatted_supply(&self) -> Result<String, EthError> {
        units::format_units(self.total_supply, self.decimals)
    }
}

pub fn interface() -> Result<ContractInterface, EthError> {
    ContractInterface::from_json(ERC20_ABI)
}

/// A proxy for the token at `address`.
pub fn token(address: Address, rpc: RpcClient, config: ClientConfig) -> Result<ContractProxy, EthError> {
    Ok(ContractProxy::new(address, interface()?, rpc, config))
}

/// Reads name, symbol, decimals and total supply.
pub async fn token_info(token: &ContractProxy) -> Result<TokenInfo, EthError> {
    let name = single(token.call("name", &[]).await?, "name")?;
    let symbol = single(token.call("symbol", &[]).await?, "symbol")?;
    let decimals = single(token.call("decimals", &[]).await?, "decimals")?;
    let total_supply = single(token.call("totalSupply", &[]).await?, "totalSupply")?;

    let decimals = decimals
        .as_uint()
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| EthError::AbiDecode(format!("decimals returned {decimals:?}")))?;

    Ok(TokenInfo {
        address: token.address(),
        name: as_string(name, "name")?,
        symbol: as_string(symbol, "symbol")?,
        decimals,
        total_supply: as_uint(total_supply, "totalSupply")?,
    })
}

/// Token balance of `owner` in base units.
pub async fn balance_of(token: &ContractProxy, owner: Address) -> Result<U256, EthError> {
    let out = token.call("balanceOf", &[owner.into()]).await?;
    as_uint(single(out, "balanceOf")?, "balanceOf")
}

pub async fn allowance(token: &ContractProxy, owner: Address, spender: Address) -> Result<U256, EthError> {
    let out = token
        .call("allowance", &[owner.into(), spender.into()])
        .await?;
    as_uint(single(out, "allowance")?, "allowance")
}

/// Sends `amount` base units to `to`, returning the transaction hash.
pub async fn transfer(
    token: &ContractProxy,
    account: &Account,
    to: Address,
    amount: U256,
    options: SendOptions,
) -> Result<B256, EthError> {
    token
        .send("transfer", &[to.into(), amount.into()], account, options)
        .await
}

/// Encodes an ERC-20 `transfer(address,uint256)` call.
pub fn encode_transfer(to: Address, amount: U256) -> Result<Vec<u8>, EthError> {
    encode("transfer", &[to.into(), amount.into()])
}

/// Encodes an ERC-20 `approve(address,uint256)` call.
pub fn encode_approve(spender: Address, amount: U256) -> Result<Vec<u8>, EthError> {
    encode("approve", &[spender.into(), amount.into()])
}

/// Encodes an ERC-20 `balanceOf(address)` call.
pub fn encode_balance_of(owner: Address) -> Result<Vec<u8>, EthError> {
    encode("balanceOf", &[owner.into()])
}

fn encode(function: &str, args: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    let iface = interface()?;
    abi::encode_call(iface.function(function)?, args)
}

fn single(mut values: Vec<AbiValue>, function: &str) -> Result<AbiValue, EthError> {
    if values.len() != 1 {
        return Err(EthError::AbiDecode(format!(
            "{function} returned {} values, expected 1",
            values.len()
        )));
    }
    Ok(values.remove(0))
}

fn as_string(value: AbiValue, function: &str) -> Result<String, EthError> {
    match value {
        AbiValue::String(s) => Ok(s),
        other => Err(EthError::AbiDecode(format!(
            "{function} returned {other:?}, expected a string"
        ))),
    }
}

fn as_uint(value: AbiValue, function: &str) -> Result<U256, EthError> {
    value.as_uint().ok_or_else(|| {
        EthError::AbiDecode(format!("{function} returned {value:?}, expected a uint"))
    })
}
