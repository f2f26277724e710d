//! Client engine for EVM chains.
//!
//! This crate provides:
//! - secp256k1 account management with EIP-55 checksummed addresses
//! - Legacy transaction building and EIP-155 signing
//! - Solidity ABI encoding/decoding driven by JSON contract interfaces
//! - A typed JSON-RPC client over a pluggable async transport
//! - Contract calls, sends, deployment, receipt polling and event queries
//! - ERC-20 helpers and decimal unit conversion
//!
//! # Data Flow
//! ```text
//! Account ──► TransactionBuilder ──► signer::sign ──► RpcClient::send_raw_transaction
//!                   ▲                                         │
//!      abi::encode_call (ContractProxy)          contract::wait_for_receipt
//! ```

pub mod abi;
pub mod address;
pub mod config;
pub mod contract;
pub mod erc20;
pub mod error;
pub mod hash;
pub mod keys;
pub mod rpc;
pub mod signer;
pub mod submit;
pub mod transaction;
pub mod units;

pub use abi::{AbiEntry, AbiValue, ContractInterface, DecodedLog, IndexedValue, ParamType};
pub use address::{checksum_address, validate_address, Address};
pub use config::ClientConfig;
pub use contract::{wait_for_receipt, ContractProxy};
pub use error::{EthError, TransportError};
pub use keys::{Account, KeyRecord};
pub use rpc::{RpcClient, Transport};
pub use signer::{recover_sender, serialize, sign, SignedTransaction};
pub use submit::{transfer, SendOptions};
pub use transaction::{TransactionBuilder, UnsignedTransaction};
