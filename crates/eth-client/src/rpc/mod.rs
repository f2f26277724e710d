//! JSON-RPC access to an EVM node.
//!
//! # Data Flow
//! ```text
//! RpcClient (typed operation)
//!     → RpcRequest { method, params }
//!     → Transport (host-provided: HTTP, WebSocket, in-memory)
//!     → RpcResponse { result | error }
//!     → typed result or EthError::{Rpc, Transport, Encoding}
//! ```

pub mod client;
pub mod quantity;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::RpcClient;
pub use transport::{RpcErrorObject, RpcRequest, RpcResponse, Transport};
pub use types::{
    Block, BlockNumber, CallRequest, Log, LogFilter, Receipt, ReceiptStatus, TransactionInfo,
};
