//! Contract ABI: JSON interface loading, call data encoding, return data and
//! event log decoding.
//!
//! ```text
//! ABI JSON ──► ContractInterface ──► AbiEntry ──► encode_call ──► call data
//!                                       │
//!              return data / logs ──────┴──► decode_return / decode_log
//! ```

pub mod codec;
pub mod event;
pub mod interface;
pub mod param_type;
pub mod value;

pub use codec::{decode_input, decode_return, encode_call};
pub use event::{decode_log, encode_topic, DecodedLog, IndexedValue};
pub use interface::{AbiEntry, AbiParam, ContractInterface, EntryKind, StateMutability};
pub use param_type::ParamType;
pub use value::AbiValue;
