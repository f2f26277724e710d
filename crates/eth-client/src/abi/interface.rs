use std::collections::HashMap;

use alloy_primitives::B256;
use serde::Deserialize;

use super::codec;
use super::event::{self, DecodedLog};
use super::param_type::ParamType;
use super::value::AbiValue;
use crate::error::EthError;
use crate::hash::keccak256;
use crate::rpc::Log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Function,
    Event,
    Constructor,
    Fallback,
    Receive,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

/// One input or output of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiParam {
    pub name: String,
    pub kind: ParamType,
    /// Only meaningful for event inputs.
    pub indexed: bool,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            indexed: false,
        }
    }

    pub fn indexed(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            indexed: true,
            ..Self::new(name, kind)
        }
    }
}

/// A function, event, constructor or other member of a contract ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiEntry {
    pub name: String,
    pub kind: EntryKind,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub state_mutability: StateMutability,
    /// Anonymous events do not emit their signature hash as topic 0.
    pub anonymous: bool,
}

impl AbiEntry {
    /// A function from Solidity type strings, with unnamed parameters.
    pub fn function(name: &str, inputs: &[&str], outputs: &[&str]) -> Result<Self, EthError> {
        Ok(Self {
            name: name.to_string(),
            kind: EntryKind::Function,
            inputs: unnamed_params(inputs)?,
            outputs: unnamed_params(outputs)?,
            state_mutability: StateMutability::NonPayable,
            anonymous: false,
        })
    }

    pub fn constructor(inputs: &[&str]) -> Result<Self, EthError> {
        Ok(Self {
            name: String::new(),
            kind: EntryKind::Constructor,
            inputs: unnamed_params(inputs)?,
            outputs: Vec::new(),
            state_mutability: StateMutability::NonPayable,
            anonymous: false,
        })
    }

    pub fn event(name: &str, inputs: Vec<AbiParam>) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Event,
            inputs,
            outputs: Vec::new(),
            state_mutability: StateMutability::NonPayable,
            anonymous: false,
        }
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(|p| p.kind.to_string()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// First 4 bytes of the Keccak-256 of the signature.
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Full Keccak-256 of the signature; topic 0 of non-anonymous events.
    pub fn topic(&self) -> B256 {
        keccak256(self.signature())
    }

    pub fn input_types(&self) -> Vec<ParamType> {
        self.inputs.iter().map(|p| p.kind.clone()).collect()
    }

    pub fn output_types(&self) -> Vec<ParamType> {
        self.outputs.iter().map(|p| p.kind.clone()).collect()
    }

    /// `view` and `pure` functions are answered by `eth_call`.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self.state_mutability,
            StateMutability::View | StateMutability::Pure
        )
    }

    pub fn is_payable(&self) -> bool {
        self.state_mutability == StateMutability::Payable
    }
}

fn unnamed_params(types: &[&str]) -> Result<Vec<AbiParam>, EthError> {
    types
        .iter()
        .map(|t| Ok(AbiParam::new("", ParamType::parse(t)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// JSON loading
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Entries(Vec<RawEntry>),
    /// Build artifacts wrap the ABI in an object.
    Artifact { abi: Vec<RawEntry> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(rename = "type", default)]
    kind: EntryKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    state_mutability: Option<StateMutability>,
    constant: Option<bool>,
    payable: Option<bool>,
    #[serde(default)]
    anonymous: bool,
}

#[derive(Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<RawParam>,
    #[serde(default)]
    indexed: bool,
}

impl RawParam {
    fn resolve(&self) -> Result<ParamType, EthError> {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let members = self
                    .components
                    .iter()
                    .map(RawParam::resolve)
                    .collect::<Result<Vec<_>, _>>()?;
                ParamType::tuple(members)?.with_array_suffix(suffix)
            }
            None => ParamType::parse(&self.ty),
        }
    }

    fn into_param(self) -> Result<AbiParam, EthError> {
        Ok(AbiParam {
            kind: self.resolve()?,
            name: self.name,
            indexed: self.indexed,
        })
    }
}

impl TryFrom<RawEntry> for AbiEntry {
    type Error = EthError;

    fn try_from(raw: RawEntry) -> Result<Self, EthError> {
        // Pre-0.4.16 compilers emit `constant`/`payable` instead of
        // `stateMutability`.
        let state_mutability = match (raw.state_mutability, raw.payable, raw.constant) {
            (Some(sm), _, _) => sm,
            (None, Some(true), _) => StateMutability::Payable,
            (None, _, Some(true)) => StateMutability::View,
            _ => StateMutability::NonPayable,
        };

        Ok(Self {
            name: raw.name,
            kind: raw.kind,
            inputs: raw
                .inputs
                .into_iter()
                .map(RawParam::into_param)
                .collect::<Result<_, _>>()?,
            outputs: raw
                .outputs
                .into_iter()
                .map(RawParam::into_param)
                .collect::<Result<_, _>>()?,
            state_mutability,
            anonymous: raw.anonymous,
        })
    }
}

// ---------------------------------------------------------------------------
// ContractInterface
// ---------------------------------------------------------------------------

/// A parsed contract ABI with lookup tables for functions and events.
///
/// Overloads are kept side by side: lookups by bare name fail with
/// `AmbiguousEntry` when more than one entry carries that name, and lookups
/// by canonical signature always resolve to exactly one.
#[derive(Debug, Clone, Default)]
pub struct ContractInterface {
    entries: Vec<AbiEntry>,
    functions_by_name: HashMap<String, Vec<usize>>,
    functions_by_signature: HashMap<String, usize>,
    functions_by_selector: HashMap<[u8; 4], Vec<usize>>,
    events_by_name: HashMap<String, Vec<usize>>,
    events_by_signature: HashMap<String, usize>,
    events_by_topic: HashMap<B256, Vec<usize>>,
    constructor: Option<usize>,
}

impl ContractInterface {
    pub fn new(entries: Vec<AbiEntry>) -> Self {
        let mut iface = ContractInterface {
            entries,
            ..Default::default()
        };

        for (i, entry) in iface.entries.iter().enumerate() {
            match entry.kind {
                EntryKind::Function => {
                    iface
                        .functions_by_name
                        .entry(entry.name.clone())
                        .or_default()
                        .push(i);
                    iface
                        .functions_by_signature
                        .entry(entry.signature())
                        .or_insert(i);
                    iface
                        .functions_by_selector
                        .entry(entry.selector())
                        .or_default()
                        .push(i);
                }
                EntryKind::Event => {
                    iface
                        .events_by_name
                        .entry(entry.name.clone())
                        .or_default()
                        .push(i);
                    iface.events_by_signature.entry(entry.signature()).or_insert(i);
                    if !entry.anonymous {
                        iface.events_by_topic.entry(entry.topic()).or_default().push(i);
                    }
                }
                EntryKind::Constructor => {
                    iface.constructor.get_or_insert(i);
                }
                EntryKind::Fallback | EntryKind::Receive | EntryKind::Error => {}
            }
        }

        iface
    }

    /// Parses a JSON ABI: either a bare array of entries or a build artifact
    /// object with an `abi` field.
    pub fn from_json(json: &str) -> Result<Self, EthError> {
        let raw: RawDocument = serde_json::from_str(json)
            .map_err(|e| EthError::Encoding(format!("invalid ABI json: {e}")))?;
        let raw = match raw {
            RawDocument::Entries(entries) | RawDocument::Artifact { abi: entries } => entries,
        };
        let entries = raw
            .into_iter()
            .map(AbiEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    /// Looks up a function by bare name (`transfer`) or canonical signature
    /// (`transfer(address,uint256)`).
    pub fn function(&self, name_or_signature: &str) -> Result<&AbiEntry, EthError> {
        self.lookup(
            name_or_signature,
            &self.functions_by_signature,
            &self.functions_by_name,
            "function",
        )
    }

    /// Every overload named `name`.
    pub fn functions_named(&self, name: &str) -> Vec<&AbiEntry> {
        self.resolve(self.functions_by_name.get(name))
    }

    /// Every function whose selector is `selector`. More than one entry means
    /// a selector collision.
    pub fn functions_by_selector(&self, selector: [u8; 4]) -> Vec<&AbiEntry> {
        self.resolve(self.functions_by_selector.get(&selector))
    }

    pub fn event(&self, name_or_signature: &str) -> Result<&AbiEntry, EthError> {
        self.lookup(
            name_or_signature,
            &self.events_by_signature,
            &self.events_by_name,
            "event",
        )
    }

    /// Non-anonymous events whose signature hash is `topic`.
    pub fn events_by_topic(&self, topic: B256) -> Vec<&AbiEntry> {
        self.resolve(self.events_by_topic.get(&topic))
    }

    pub fn constructor(&self) -> Option<&AbiEntry> {
        self.constructor.map(|i| &self.entries[i])
    }

    /// Identifies the function called by `data` and decodes its arguments.
    ///
    /// When several functions share the selector, the ones whose input types
    /// reject the payload are discarded; if more than one still decodes, the
    /// call is `AmbiguousEntry`.
    pub fn decode_call_data(&self, data: &[u8]) -> Result<(&AbiEntry, Vec<AbiValue>), EthError> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| EthError::AbiDecode("call data shorter than a selector".into()))?;

        let candidates = self.functions_by_selector(selector);
        if candidates.is_empty() {
            return Err(EthError::UnknownEntry(format!(
                "no function with selector 0x{}",
                hex::encode(selector)
            )));
        }

        pick_unique(candidates, |entry| codec::decode_input(entry, data))
    }

    /// Identifies the event that emitted `log` by its first topic and decodes
    /// it. Anonymous events cannot be identified this way.
    pub fn decode_log(&self, log: &Log) -> Result<(&AbiEntry, DecodedLog), EthError> {
        let topic0 = log
            .topics
            .first()
            .ok_or_else(|| EthError::UnknownEntry("log has no topics".into()))?;

        let candidates = self.events_by_topic(*topic0);
        if candidates.is_empty() {
            return Err(EthError::UnknownEntry(format!("no event with topic {topic0}")));
        }

        pick_unique(candidates, |entry| event::decode_log(entry, log))
    }

    fn lookup(
        &self,
        key: &str,
        by_signature: &HashMap<String, usize>,
        by_name: &HashMap<String, Vec<usize>>,
        what: &str,
    ) -> Result<&AbiEntry, EthError> {
        if key.contains('(') {
            let canonical = canonicalize_signature(key)?;
            return by_signature
                .get(&canonical)
                .map(|i| &self.entries[*i])
                .ok_or_else(|| EthError::UnknownEntry(format!("{what} {canonical}")));
        }

        match by_name.get(key).map(Vec::as_slice) {
            None | Some([]) => Err(EthError::UnknownEntry(format!("{what} {key}"))),
            Some([only]) => Ok(&self.entries[*only]),
            Some(many) => Err(EthError::AmbiguousEntry {
                name: key.to_string(),
                candidates: many.iter().map(|i| self.entries[*i].signature()).collect(),
            }),
        }
    }

    fn resolve(&self, indices: Option<&Vec<usize>>) -> Vec<&AbiEntry> {
        indices
            .map(|v| v.iter().map(|i| &self.entries[*i]).collect())
            .unwrap_or_default()
    }
}

/// Applies `decode` to each candidate and keeps the single success.
fn pick_unique<'a, T>(
    candidates: Vec<&'a AbiEntry>,
    decode: impl Fn(&AbiEntry) -> Result<T, EthError>,
) -> Result<(&'a AbiEntry, T), EthError> {
    let mut matches = Vec::new();
    let mut last_err = None;

    for entry in candidates {
        match decode(entry) {
            Ok(decoded) => matches.push((entry, decoded)),
            Err(e) => last_err = Some(e),
        }
    }

    match matches.len() {
        0 => Err(last_err.unwrap_or_else(|| EthError::AbiDecode("no candidate decoded".into()))),
        1 => Ok(matches.remove(0)),
        _ => Err(EthError::AmbiguousEntry {
            name: matches[0].0.name.clone(),
            candidates: matches.iter().map(|(e, _)| e.signature()).collect(),
        }),
    }
}

/// Normalizes `name( uint , address[] )` style input to the canonical form
/// used as a map key, expanding `uint`/`int` aliases.
fn canonicalize_signature(signature: &str) -> Result<String, EthError> {
    let open = signature
        .find('(')
        .ok_or_else(|| EthError::UnknownEntry(signature.to_string()))?;
    let name = signature[..open].trim();
    let params = ParamType::parse(&signature[open..])
        .map_err(|_| EthError::UnknownEntry(signature.to_string()))?;
    match params {
        ParamType::Tuple(_) => {
            let rendered = params.to_string();
            Ok(format!("{name}{rendered}"))
        }
        _ => Err(EthError::UnknownEntry(signature.to_string())),
    }
}
