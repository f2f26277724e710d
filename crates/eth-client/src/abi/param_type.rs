use std::fmt;

use crate::error::EthError;

/// A Solidity ABI type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Address,
    Bool,
    /// `uint<N>`, N in 8..=256 in steps of 8.
    Uint(usize),
    /// `int<N>`, N in 8..=256 in steps of 8.
    Int(usize),
    /// `bytes<N>`, N in 1..=32.
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<ParamType>),
    /// `T[k]`
    FixedArray(Box<ParamType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Parses a Solidity type string such as `uint256`, `bytes32[]`,
    /// `(address,uint256)[2]`. `uint`/`int` are aliases of the 256-bit types.
    pub fn parse(s: &str) -> Result<Self, EthError> {
        let s = s.trim();

        if s.ends_with(']') {
            let open = s
                .rfind('[')
                .ok_or_else(|| invalid_type(s, "unbalanced brackets"))?;
            let inner = ParamType::parse(&s[..open])?;
            return inner.with_array_suffix(&s[open..]);
        }

        if let Some(body) = s.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            let members = split_top_level(body)
                .into_iter()
                .map(ParamType::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return ParamType::tuple(members);
        }

        match s {
            "address" => return Ok(ParamType::Address),
            "bool" => return Ok(ParamType::Bool),
            "string" => return Ok(ParamType::String),
            "bytes" => return Ok(ParamType::Bytes),
            "uint" => return Ok(ParamType::Uint(256)),
            "int" => return Ok(ParamType::Int(256)),
            // External function pointer: address ++ selector.
            "function" => return Ok(ParamType::FixedBytes(24)),
            _ => {}
        }

        if let Some(bits) = s.strip_prefix("uint") {
            return Ok(ParamType::Uint(parse_int_width(s, bits)?));
        }
        if let Some(bits) = s.strip_prefix("int") {
            return Ok(ParamType::Int(parse_int_width(s, bits)?));
        }
        if let Some(len) = s.strip_prefix("bytes") {
            let len: usize = len
                .parse()
                .map_err(|_| invalid_type(s, "bad byte length"))?;
            if !(1..=32).contains(&len) {
                return Err(invalid_type(s, "byte length must be 1..=32"));
            }
            return Ok(ParamType::FixedBytes(len));
        }

        Err(invalid_type(s, "unknown type"))
    }

    /// A tuple of `members`. Empty tuples have no encoding and are rejected.
    pub fn tuple(members: Vec<ParamType>) -> Result<Self, EthError> {
        if members.is_empty() {
            return Err(invalid_type("()", "tuple has no components"));
        }
        Ok(ParamType::Tuple(members))
    }

    /// Wraps `self` in the array dimensions of `suffix`, read left to right:
    /// `"[2][]"` on `uint8` gives `uint8[2][]`.
    pub fn with_array_suffix(self, suffix: &str) -> Result<Self, EthError> {
        let mut ty = self;
        let mut rest = suffix;

        while !rest.is_empty() {
            let body = rest
                .strip_prefix('[')
                .ok_or_else(|| invalid_type(suffix, "expected '['"))?;
            let close = body
                .find(']')
                .ok_or_else(|| invalid_type(suffix, "unbalanced brackets"))?;
            let size = &body[..close];

            ty = if size.is_empty() {
                ParamType::Array(Box::new(ty))
            } else {
                let n: usize = size
                    .parse()
                    .map_err(|_| invalid_type(suffix, "bad array length"))?;
                if n == 0 {
                    return Err(invalid_type(suffix, "fixed array length must be non-zero"));
                }
                ParamType::FixedArray(Box::new(ty), n)
            };
            rest = &body[close + 1..];
        }

        Ok(ty)
    }

    /// Dynamic types are encoded out of line, behind an offset.
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(members) => members.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    /// Elementary static types that fit a single word and are stored
    /// verbatim as event topics.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            ParamType::Address
                | ParamType::Bool
                | ParamType::Uint(_)
                | ParamType::Int(_)
                | ParamType::FixedBytes(_)
        )
    }

    /// Bytes this type occupies in the head of an enclosing tuple, or `None`
    /// when that does not fit in a `usize`.
    pub fn head_size(&self) -> Option<usize> {
        if self.is_dynamic() {
            return Some(32);
        }
        match self {
            ParamType::FixedArray(inner, n) => inner.head_size()?.checked_mul(*n),
            ParamType::Tuple(members) => sum_head_sizes(members),
            _ => Some(32),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => f.write_str("address"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Uint(bits) => write!(f, "uint{bits}"),
            ParamType::Int(bits) => write!(f, "int{bits}"),
            ParamType::FixedBytes(len) => write!(f, "bytes{len}"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::String => f.write_str("string"),
            ParamType::Array(inner) => write!(f, "{inner}[]"),
            ParamType::FixedArray(inner, n) => write!(f, "{inner}[{n}]"),
            ParamType::Tuple(members) => {
                f.write_str("(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{m}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Total head size of a sequence of types.
pub(crate) fn sum_head_sizes(types: &[ParamType]) -> Option<usize> {
    types
        .iter()
        .try_fold(0usize, |total, ty| total.checked_add(ty.head_size()?))
}

fn parse_int_width(full: &str, bits: &str) -> Result<usize, EthError> {
    let bits: usize = bits
        .parse()
        .map_err(|_| invalid_type(full, "bad integer width"))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(invalid_type(full, "integer width must be a multiple of 8 in 8..=256"));
    }
    Ok(bits)
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn invalid_type(s: &str, reason: &str) -> EthError {
    EthError::Encoding(format!("invalid solidity type {s:?}: {reason}"))
}
