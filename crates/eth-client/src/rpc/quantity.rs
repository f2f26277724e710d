//! Serde helpers for JSON-RPC quantities (`0x`-prefixed, no leading zeros).

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn parse(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| format!("quantity {s:?} is missing the 0x prefix"))?;

    if digits.is_empty() {
        return Err("empty quantity".into());
    }
    // `from_str_radix` would accept a leading sign.
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("quantity {s:?} has non-hex digits"));
    }

    u64::from_str_radix(digits, 16).map_err(|e| format!("quantity {s:?}: {e}"))
}

pub fn format(value: u64) -> String {
    format!("{value:#x}")
}

pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(*value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(de::Error::custom)
}

pub mod opt {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| parse(&s).map_err(de::Error::custom)).transpose()
    }
}
