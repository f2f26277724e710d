//! Conversion between decimal amounts and base-unit integers (wei, token
//! base units).

use alloy_primitives::utils::{self, ParseUnits, Unit};
use alloy_primitives::U256;

use crate::error::EthError;

pub const ETHER_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

/// Parses a decimal string such as `"1.5"` into base units with `decimals`
/// fractional digits.
///
/// Signs, exponents and separators are rejected, as is any non-zero digit
/// beyond the representable precision.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, EthError> {
    unit(decimals)?;
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err(EthError::InvalidAmount(format!("{amount:?} has no digits")));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(EthError::InvalidAmount(format!(
            "{amount:?} is not a plain decimal number"
        )));
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(EthError::InvalidAmount(format!(
            "{amount:?} has more than {decimals} decimal places"
        )));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    };
    match utils::parse_units(&normalized, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(EthError::InvalidAmount(format!(
            "{amount:?} is negative"
        ))),
        Err(e) => Err(EthError::InvalidAmount(format!("{amount:?}: {e}"))),
    }
}

/// Renders base units as a decimal string, keeping at least one fractional
/// digit: `1_500_000_000_000_000_000` at 18 decimals is `"1.5"`, one ether is
/// `"1.0"`. With zero decimals the plain integer is returned.
pub fn format_units(value: U256, decimals: u8) -> Result<String, EthError> {
    let unit = unit(decimals)?;
    if decimals == 0 {
        return Ok(value.to_string());
    }
    Ok(format_with(value, unit))
}

pub fn parse_ether(amount: &str) -> Result<U256, EthError> {
    parse_units(amount, ETHER_DECIMALS)
}

pub fn format_ether(wei: U256) -> String {
    format_with(wei, Unit::ETHER)
}

pub fn parse_gwei(amount: &str) -> Result<U256, EthError> {
    parse_units(amount, GWEI_DECIMALS)
}

pub fn format_gwei(wei: U256) -> String {
    format_with(wei, Unit::GWEI)
}

fn unit(decimals: u8) -> Result<Unit, EthError> {
    Unit::new(decimals).ok_or_else(|| {
        EthError::InvalidAmount(format!("{decimals} decimals is beyond the largest unit"))
    })
}

/// Formats with `unit`, dropping trailing fractional zeros down to one.
fn format_with(value: U256, unit: Unit) -> String {
    let mut text = ParseUnits::U256(value).format_units(unit);
    if text.contains('.') {
        let kept = text.trim_end_matches('0').len();
        text.truncate(kept);
        if text.ends_with('.') {
            text.push('0');
        }
    }
    text
}
