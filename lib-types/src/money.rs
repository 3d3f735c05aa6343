//! Decimal money helpers
//!
//! Amounts are stored as integer minor units; these helpers convert to and
//! from the two-decimal notation used at the edges (CLI, notifications).

use crate::errors::PrimitiveError;
use crate::primitives::Amount;

/// Number of decimal places carried by `Amount`
pub const MINOR_UNIT_DECIMALS: u32 = 2;

/// Minor units per whole unit
pub const MINOR_UNITS_PER_UNIT: Amount = 100;

/// Parse a non-negative decimal string ("100", "100.5", "100.25") into minor units
pub fn parse_amount(input: &str) -> Result<Amount, PrimitiveError> {
    let trimmed = input.trim();
    let invalid = |reason: &'static str| PrimitiveError::InvalidAmount {
        input: input.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("only digits and a single '.' are allowed"));
    }
    if fraction.len() > MINOR_UNIT_DECIMALS as usize {
        return Err(invalid("more than 2 decimal places"));
    }

    let whole_units: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("out of range"))?
    };

    let mut fraction_units: Amount = if fraction.is_empty() {
        0
    } else {
        fraction.parse().map_err(|_| invalid("out of range"))?
    };
    // "1.5" means 50 minor units
    for _ in fraction.len()..MINOR_UNIT_DECIMALS as usize {
        fraction_units *= 10;
    }

    whole_units
        .checked_mul(MINOR_UNITS_PER_UNIT)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(|| invalid("out of range"))
}

/// Format minor units as a two-decimal string
pub fn format_amount(amount: Amount) -> String {
    format!(
        "{}.{:02}",
        amount / MINOR_UNITS_PER_UNIT,
        amount % MINOR_UNITS_PER_UNIT
    )
}
