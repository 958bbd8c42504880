//! Amount normalization.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::text::fold_width;
use crate::error::NormalizeError;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
}

/// Thousands separators and spacing removed before reading the number.
const SEPARATORS: [char; 4] = [',', ' ', '\u{00a0}', '\''];

/// Read the number in an amount string, ignoring separators and currency or
/// unit glyphs (`¥`, `元`, `万元`, `RMB`, ...).
pub fn parse_amount(raw: &str) -> Result<Decimal, NormalizeError> {
    let cleaned: String = fold_width(raw)
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect();

    let number = NUMBER
        .find(&cleaned)
        .ok_or_else(|| NormalizeError::NotAnAmount(raw.trim().to_string()))?;

    Decimal::from_str(number.as_str()).map_err(|_| NormalizeError::NotAnAmount(raw.trim().to_string()))
}

/// Parse, scale by `unit_multiplier`, reject non-positive, round to cents.
pub fn normalize_amount(raw: &str, unit_multiplier: Option<Decimal>) -> Result<Decimal, NormalizeError> {
    let mut amount = parse_amount(raw)?;
    if let Some(multiplier) = unit_multiplier {
        amount *= multiplier;
    }

    if amount <= Decimal::ZERO {
        return Err(NormalizeError::NonPositive(amount));
    }

    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    Ok(rounded)
}
