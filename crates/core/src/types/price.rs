//! Monetary amounts for ledger snapshots.
//!
//! Costs and prices are plain `Decimal` values in the store's currency,
//! rounded to two decimal places with halves rounding away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Errors that can occur when parsing a cost input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CostError {
    /// The input is not a decimal number.
    #[error("cost must be a decimal number (got {0:?})")]
    NotADecimal(String),
    /// The input is negative.
    #[error("cost cannot be negative (got {0})")]
    Negative(Decimal),
}

/// Round an amount to two decimal places.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse an operator-entered cost.
///
/// Blank input means zero. The result is rounded to two decimal places.
///
/// # Errors
///
/// Returns an error if the input is not a decimal number or is negative.
///
/// # Example
///
/// ```
/// use bodega_core::parse_cost;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_cost("").unwrap(), Decimal::ZERO);
/// assert_eq!(parse_cost("10.005").unwrap(), Decimal::new(1001, 2));
/// assert!(parse_cost("-1").is_err());
/// ```
pub fn parse_cost(input: &str) -> Result<Decimal, CostError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let value: Decimal = trimmed
        .parse()
        .map_err(|_| CostError::NotADecimal(trimmed.to_owned()))?;

    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if value.is_sign_negative() {
        return Err(CostError::Negative(value));
    }

    Ok(round_money(value))
}

/// Extended amount for a ledger line (`quantity × unit amount`).
#[must_use]
pub fn line_total(quantity: i32, unit: Decimal) -> Decimal {
    Decimal::from(quantity) * unit
}
