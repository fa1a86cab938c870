//! Quantity input as entered by an operator.
//!
//! Requests may carry quantities either as JSON integers or as strings
//! (form fields, spreadsheet cells). [`QuantityInput`] accepts both and
//! offers two interpretations: [`QuantityInput::requested`] for ingest,
//! where blank and non-positive values mean "nothing requested", and
//! [`QuantityInput::exact`] for edits, where the value must be a
//! non-negative integer.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when interpreting a [`QuantityInput`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// A quantity was required but the input is blank.
    #[error("quantity is required")]
    Blank,
    /// The input is not a whole number.
    #[error("quantity must be a whole number (got {0:?})")]
    NotAnInteger(String),
    /// The input is negative where only non-negative values are allowed.
    #[error("quantity cannot be negative (got {0})")]
    Negative(i64),
    /// The input does not fit in a stock counter.
    #[error("quantity {0} is out of range")]
    OutOfRange(i64),
}

/// A quantity as supplied by a caller, either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    /// A JSON integer.
    Integer(i64),
    /// Free text, trimmed before parsing. Blank means "no value".
    Text(String),
}

impl QuantityInput {
    /// Interpret the input as an ingest request.
    ///
    /// Returns `Ok(None)` for blank, zero or negative input (the entry is
    /// ignored) and `Ok(Some(n))` for a positive quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a whole number or the value does
    /// not fit in an `i32`.
    pub fn requested(&self) -> Result<Option<i32>, QuantityError> {
        let Some(value) = self.integer()? else {
            return Ok(None);
        };
        if value <= 0 {
            return Ok(None);
        }
        i32::try_from(value)
            .map(Some)
            .map_err(|_| QuantityError::OutOfRange(value))
    }

    /// Interpret the input as an exact, non-negative quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank, not a whole number, negative,
    /// or does not fit in an `i32`.
    pub fn exact(&self) -> Result<i32, QuantityError> {
        let value = self.integer()?.ok_or(QuantityError::Blank)?;
        if value < 0 {
            return Err(QuantityError::Negative(value));
        }
        i32::try_from(value).map_err(|_| QuantityError::OutOfRange(value))
    }

    fn integer(&self) -> Result<Option<i64>, QuantityError> {
        match self {
            Self::Integer(n) => Ok(Some(*n)),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| QuantityError::NotAnInteger(trimmed.to_owned()))
            }
        }
    }
}

impl From<i32> for QuantityInput {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<&str> for QuantityInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl fmt::Display for QuantityInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_ignores_blank_and_non_positive() {
        assert_eq!(QuantityInput::from("").requested(), Ok(None));
        assert_eq!(QuantityInput::from("   ").requested(), Ok(None));
        assert_eq!(QuantityInput::from("0").requested(), Ok(None));
        assert_eq!(QuantityInput::Integer(-3).requested(), Ok(None));
        assert_eq!(QuantityInput::from(" 7 ").requested(), Ok(Some(7)));
        assert_eq!(QuantityInput::from(5).requested(), Ok(Some(5)));
    }

    #[test]
    fn test_requested_rejects_malformed_text() {
        assert_eq!(
            QuantityInput::from("2.5").requested(),
            Err(QuantityError::NotAnInteger("2.5".to_string()))
        );
        assert_eq!(
            QuantityInput::Integer(i64::from(i32::MAX) + 1).requested(),
            Err(QuantityError::OutOfRange(i64::from(i32::MAX) + 1))
        );
    }

    #[test]
    fn test_exact_allows_zero_but_not_blank_or_negative() {
        assert_eq!(QuantityInput::from("0").exact(), Ok(0));
        assert_eq!(QuantityInput::from("12").exact(), Ok(12));
        assert_eq!(QuantityInput::from("").exact(), Err(QuantityError::Blank));
        assert_eq!(
            QuantityInput::Integer(-1).exact(),
            Err(QuantityError::Negative(-1))
        );
    }

    #[test]
    fn test_deserializes_numbers_and_strings() {
        let n: QuantityInput = serde_json::from_str("4").unwrap();
        let s: QuantityInput = serde_json::from_str("\"4\"").unwrap();
        assert_eq!(n.exact().unwrap(), s.exact().unwrap());
    }
}
