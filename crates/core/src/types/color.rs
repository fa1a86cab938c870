//! Hex color key type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ColorKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorKeyError {
    /// The input string is empty.
    #[error("color key cannot be empty")]
    Empty,
    /// The input has the wrong number of hex digits.
    #[error("color key must have 3, 6 or 8 hex digits (got {0})")]
    InvalidLength(usize),
    /// The input contains a non-hex character.
    #[error("color key contains a non-hex character: {0:?}")]
    InvalidCharacter(char),
}

/// A product color key in hex notation (e.g. `#ff0000`).
///
/// Keys are normalized to lowercase with a leading `#`, so `FF0000`,
/// `#ff0000` and ` #Ff0000 ` all compare equal. Short (`#f00`) and long
/// (`#ff0000`) forms are kept as written and are *not* considered equal.
///
/// ## Examples
///
/// ```
/// use bodega_core::ColorKey;
///
/// let red = ColorKey::parse("FF0000").unwrap();
/// assert_eq!(red.as_str(), "#ff0000");
/// assert_eq!(red, ColorKey::parse("#ff0000").unwrap());
///
/// assert!(ColorKey::parse("").is_err());
/// assert!(ColorKey::parse("#zzz").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorKey(String);

impl ColorKey {
    /// Parse and normalize a color key.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, has a digit count other than
    /// 3, 6 or 8, or contains non-hex characters.
    pub fn parse(s: &str) -> Result<Self, ColorKeyError> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(ColorKeyError::Empty);
        }

        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorKeyError::InvalidCharacter(bad));
        }

        let len = digits.len();
        if !matches!(len, 3 | 6 | 8) {
            return Err(ColorKeyError::InvalidLength(len));
        }

        Ok(Self(format!("#{}", digits.to_ascii_lowercase())))
    }

    /// Returns the normalized key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ColorKey {
    type Err = ColorKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ColorKey {
    type Error = ColorKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ColorKey> for String {
    fn from(key: ColorKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ColorKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_prefix() {
        assert_eq!(ColorKey::parse("ABCDEF").unwrap().as_str(), "#abcdef");
        assert_eq!(ColorKey::parse("  #0f0 ").unwrap().as_str(), "#0f0");
        assert_eq!(ColorKey::parse("#11223344").unwrap().as_str(), "#11223344");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(ColorKey::parse(" "), Err(ColorKeyError::Empty));
        assert_eq!(ColorKey::parse("#"), Err(ColorKeyError::Empty));
        assert_eq!(ColorKey::parse("#12345"), Err(ColorKeyError::InvalidLength(5)));
        assert_eq!(
            ColorKey::parse("#12345g"),
            Err(ColorKeyError::InvalidCharacter('g'))
        );
    }

    #[test]
    fn test_short_and_long_forms_differ() {
        assert_ne!(
            ColorKey::parse("#f00").unwrap(),
            ColorKey::parse("#ff0000").unwrap()
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let key: ColorKey = serde_json::from_str("\"#00FF00\"").unwrap();
        assert_eq!(key.as_str(), "#00ff00");
        assert!(serde_json::from_str::<ColorKey>("\"green\"").is_err());
    }
}
