#![forbid(unsafe_code)]

//! Palette colors addressed by CSS hex notation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGB color (opaque).
///
/// Serialized as a lowercase `#rrggbb` string so configuration files read the
/// same way the rendering library consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    /// Red channel (0–255).
    pub r: u8,
    /// Green channel (0–255).
    pub g: u8,
    /// Blue channel (0–255).
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb`. The leading `#` is optional.
    pub fn from_hex(raw: &str) -> Result<Self, ParseColorError> {
        let digits = raw.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseColorError::new(raw));
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| ParseColorError::new(raw));
        match digits.len() {
            6 => Ok(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                // #abc expands to #aabbcc
                let expand = |s: &str| channel(s).map(|v| v * 0x11);
                Ok(Self::new(
                    expand(&digits[0..1])?,
                    expand(&digits[1..2])?,
                    expand(&digits[2..3])?,
                ))
            }
            _ => Err(ParseColorError::new(raw)),
        }
    }

    /// Lowercase `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Compute perceived luminance (BT.709) as a `u8` (0 = black, 255 = white).
    #[must_use]
    pub fn luminance_u8(self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        let luma = 2126 * r + 7152 * g + 722 * b;
        ((luma + 5000) / 10_000) as u8
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

/// Error returned for malformed hex colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError {
    raw: String,
}

impl ParseColorError {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hex color {:?}", self.raw)
    }
}

impl std::error::Error for ParseColorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_long_form() {
        assert_eq!(Rgb::from_hex("#10b981"), Ok(Rgb::new(0x10, 0xb9, 0x81)));
    }

    #[test]
    fn parses_short_form_and_missing_hash() {
        assert_eq!(Rgb::from_hex("fa0"), Ok(Rgb::new(0xff, 0xaa, 0x00)));
    }

    #[test]
    fn rejects_bad_length_and_digits() {
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("#gg0000").is_err());
        assert!(Rgb::from_hex("").is_err());
        assert!(Rgb::from_hex("#ééé").is_err());
    }

    #[test]
    fn to_hex_is_lowercase() {
        assert_eq!(Rgb::new(0xAB, 0xCD, 0xEF).to_hex(), "#abcdef");
    }

    #[test]
    fn serde_round_trips_through_hex_string() {
        let json = serde_json::to_string(&Rgb::new(5, 150, 105)).unwrap();
        assert_eq!(json, "\"#059669\"");
        let err = serde_json::from_str::<Rgb>("\"nope\"");
        assert!(err.is_err());
    }

    #[test]
    fn luminance_extremes() {
        assert_eq!(Rgb::new(0, 0, 0).luminance_u8(), 0);
        assert_eq!(Rgb::new(255, 255, 255).luminance_u8(), 255);
    }

    proptest! {
        #[test]
        fn hex_parses_back(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let color = Rgb::new(r, g, b);
            prop_assert_eq!(Rgb::from_hex(&color.to_hex()), Ok(color));
        }
    }
}
