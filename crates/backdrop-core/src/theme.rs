#![forbid(unsafe_code)]

//! Light/dark display mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The persisted display mode choice.
///
/// Serialized as the lowercase strings `"light"` and `"dark"`, which is also
/// the value written to preference storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    /// Light mode (the default when nothing was persisted).
    #[default]
    Light,
    /// Dark mode.
    Dark,
}

impl ThemePreference {
    /// Both variants, in declaration order.
    pub const ALL: [Self; 2] = [Self::Light, Self::Dark];

    /// The opposite mode.
    #[inline]
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Storage representation.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Returns `true` for [`ThemePreference::Dark`].
    #[inline]
    #[must_use]
    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored string is not a known theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseThemeError {
    raw: String,
}

impl ParseThemeError {
    /// The rejected input.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ParseThemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown theme {:?} (expected \"light\" or \"dark\")", self.raw)
    }
}

impl std::error::Error for ParseThemeError {}

impl FromStr for ThemePreference {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("light") {
            Ok(Self::Light)
        } else if trimmed.eq_ignore_ascii_case("dark") {
            Ok(Self::Dark)
        } else {
            Err(ParseThemeError { raw: s.to_string() })
        }
    }
}
