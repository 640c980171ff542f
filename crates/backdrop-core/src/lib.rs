#![forbid(unsafe_code)]

//! Backdrop core types.
//!
//! This crate holds the pure data shared by the runtime and the web host:
//!
//! - [`ThemePreference`] - the persisted light/dark display mode
//! - [`Rgb`] - hex-addressable palette colors
//! - [`EffectConfig`] / [`ThemedEffects`] - particle effect parameters keyed by theme
//!
//! # Role in Backdrop
//! Nothing here performs I/O against the host. `backdrop-runtime` consumes these
//! types to drive the effect lifecycle, and `backdrop-web` serializes
//! [`EffectConfig`] into the option object the rendering library expects.

pub mod color;
pub mod effect;
pub mod theme;

pub use color::{ParseColorError, Rgb};
pub use effect::{
    ClickMode, ConfigError, EffectConfig, EffectOverrides, HoverMode, MAX_PARTICLES, MotionMode,
    ThemedEffects,
};
pub use theme::{ParseThemeError, ThemePreference};
