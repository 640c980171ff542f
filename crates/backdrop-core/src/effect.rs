#![forbid(unsafe_code)]

//! Particle effect configuration keyed by theme.
//!
//! [`EffectConfig`] describes one effect instance: how many particles, which
//! palette, how they move and how they react to the pointer. [`ThemedEffects`]
//! pairs a configuration with each [`ThemePreference`]; the background
//! controller selects the entry matching the active theme and hands it to the
//! rendering library without looking inside.
//!
//! # File Format
//!
//! ```json
//! {
//!   "light": { "particle_count": 80, "palette": ["#065f46"], "motion": "drift", ... },
//!   "dark":  { "particle_count": 140, "palette": ["#10b981"], "motion": "directional", ... }
//! }
//! ```
//!
//! Each slot is an override over the built-in configuration for that theme:
//! a missing slot or a missing field keeps the built-in value. `"link_color":
//! null` turns links off.

use crate::color::Rgb;
use crate::theme::ThemePreference;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::path::Path;

/// Upper bound on `particle_count`. Above this the animation loop starts to
/// compete with page scrolling on low-end devices.
pub const MAX_PARTICLES: u32 = 1_000;

/// How particles travel across the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// Steady upward drift, wrapping at the edges.
    #[default]
    Directional,
    /// Random wandering, wrapping at the edges.
    Drift,
    /// Random wandering, bouncing off the edges.
    Bounce,
}

/// Pointer-hover interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverMode {
    /// No reaction.
    #[default]
    None,
    /// Emit a short trail of particles behind the pointer.
    Trail,
    /// Push nearby particles away from the pointer.
    Repulse,
}

/// Pointer-click interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    /// No reaction.
    #[default]
    None,
    /// Spawn a burst of particles at the click point.
    Push,
}

/// Visual parameters for one running effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    /// Number of particles spawned at init.
    pub particle_count: u32,
    /// Ordered particle colors; the library picks from them at random.
    pub palette: Vec<Rgb>,
    /// Color of the lines linking nearby particles. `None` disables links.
    #[serde(default)]
    pub link_color: Option<Rgb>,
    /// Base particle speed.
    pub speed: f32,
    /// Motion mode.
    #[serde(default)]
    pub motion: MotionMode,
    /// Hover interaction.
    #[serde(default)]
    pub on_hover: HoverMode,
    /// Click interaction.
    #[serde(default)]
    pub on_click: ClickMode,
}

impl EffectConfig {
    /// Built-in configuration for the dark page: dense green "matrix" rain.
    #[must_use]
    pub fn dark() -> Self {
        Self {
            particle_count: 140,
            palette: vec![
                Rgb::new(0x05, 0x96, 0x69),
                Rgb::new(0x10, 0xb9, 0x81),
                Rgb::new(0x34, 0xd3, 0x99),
                Rgb::new(0x06, 0x4e, 0x3b),
                Rgb::new(0x04, 0x78, 0x57),
            ],
            link_color: Some(Rgb::new(0x10, 0xb9, 0x81)),
            speed: 2.5,
            motion: MotionMode::Directional,
            on_hover: HoverMode::Trail,
            on_click: ClickMode::Push,
        }
    }

    /// Built-in configuration for the light page: sparser, deeper greens.
    #[must_use]
    pub fn light() -> Self {
        Self {
            particle_count: 80,
            palette: vec![
                Rgb::new(0x06, 0x5f, 0x46),
                Rgb::new(0x04, 0x78, 0x57),
                Rgb::new(0x0f, 0x76, 0x6e),
                Rgb::new(0x15, 0x80, 0x3d),
                Rgb::new(0x16, 0x65, 0x34),
            ],
            link_color: Some(Rgb::new(0x04, 0x78, 0x57)),
            speed: 1.5,
            motion: MotionMode::Drift,
            on_hover: HoverMode::Repulse,
            on_click: ClickMode::Push,
        }
    }

    /// Check the configuration against the limits the renderer tolerates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        if self.particle_count > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles {
                count: self.particle_count,
            });
        }
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err(ConfigError::InvalidSpeed { speed: self.speed });
        }
        Ok(())
    }

    /// Render into the particles.js option object.
    #[must_use]
    pub fn to_particles_json(&self) -> Value {
        let colors: Vec<String> = self.palette.iter().map(|c| c.to_hex()).collect();
        let trail_color = self
            .palette
            .last()
            .map(|c| c.to_hex())
            .unwrap_or_else(|| "#ffffff".to_string());

        let (direction, out_mode, bounce) = match self.motion {
            MotionMode::Directional => ("top", "out", false),
            MotionMode::Drift => ("none", "out", false),
            MotionMode::Bounce => ("none", "bounce", true),
        };
        let (hover_enabled, hover_mode) = match self.on_hover {
            HoverMode::None => (false, "none"),
            HoverMode::Trail => (true, "trail"),
            HoverMode::Repulse => (true, "repulse"),
        };
        let (click_enabled, click_mode) = match self.on_click {
            ClickMode::None => (false, "none"),
            ClickMode::Push => (true, "push"),
        };

        json!({
            "particles": {
                "number": {
                    "value": self.particle_count,
                    "density": { "enable": true, "value_area": 800 }
                },
                "color": { "value": colors },
                "shape": { "type": "circle" },
                "opacity": {
                    "value": 0.9,
                    "random": true,
                    "anim": { "enable": true, "speed": 1.5, "opacity_min": 0.4, "sync": false }
                },
                "size": {
                    "value": 3,
                    "random": true,
                    "anim": { "enable": true, "speed": 2, "size_min": 0.5, "sync": false }
                },
                "line_linked": {
                    "enable": self.link_color.is_some(),
                    "distance": 150,
                    "color": self.link_color.map(|c| c.to_hex()).unwrap_or_default(),
                    "opacity": 0.6,
                    "width": 1.2
                },
                "move": {
                    "enable": true,
                    "speed": self.speed,
                    "direction": direction,
                    "random": true,
                    "straight": false,
                    "out_mode": out_mode,
                    "bounce": bounce
                }
            },
            "interactivity": {
                "detect_on": "canvas",
                "events": {
                    "onhover": { "enable": hover_enabled, "mode": hover_mode },
                    "onclick": { "enable": click_enabled, "mode": click_mode },
                    "resize": true
                },
                "modes": {
                    "trail": {
                        "delay": 0.005,
                        "quantity": 5,
                        "particles": {
                            "size": { "value": 2 },
                            "color": { "value": trail_color }
                        }
                    },
                    "repulse": { "distance": 100, "duration": 0.4 },
                    "push": { "particles_nb": 8 }
                }
            },
            "retina_detect": true
        })
    }
}

/// Field-wise overrides for one [`EffectConfig`]. `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectOverrides {
    pub particle_count: Option<u32>,
    pub palette: Option<Vec<Rgb>>,
    /// `Some(None)` is an explicit `null`: links off.
    #[serde(deserialize_with = "present")]
    pub link_color: Option<Option<Rgb>>,
    pub speed: Option<f32>,
    pub motion: Option<MotionMode>,
    pub on_hover: Option<HoverMode>,
    pub on_click: Option<ClickMode>,
}

/// Distinguishes `"field": null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl EffectOverrides {
    /// Apply the set fields over `base`.
    #[must_use]
    pub fn apply_to(self, mut base: EffectConfig) -> EffectConfig {
        if let Some(count) = self.particle_count {
            base.particle_count = count;
        }
        if let Some(palette) = self.palette {
            base.palette = palette;
        }
        if let Some(link) = self.link_color {
            base.link_color = link;
        }
        if let Some(speed) = self.speed {
            base.speed = speed;
        }
        if let Some(motion) = self.motion {
            base.motion = motion;
        }
        if let Some(hover) = self.on_hover {
            base.on_hover = hover;
        }
        if let Some(click) = self.on_click {
            base.on_click = click;
        }
        base
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThemedOverrides {
    light: EffectOverrides,
    dark: EffectOverrides,
}

impl From<ThemedOverrides> for ThemedEffects {
    fn from(overrides: ThemedOverrides) -> Self {
        Self {
            light: overrides.light.apply_to(EffectConfig::light()),
            dark: overrides.dark.apply_to(EffectConfig::dark()),
        }
    }
}

/// One [`EffectConfig`] per theme.
///
/// Deserializes from per-slot [`EffectOverrides`] merged over the built-ins;
/// serializes every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ThemedOverrides")]
pub struct ThemedEffects {
    /// Configuration used while the page is light.
    pub light: EffectConfig,
    /// Configuration used while the page is dark.
    pub dark: EffectConfig,
}

impl Default for ThemedEffects {
    fn default() -> Self {
        Self {
            light: EffectConfig::light(),
            dark: EffectConfig::dark(),
        }
    }
}

impl ThemedEffects {
    /// Select the configuration for `theme`.
    #[inline]
    #[must_use]
    pub fn for_theme(&self, theme: ThemePreference) -> &EffectConfig {
        match theme {
            ThemePreference::Light => &self.light,
            ThemePreference::Dark => &self.dark,
        }
    }

    /// Validate both entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.light.validate()?;
        self.dark.validate()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let effects: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        effects.validate()?;
        Ok(effects)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Errors produced while loading or validating effect configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    Io(std::io::Error),
    /// The document is not valid JSON for [`ThemedEffects`].
    Parse(String),
    /// A palette has no colors.
    EmptyPalette,
    /// `particle_count` exceeds [`MAX_PARTICLES`].
    TooManyParticles {
        /// The rejected count.
        count: u32,
    },
    /// Speed is negative, NaN or infinite.
    InvalidSpeed {
        /// The rejected speed.
        speed: f32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::EmptyPalette => f.write_str("palette must contain at least one color"),
            Self::TooManyParticles { count } => {
                write!(f, "particle count {count} exceeds limit {MAX_PARTICLES}")
            }
            Self::InvalidSpeed { speed } => write!(f, "invalid particle speed {speed}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_theme_selects_matching_entry() {
        let effects = ThemedEffects::default();
        assert_eq!(effects.for_theme(ThemePreference::Dark), &EffectConfig::dark());
        assert_eq!(effects.for_theme(ThemePreference::Light), &EffectConfig::light());
    }

    #[test]
    fn builtins_validate() {
        ThemedEffects::default().validate().unwrap();
    }

    #[test]
    fn light_palette_is_darker_than_dark_palette() {
        let avg = |cfg: &EffectConfig| {
            cfg.palette
                .iter()
                .map(|c| u32::from(c.luminance_u8()))
                .sum::<u32>()
                / cfg.palette.len() as u32
        };
        assert!(avg(&EffectConfig::light()) < avg(&EffectConfig::dark()));
    }

    #[test]
    fn validate_rejects_empty_palette() {
        let mut cfg = EffectConfig::dark();
        cfg.palette.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyPalette)));
    }

    #[test]
    fn validate_rejects_particle_overflow() {
        let mut cfg = EffectConfig::dark();
        cfg.particle_count = MAX_PARTICLES + 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyParticles { count }) if count == MAX_PARTICLES + 1
        ));
    }

    #[test]
    fn validate_rejects_nan_speed() {
        let mut cfg = EffectConfig::light();
        cfg.speed = f32::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSpeed { .. })));
    }

    #[test]
    fn particles_json_matches_dark_builtin() {
        let value = EffectConfig::dark().to_particles_json();
        assert_eq!(value["particles"]["number"]["value"], 140);
        assert_eq!(value["particles"]["color"]["value"][0], "#059669");
        assert_eq!(value["particles"]["color"]["value"].as_array().unwrap().len(), 5);
        assert_eq!(value["particles"]["line_linked"]["color"], "#10b981");
        assert_eq!(value["particles"]["move"]["direction"], "top");
        assert_eq!(value["interactivity"]["events"]["onhover"]["mode"], "trail");
        assert_eq!(value["interactivity"]["events"]["onclick"]["mode"], "push");
        assert_eq!(value["interactivity"]["modes"]["trail"]["particles"]["color"]["value"], "#047857");
    }

    #[test]
    fn particles_json_disables_absent_interactions() {
        let cfg = EffectConfig {
            link_color: None,
            motion: MotionMode::Bounce,
            on_hover: HoverMode::None,
            on_click: ClickMode::None,
            ..EffectConfig::light()
        };
        let value = cfg.to_particles_json();
        assert_eq!(value["particles"]["line_linked"]["enable"], false);
        assert_eq!(value["particles"]["move"]["out_mode"], "bounce");
        assert_eq!(value["particles"]["move"]["bounce"], true);
        assert_eq!(value["interactivity"]["events"]["onhover"]["enable"], false);
        assert_eq!(value["interactivity"]["events"]["onclick"]["enable"], false);
    }

    #[test]
    fn from_json_fills_missing_theme_with_builtin() {
        let json = r##"{
            "dark": {
                "particle_count": 60,
                "palette": ["#ff0000", "#00ff00"],
                "speed": 1.0,
                "motion": "bounce",
                "on_hover": "repulse"
            }
        }"##;
        let effects = ThemedEffects::from_json_str(json).unwrap();
        assert_eq!(effects.light, EffectConfig::light());
        assert_eq!(effects.dark.particle_count, 60);
        assert_eq!(effects.dark.motion, MotionMode::Bounce);
        assert_eq!(effects.dark.on_hover, HoverMode::Repulse);
        assert_eq!(effects.dark.on_click, ClickMode::Push);
        assert_eq!(effects.dark.link_color, EffectConfig::dark().link_color);
    }

    #[test]
    fn partial_slot_keeps_builtin_fields() {
        let effects = ThemedEffects::from_json_str(r#"{"light": {"particle_count": 40}}"#).unwrap();
        assert_eq!(
            effects.light,
            EffectConfig {
                particle_count: 40,
                ..EffectConfig::light()
            }
        );
        assert_eq!(effects.light.motion, MotionMode::Drift);
        assert_eq!(effects.light.on_hover, HoverMode::Repulse);
        assert_eq!(effects.dark, EffectConfig::dark());

        let effects = ThemedEffects::from_json_str(
            r##"{"light": {"particle_count": 80, "palette": ["#065f46"], "speed": 1.5}}"##,
        )
        .unwrap();
        assert_eq!(effects.light.motion, MotionMode::Drift);
        assert_eq!(effects.light.on_hover, HoverMode::Repulse);
        assert_eq!(effects.light.link_color, EffectConfig::light().link_color);
    }

    #[test]
    fn explicit_null_link_color_disables_links() {
        let effects = ThemedEffects::from_json_str(r#"{"dark": {"link_color": null}}"#).unwrap();
        assert_eq!(effects.dark.link_color, None);
        assert_eq!(effects.dark.particle_count, 140);
        assert!(ThemedEffects::from_json_str("{}").unwrap() == ThemedEffects::default());
    }

    #[test]
    fn unknown_slot_fields_are_rejected() {
        assert!(matches!(
            ThemedEffects::from_json_str(r#"{"dark": {"particles": 10}}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(EffectOverrides::default().is_empty());
    }

    #[test]
    fn serialized_effects_load_back_unchanged() {
        let effects = ThemedEffects {
            light: EffectConfig {
                link_color: None,
                ..EffectConfig::light()
            },
            dark: EffectConfig::dark(),
        };
        let json = serde_json::to_string(&effects).unwrap();
        assert_eq!(ThemedEffects::from_json_str(&json).unwrap(), effects);
    }

    #[test]
    fn from_json_rejects_invalid_entries() {
        let json = r#"{ "light": { "particle_count": 5, "palette": [], "speed": 1.0 } }"#;
        assert!(matches!(
            ThemedEffects::from_json_str(json),
            Err(ConfigError::EmptyPalette)
        ));
        assert!(matches!(
            ThemedEffects::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = ThemedEffects::from_path("/definitely/not/here/effects.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
