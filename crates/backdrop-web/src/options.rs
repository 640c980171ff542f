#![forbid(unsafe_code)]

//! Options object accepted by the `PortfolioBackground` constructor.
//!
//! ```json
//! {
//!   "targetId": "particles-js",
//!   "storageKey": "theme",
//!   "pollIntervalMs": 100,
//!   "logFilter": "backdrop_runtime=debug",
//!   "effects": { "light": { ... }, "dark": { ... } }
//! }
//! ```
//!
//! Every field is optional.

use backdrop_core::{ConfigError, ThemedEffects};
use backdrop_runtime::BackgroundConfig;
use serde::Deserialize;
use std::time::Duration;

/// Default `tracing` filter for the browser console.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WebOptions {
    pub target_id: Option<String>,
    pub storage_key: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub log_filter: Option<String>,
    pub effects: Option<ThemedEffects>,
}

impl WebOptions {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(effects) = &options.effects {
            effects.validate()?;
        }
        Ok(options)
    }

    /// Controller configuration with these overrides applied.
    #[must_use]
    pub fn background_config(&self) -> BackgroundConfig {
        let mut config = BackgroundConfig::default();
        if let Some(id) = self.target_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            config = config.target_id(id);
        }
        if let Some(key) = self.storage_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            config = config.storage_key(key);
        }
        match self.poll_interval_ms {
            Some(0) => tracing::warn!("pollIntervalMs must be positive, keeping default"),
            Some(ms) => config = config.poll_interval(Duration::from_millis(ms)),
            None => {}
        }
        config
    }

    /// Configured effects, or the built-in ones.
    #[must_use]
    pub fn effects(&self) -> ThemedEffects {
        self.effects.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let options = WebOptions::from_json("{}").unwrap();
        assert_eq!(options.background_config(), BackgroundConfig::default());
        assert_eq!(options.effects(), ThemedEffects::default());
        assert_eq!(options.log_filter(), "warn");
    }

    #[test]
    fn camel_case_overrides() {
        let options = WebOptions::from_json(
            r#"{"targetId": "hero-bg", "storageKey": "site-theme", "pollIntervalMs": 50}"#,
        )
        .unwrap();
        let config = options.background_config();
        assert_eq!(config.target_id, "hero-bg");
        assert_eq!(config.storage_key, "site-theme");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn zero_poll_interval_is_ignored() {
        let options = WebOptions::from_json(r#"{"pollIntervalMs": 0}"#).unwrap();
        assert_eq!(
            options.background_config().poll_interval,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn invalid_effects_are_rejected() {
        let err = WebOptions::from_json(
            r##"{"effects": {"dark": {"particle_count": 5000, "palette": ["#10b981"], "speed": 1.0}}}"##,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyParticles { count: 5000 }));
    }

    #[test]
    fn partial_effects_slot_merges_over_builtin() {
        let options =
            WebOptions::from_json(r#"{"effects": {"light": {"particle_count": 30}}}"#).unwrap();
        let effects = options.effects();
        assert_eq!(effects.light.particle_count, 30);
        assert_eq!(effects.light.palette, backdrop_core::EffectConfig::light().palette);
        assert_eq!(effects.dark, backdrop_core::EffectConfig::dark());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(WebOptions::from_json(r#"{"target": "bg"}"#).is_err());
    }
}
