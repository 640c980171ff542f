#![forbid(unsafe_code)]

//! Background controller configuration.
//!
//! Defaults:
//! - target_id: `"particles-js"`
//! - poll_interval: 100ms
//! - slow_library_warn_after: 50 polls (about 5s at the default interval)
//! - storage_key: `"theme"`
//!
//! # Environment
//!
//! [`BackgroundConfig::from_env`] honors `BACKDROP_TARGET_ID`,
//! `BACKDROP_POLL_INTERVAL_MS` and `BACKDROP_STORAGE_KEY`. Values that fail to
//! parse are ignored with a warning.

use crate::preference::DEFAULT_STORAGE_KEY;
use std::time::Duration;

/// Default DOM id of the background surface.
pub const DEFAULT_TARGET_ID: &str = "particles-js";

/// Default readiness poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of polls between "library still missing" warnings.
pub const DEFAULT_SLOW_LIBRARY_WARN_AFTER: u32 = 50;

/// Configuration for [`BackgroundEffectController`](crate::background::BackgroundEffectController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundConfig {
    /// Logical id of the mount target.
    pub target_id: String,
    /// Interval between library readiness probes.
    pub poll_interval: Duration,
    /// Warn every this many unsuccessful probes. Zero disables the warning.
    pub slow_library_warn_after: u32,
    /// Storage key for the theme preference.
    pub storage_key: String,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            target_id: DEFAULT_TARGET_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            slow_library_warn_after: DEFAULT_SLOW_LIBRARY_WARN_AFTER,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl BackgroundConfig {
    /// Defaults overridden by `BACKDROP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(id) = lookup("BACKDROP_TARGET_ID") {
            let id = id.trim();
            if id.is_empty() {
                tracing::warn!("BACKDROP_TARGET_ID is empty, keeping default");
            } else {
                config.target_id = id.to_string();
            }
        }

        if let Some(raw) = lookup("BACKDROP_POLL_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "invalid BACKDROP_POLL_INTERVAL_MS, keeping default"),
            }
        }

        if let Some(key) = lookup("BACKDROP_STORAGE_KEY") {
            let key = key.trim();
            if key.is_empty() {
                tracing::warn!("BACKDROP_STORAGE_KEY is empty, keeping default");
            } else {
                config.storage_key = key.to_string();
            }
        }

        config
    }

    /// Set the mount target id.
    #[must_use]
    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = id.into();
        self
    }

    /// Set the readiness poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many failed probes pass between warnings.
    #[must_use]
    pub fn slow_library_warn_after(mut self, polls: u32) -> Self {
        self.slow_library_warn_after = polls;
        self
    }

    /// Set the theme storage key.
    #[must_use]
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}
