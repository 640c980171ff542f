#![forbid(unsafe_code)]

//! Browser host for Backdrop.
//!
//! Binds the host-agnostic runtime to the page:
//! - `LocalStorage`: `window.localStorage` as a preference backend,
//! - `ParticlesJs`: the `particles.js` script as the effect library,
//! - `BrowserScheduler`: `setInterval`/`setTimeout` timers that dispatch back
//!   into the controller,
//! - [`PortfolioBackground`]: the `wasm-bindgen` facade a page script drives.
//!
//! [`particles_params`] and [`WebOptions`] are target-independent so the JSON
//! crossing the JS boundary can be checked from native tests.

use backdrop_core::EffectConfig;

mod options;

pub use options::{DEFAULT_LOG_FILTER, WebOptions};

#[cfg(target_arch = "wasm32")]
mod console;
#[cfg(target_arch = "wasm32")]
mod local_storage;
#[cfg(target_arch = "wasm32")]
mod particles;
#[cfg(target_arch = "wasm32")]
mod timer;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorage;
#[cfg(target_arch = "wasm32")]
pub use particles::{ParticlesJs, ParticlesJsHandle};
#[cfg(target_arch = "wasm32")]
pub use timer::BrowserScheduler;
#[cfg(target_arch = "wasm32")]
pub use wasm::PortfolioBackground;

/// Serialized `particlesJS` parameters for `config`.
#[must_use]
pub fn particles_params(config: &EffectConfig) -> String {
    config.to_particles_json().to_string()
}

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct PortfolioBackground;

#[cfg(not(target_arch = "wasm32"))]
impl PortfolioBackground {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_valid_particles_json() {
        let raw = particles_params(&EffectConfig::dark());
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["particles"]["number"]["value"], 140);
        assert_eq!(value["interactivity"]["events"]["onhover"]["mode"], "trail");
    }

    #[test]
    fn light_params_use_repulse() {
        let raw = particles_params(&EffectConfig::light());
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["particles"]["number"]["value"], 80);
        assert_eq!(value["interactivity"]["events"]["onhover"]["mode"], "repulse");
    }
}
