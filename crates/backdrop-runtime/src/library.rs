#![forbid(unsafe_code)]

//! Boundary to the third-party particle rendering library.
//!
//! The library is loaded by the host out of band and may not exist yet when
//! the controller mounts, so the boundary exposes a readiness probe alongside
//! creation. The controller depends on [`EffectLibrary`] only; the browser
//! adapter lives in `backdrop-web`, and [`MockEffectLibrary`] stands in for it
//! in tests and the native demo.

use backdrop_core::{EffectConfig, ThemePreference};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Rendering surface an effect is bound to.
///
/// `id` is the stable logical id (the DOM element id on the web). `generation`
/// counts surface swaps: each theme transition replaces the surface with a
/// fresh one and bumps the generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountTarget {
    id: String,
    generation: u32,
}

impl MountTarget {
    /// A fresh target at generation 0.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            generation: 0,
        }
    }

    /// Logical id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of surface swaps so far.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// The same logical target after one more surface swap.
    #[must_use]
    pub fn next_generation(&self) -> Self {
        Self {
            id: self.id.clone(),
            generation: self.generation.wrapping_add(1),
        }
    }
}

impl fmt::Display for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.generation)
    }
}

/// Errors reported by an [`EffectLibrary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The library has not finished loading.
    NotReady,
    /// No surface with this id exists on the page.
    TargetMissing(String),
    /// The library rejected the call.
    Init(String),
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => f.write_str("effect library not loaded"),
            Self::TargetMissing(id) => write!(f, "mount target #{id} not found"),
            Self::Init(msg) => write!(f, "effect init failed: {msg}"),
        }
    }
}

impl std::error::Error for EffectError {}

/// A running effect instance.
///
/// Release is explicit: [`destroy`](Self::destroy) consumes the handle, so a
/// handle can be released at most once.
pub trait EffectHandle {
    /// Id of the target this effect renders into.
    fn target_id(&self) -> &str;

    /// Stop the animation loop and free the surface resources.
    fn destroy(self);
}

/// The particle rendering library.
pub trait EffectLibrary {
    /// Handle type for running effects.
    type Handle: EffectHandle;

    /// Whether the library has loaded. Must be cheap; it is polled.
    fn is_ready(&self) -> bool;

    /// Start an effect on `target`.
    fn init(
        &mut self,
        target: &MountTarget,
        config: &EffectConfig,
    ) -> Result<Self::Handle, EffectError>;

    /// Swap the surface behind `target.id()` for a fresh one.
    ///
    /// Called after the previous handle was destroyed and before the next one
    /// is created. Hosts that can reconfigure a surface in place keep the
    /// default no-op.
    fn replace_target(&mut self, target: &MountTarget) -> Result<(), EffectError> {
        let _ = target;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock library
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MockState {
    ready: bool,
    fail_next_init: Option<String>,
    probes: u64,
    inits: u64,
    releases: u64,
    replacements: Vec<MountTarget>,
    live: HashMap<String, u32>,
    max_live: HashMap<String, u32>,
    last_config: HashMap<String, EffectConfig>,
    next_handle: u64,
}

/// In-process stand-in for the rendering library.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// controller owns the other. Live handles are counted per target id and the
/// highest simultaneous count is remembered, which is how tests observe that
/// two effects never overlap on one surface.
#[derive(Debug, Clone, Default)]
pub struct MockEffectLibrary {
    state: Rc<RefCell<MockState>>,
}

impl MockEffectLibrary {
    /// A library that has not loaded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A library that is already loaded.
    #[must_use]
    pub fn ready() -> Self {
        let lib = Self::new();
        lib.set_ready(true);
        lib
    }

    /// Simulate the script finishing (or un-finishing) loading.
    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Make the next `init` call fail with `message`.
    pub fn fail_next_init(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_next_init = Some(message.into());
    }

    /// Number of readiness probes.
    #[must_use]
    pub fn probe_count(&self) -> u64 {
        self.state.borrow().probes
    }

    /// Number of successful `init` calls.
    #[must_use]
    pub fn init_count(&self) -> u64 {
        self.state.borrow().inits
    }

    /// Number of handles destroyed.
    #[must_use]
    pub fn release_count(&self) -> u64 {
        self.state.borrow().releases
    }

    /// Targets passed to `replace_target`, in call order.
    #[must_use]
    pub fn replacements(&self) -> Vec<MountTarget> {
        self.state.borrow().replacements.clone()
    }

    /// Live handles currently bound to `target_id`.
    #[must_use]
    pub fn live_handles(&self, target_id: &str) -> u32 {
        self.state
            .borrow()
            .live
            .get(target_id)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneously live handles ever seen on `target_id`.
    #[must_use]
    pub fn max_concurrent(&self, target_id: &str) -> u32 {
        self.state
            .borrow()
            .max_live
            .get(target_id)
            .copied()
            .unwrap_or(0)
    }

    /// Configuration passed to the most recent `init` on `target_id`.
    #[must_use]
    pub fn last_config(&self, target_id: &str) -> Option<EffectConfig> {
        self.state.borrow().last_config.get(target_id).cloned()
    }
}

/// Handle produced by [`MockEffectLibrary`].
#[derive(Debug)]
pub struct MockEffectHandle {
    serial: u64,
    target_id: String,
    state: Rc<RefCell<MockState>>,
}

impl MockEffectHandle {
    /// Creation order of this handle, starting at 1.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl EffectHandle for MockEffectHandle {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn destroy(self) {
        let mut state = self.state.borrow_mut();
        state.releases += 1;
        if let Some(live) = state.live.get_mut(&self.target_id) {
            *live = live.saturating_sub(1);
        }
    }
}

impl EffectLibrary for MockEffectLibrary {
    type Handle = MockEffectHandle;

    fn is_ready(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.probes += 1;
        state.ready
    }

    fn init(
        &mut self,
        target: &MountTarget,
        config: &EffectConfig,
    ) -> Result<Self::Handle, EffectError> {
        let mut state = self.state.borrow_mut();
        if !state.ready {
            return Err(EffectError::NotReady);
        }
        if let Some(message) = state.fail_next_init.take() {
            return Err(EffectError::Init(message));
        }

        let id = target.id().to_string();
        let live = {
            let live = state.live.entry(id.clone()).or_insert(0);
            *live += 1;
            *live
        };
        let max = state.max_live.entry(id.clone()).or_insert(0);
        *max = (*max).max(live);
        state.last_config.insert(id.clone(), config.clone());
        state.inits += 1;
        state.next_handle += 1;

        Ok(MockEffectHandle {
            serial: state.next_handle,
            target_id: id,
            state: Rc::clone(&self.state),
        })
    }

    fn replace_target(&mut self, target: &MountTarget) -> Result<(), EffectError> {
        self.state.borrow_mut().replacements.push(target.clone());
        Ok(())
    }
}

/// The built-in theme whose configuration equals `config`, if any.
#[must_use]
pub fn builtin_theme_of(config: &EffectConfig) -> Option<ThemePreference> {
    ThemePreference::ALL.into_iter().find(|theme| {
        let builtin = match theme {
            ThemePreference::Light => EffectConfig::light(),
            ThemePreference::Dark => EffectConfig::dark(),
        };
        &builtin == config
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_target_generations() {
        let target = MountTarget::new("bg");
        let next = target.next_generation();
        assert_eq!(next.id(), "bg");
        assert_eq!(next.generation(), 1);
        assert_ne!(target, next);
        assert_eq!(next.to_string(), "#bg@1");
    }

    #[test]
    fn mock_refuses_init_until_ready() {
        let mut lib = MockEffectLibrary::new();
        let target = MountTarget::new("bg");
        assert!(!lib.is_ready());
        assert_eq!(
            lib.init(&target, &EffectConfig::light()).unwrap_err(),
            EffectError::NotReady
        );
        lib.set_ready(true);
        let handle = lib.init(&target, &EffectConfig::light()).unwrap();
        assert_eq!(handle.target_id(), "bg");
        assert_eq!(handle.serial(), 1);
        assert_eq!(lib.probe_count(), 1);
    }

    #[test]
    fn mock_tracks_live_and_max_concurrent() {
        let mut lib = MockEffectLibrary::ready();
        let target = MountTarget::new("bg");
        let a = lib.init(&target, &EffectConfig::light()).unwrap();
        let b = lib.init(&target, &EffectConfig::dark()).unwrap();
        assert_eq!(lib.live_handles("bg"), 2);
        a.destroy();
        b.destroy();
        assert_eq!(lib.live_handles("bg"), 0);
        assert_eq!(lib.max_concurrent("bg"), 2);
        assert_eq!(lib.release_count(), 2);
        assert_eq!(lib.last_config("bg"), Some(EffectConfig::dark()));
    }

    #[test]
    fn mock_fail_next_init_is_one_shot() {
        let mut lib = MockEffectLibrary::ready();
        let target = MountTarget::new("bg");
        lib.fail_next_init("boom");
        assert_eq!(
            lib.init(&target, &EffectConfig::light()).unwrap_err(),
            EffectError::Init("boom".into())
        );
        assert!(lib.init(&target, &EffectConfig::light()).is_ok());
        assert_eq!(lib.init_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let lib = MockEffectLibrary::new();
        let observer = lib.clone();
        lib.set_ready(true);
        assert!(observer.is_ready());
    }

    #[test]
    fn builtin_theme_lookup() {
        assert_eq!(
            builtin_theme_of(&EffectConfig::dark()),
            Some(ThemePreference::Dark)
        );
        let mut custom = EffectConfig::light();
        custom.particle_count = 1;
        assert_eq!(builtin_theme_of(&custom), None);
    }
}
