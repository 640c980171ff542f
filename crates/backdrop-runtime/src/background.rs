#![forbid(unsafe_code)]

//! Lifecycle controller for the decorative particle background.
//!
//! [`BackgroundEffectController`] binds one [`MountTarget`] to at most one
//! live effect handle and keeps the handle's configuration in step with the
//! active [`ThemePreference`].
//!
//! # State machine
//!
//! ```text
//!              mount (library ready)
//!   Unmounted ─────────────────────────────────────────┐
//!      │ mount (library missing)                       ▼
//!      ▼                      poll: ready          ┌────────┐
//!   AwaitingLibrary ──────────────────────────────▶│ Active │
//!      ▲  │ poll: not ready (stay)                 └────────┘
//!      │  └─────┘                                   │     ▲
//!      │ init failed            theme change        │     │ deferral tick
//!      └──────────────────── Transitioning ◀────────┘     │
//!                                  └──────────────────────┘
//!   unmount from any state ─▶ Unmounted
//! ```
//!
//! # Invariants
//!
//! 1. At most one live handle per target id at any instant. A handle is only
//!    created when no handle is held, and a transition destroys the old handle
//!    before scheduling creation of the new one.
//! 2. A pending poll or deferral timer exists only in the state that owns it;
//!    leaving that state cancels it.
//! 3. `unmount` is idempotent and runs on drop.
//!
//! # Failure Modes
//!
//! | Scenario | Behavior |
//! |----------|----------|
//! | Library never loads | Stays in `AwaitingLibrary`, warns every N polls |
//! | `init` fails | Logged, falls back to polling |
//! | `mount` on the same id | `MountOutcome::AlreadyMounted`, no-op |
//! | `unmount` with nothing mounted | No-op |
//! | Timer id not owned by the current state | Ignored |

use crate::config::BackgroundConfig;
use crate::library::{EffectHandle, EffectLibrary, MountTarget};
use crate::preference::{ThemePreferenceStore, ThemeSubscription};
use crate::scheduler::{DeterministicScheduler, Scheduler, TimerId};
use backdrop_core::{EffectConfig, ThemePreference, ThemedEffects};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// No target, no handle.
    Unmounted,
    /// Target exists; waiting for the library to load.
    AwaitingLibrary {
        /// Readiness probes made so far in this wait.
        attempts: u32,
    },
    /// One handle is live.
    Active {
        /// Theme the live handle was configured for.
        theme: ThemePreference,
    },
    /// Old handle released, new one due on the next tick.
    Transitioning,
}

/// Result of [`BackgroundEffectController::mount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// The controller was unmounted and is now mounted.
    Started,
    /// Already mounted on this id; nothing changed.
    AlreadyMounted,
    /// Was mounted on another id; that target was torn down first.
    Remounted,
}

/// Lifetime counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Handles created.
    pub handles_created: u64,
    /// Handles destroyed.
    pub handles_released: u64,
    /// Theme or configuration transitions started.
    pub transitions: u64,
    /// Readiness probes made from poll ticks.
    pub polls: u64,
    /// `init` calls that failed.
    pub init_failures: u64,
}

enum Phase<H> {
    Unmounted,
    AwaitingLibrary { poll: TimerId, attempts: u32 },
    Active { handle: H, theme: ThemePreference },
    Transitioning { deferral: TimerId },
}

enum TimerAction {
    Poll { poll: TimerId, attempts: u32 },
    Deferral,
    Stale,
}

/// Binds one mount target to at most one running particle effect.
pub struct BackgroundEffectController<L: EffectLibrary, S: Scheduler> {
    library: L,
    scheduler: S,
    effects: ThemedEffects,
    config: BackgroundConfig,
    target: Option<MountTarget>,
    phase: Phase<L::Handle>,
    pending_theme: ThemePreference,
    deferred_theme: Rc<Cell<Option<ThemePreference>>>,
    stats: ControllerStats,
}

impl<L: EffectLibrary, S: Scheduler> BackgroundEffectController<L, S> {
    /// Create an unmounted controller with built-in effects and default config.
    #[must_use]
    pub fn new(library: L, scheduler: S) -> Self {
        Self {
            library,
            scheduler,
            effects: ThemedEffects::default(),
            config: BackgroundConfig::default(),
            target: None,
            phase: Phase::Unmounted,
            pending_theme: ThemePreference::default(),
            deferred_theme: Rc::new(Cell::new(None)),
            stats: ControllerStats::default(),
        }
    }

    /// Use `effects` instead of the built-in configurations.
    #[must_use]
    pub fn with_effects(mut self, effects: ThemedEffects) -> Self {
        self.effects = effects;
        self
    }

    /// Use `config` instead of [`BackgroundConfig::default`].
    #[must_use]
    pub fn with_config(mut self, config: BackgroundConfig) -> Self {
        self.config = config;
        self
    }

    /// Theme to use until the first [`on_theme_change`](Self::on_theme_change).
    #[must_use]
    pub fn with_theme(mut self, theme: ThemePreference) -> Self {
        self.pending_theme = theme;
        self
    }

    /// Mount on `target_id`.
    ///
    /// Starts the effect right away when the library is loaded; otherwise
    /// starts polling for it.
    pub fn mount(&mut self, target_id: &str) -> MountOutcome {
        self.apply_deferred_theme();
        let mut outcome = MountOutcome::Started;
        if let Some(current) = &self.target {
            if current.id() == target_id {
                tracing::debug!(target_id, "background already mounted, ignoring");
                return MountOutcome::AlreadyMounted;
            }
            tracing::debug!(
                from = %current.id(),
                to = target_id,
                "moving background to a new target"
            );
            self.unmount();
            outcome = MountOutcome::Remounted;
        }

        self.target = Some(MountTarget::new(target_id));
        tracing::debug!(target_id, theme = %self.pending_theme, "background mounted");
        if self.library.is_ready() {
            self.create_effect();
        } else {
            self.begin_polling();
        }
        outcome
    }

    /// Mount on the target id from the configuration.
    pub fn mount_default(&mut self) -> MountOutcome {
        let id = self.config.target_id.clone();
        self.mount(&id)
    }

    /// React to a theme change.
    ///
    /// While active, the running effect is released, the surface replaced,
    /// and a new effect is created on the next tick. In every other state only
    /// the theme used for the next creation changes.
    pub fn on_theme_change(&mut self, theme: ThemePreference) {
        self.deferred_theme.set(None);
        self.pending_theme = theme;
        match self.applied_theme() {
            Some(applied) if applied == theme => {
                tracing::trace!(theme = %theme, "theme unchanged, keeping effect");
            }
            Some(_) => self.begin_transition(),
            None => {
                tracing::debug!(theme = %theme, "theme recorded for the next effect");
            }
        }
    }

    /// Replace the per-theme configurations; restarts a running effect.
    pub fn reconfigure(&mut self, effects: ThemedEffects) {
        self.apply_deferred_theme();
        self.effects = effects;
        if matches!(self.phase, Phase::Active { .. }) {
            self.begin_transition();
        }
    }

    /// Deliver a fired timer. Ids not owned by the current state are ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        self.apply_deferred_theme();
        let action = match &mut self.phase {
            Phase::AwaitingLibrary { poll, attempts } if *poll == id => {
                *attempts = attempts.saturating_add(1);
                TimerAction::Poll {
                    poll: *poll,
                    attempts: *attempts,
                }
            }
            Phase::Transitioning { deferral } if *deferral == id => TimerAction::Deferral,
            _ => TimerAction::Stale,
        };

        match action {
            TimerAction::Poll { poll, attempts } => {
                self.stats.polls += 1;
                if self.library.is_ready() {
                    tracing::debug!(attempts, "effect library became ready");
                    self.scheduler.cancel(poll);
                    self.phase = Phase::Unmounted;
                    self.create_effect();
                } else {
                    tracing::trace!(timer = %id, attempts, "effect library not ready");
                    let every = self.config.slow_library_warn_after;
                    if every > 0 && attempts % every == 0 {
                        tracing::warn!(
                            attempts,
                            waited_ms = millis(self.config.poll_interval)
                                .saturating_mul(u64::from(attempts)),
                            "effect library still unavailable"
                        );
                    }
                }
            }
            TimerAction::Deferral => {
                self.phase = Phase::Unmounted;
                self.create_effect();
            }
            TimerAction::Stale => {
                tracing::trace!(timer = %id, "ignoring stale timer");
            }
        }
    }

    /// Release everything and return to `Unmounted`. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Unmounted) {
            Phase::Unmounted => {}
            Phase::AwaitingLibrary { poll, attempts } => {
                self.scheduler.cancel(poll);
                tracing::debug!(attempts, "cancelled library poll");
            }
            Phase::Active { handle, .. } => {
                self.release(handle);
            }
            Phase::Transitioning { deferral } => {
                self.scheduler.cancel(deferral);
            }
        }

        match self.target.take() {
            Some(target) => tracing::debug!(mount = %target, "background unmounted"),
            None => tracing::trace!("unmount with nothing mounted"),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EffectState {
        match &self.phase {
            Phase::Unmounted => EffectState::Unmounted,
            Phase::AwaitingLibrary { attempts, .. } => EffectState::AwaitingLibrary {
                attempts: *attempts,
            },
            Phase::Active { theme, .. } => EffectState::Active { theme: *theme },
            Phase::Transitioning { .. } => EffectState::Transitioning,
        }
    }

    /// Whether a handle is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    /// The mounted target, if any.
    #[must_use]
    pub fn target(&self) -> Option<&MountTarget> {
        self.target.as_ref()
    }

    /// Theme of the live handle.
    #[must_use]
    pub fn applied_theme(&self) -> Option<ThemePreference> {
        match &self.phase {
            Phase::Active { theme, .. } => Some(*theme),
            _ => None,
        }
    }

    /// Theme the next created handle will use.
    #[must_use]
    pub fn pending_theme(&self) -> ThemePreference {
        self.pending_theme
    }

    /// The live handle.
    #[must_use]
    pub fn handle(&self) -> Option<&L::Handle> {
        match &self.phase {
            Phase::Active { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Per-theme configurations.
    #[must_use]
    pub fn effects(&self) -> &ThemedEffects {
        &self.effects
    }

    /// Controller configuration.
    #[must_use]
    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// The rendering library.
    #[must_use]
    pub fn library(&self) -> &L {
        &self.library
    }

    /// Mutable access to the rendering library.
    pub fn library_mut(&mut self) -> &mut L {
        &mut self.library
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable access to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn current_config(&self) -> &EffectConfig {
        self.effects.for_theme(self.pending_theme)
    }

    fn begin_polling(&mut self) {
        let poll = self.scheduler.schedule_repeating(self.config.poll_interval);
        tracing::debug!(
            timer = %poll,
            interval_ms = millis(self.config.poll_interval),
            "waiting for effect library"
        );
        self.phase = Phase::AwaitingLibrary { poll, attempts: 0 };
    }

    /// Must only be called while no handle is held.
    fn create_effect(&mut self) {
        debug_assert!(
            matches!(self.phase, Phase::Unmounted),
            "create_effect called while a handle or timer is held"
        );
        let Some(target) = self.target.as_ref() else {
            return;
        };

        let theme = self.pending_theme;
        match self.library.init(target, self.effects.for_theme(theme)) {
            Ok(handle) => {
                self.stats.handles_created += 1;
                tracing::debug!(
                    mount = %target,
                    theme = %theme,
                    particles = self.current_config().particle_count,
                    "background effect started"
                );
                self.phase = Phase::Active { handle, theme };
            }
            Err(e) => {
                self.stats.init_failures += 1;
                let failures = self.stats.init_failures;
                let every = u64::from(self.config.slow_library_warn_after.max(1));
                if failures == 1 || failures % every == 0 {
                    tracing::warn!(mount = %target, error = %e, failures, "background effect init failed");
                } else {
                    tracing::debug!(mount = %target, error = %e, failures, "background effect init failed");
                }
                self.begin_polling();
            }
        }
    }

    fn begin_transition(&mut self) {
        if !self.is_active() {
            return;
        }
        let Phase::Active { handle, theme } = std::mem::replace(&mut self.phase, Phase::Unmounted)
        else {
            return;
        };
        self.stats.transitions += 1;
        self.release(handle);

        if let Some(current) = self.target.take() {
            let next = current.next_generation();
            if let Err(e) = self.library.replace_target(&next) {
                tracing::warn!(mount = %next, error = %e, "failed to replace mount target");
            }
            self.target = Some(next);
        }

        let deferral = self.scheduler.schedule_once(Duration::ZERO);
        tracing::debug!(
            from = %theme,
            to = %self.pending_theme,
            timer = %deferral,
            "background transition started"
        );
        self.phase = Phase::Transitioning { deferral };
    }

    fn apply_deferred_theme(&mut self) {
        if let Some(theme) = self.deferred_theme.take() {
            tracing::debug!(theme = %theme, "applying theme change deferred while busy");
            self.on_theme_change(theme);
        }
    }

    fn release(&mut self, handle: L::Handle) {
        tracing::trace!(target_id = %handle.target_id(), "releasing effect handle");
        handle.destroy();
        self.stats.handles_released += 1;
    }
}

impl<L: EffectLibrary> BackgroundEffectController<L, DeterministicScheduler> {
    /// Advance the scheduler clock and dispatch every due timer, one at a time.
    ///
    /// Returns the number of timers dispatched.
    pub fn advance(&mut self, dt: Duration) -> usize {
        self.apply_deferred_theme();
        self.scheduler.advance(dt);
        let mut dispatched = 0;
        while let Some(id) = self.scheduler.pop_due() {
            self.on_timer(id);
            dispatched += 1;
        }
        dispatched
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<L: EffectLibrary, S: Scheduler> Drop for BackgroundEffectController<L, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<L: EffectLibrary, S: Scheduler> fmt::Debug for BackgroundEffectController<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundEffectController")
            .field("state", &self.state())
            .field("target", &self.target)
            .field("pending_theme", &self.pending_theme)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Forward theme changes from `store` to `controller`.
///
/// The store calls the listener immediately, so the controller picks up the
/// current theme before this returns. The controller is held weakly; once it
/// is dropped, notifications are ignored.
///
/// A change that arrives while the controller is borrowed is held and applied
/// on the controller's next `mount`, `reconfigure`, `on_timer` or `advance`.
///
/// # Panics
///
/// If `controller` is mutably borrowed when this is called.
pub fn bind_to_store<L, S>(
    controller: &Rc<RefCell<BackgroundEffectController<L, S>>>,
    store: &ThemePreferenceStore,
) -> ThemeSubscription
where
    L: EffectLibrary + 'static,
    S: Scheduler + 'static,
{
    let deferred = Rc::clone(&controller.borrow().deferred_theme);
    let weak = Rc::downgrade(controller);
    store.subscribe(move |theme| {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        match controller.try_borrow_mut() {
            Ok(mut controller) => controller.on_theme_change(theme),
            Err(_) => {
                tracing::debug!(theme = %theme, "background controller busy, deferring theme change");
                deferred.set(Some(theme));
            }
        }
    })
}
