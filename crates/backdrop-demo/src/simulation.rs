#![forbid(unsafe_code)]

//! Scripted page session on a simulated clock.
//!
//! The particle script "loads" after a configurable delay, then the theme is
//! toggled at a fixed cadence while the controller is driven tick by tick.

use crate::cli::Opts;
use backdrop_runtime::{
    BackgroundConfig, BackgroundEffectController, ControllerStats, DeterministicScheduler,
    EffectState, MockEffectLibrary, ThemePreference, ThemePreferenceStore, ThemedEffects,
    bind_to_store,
};
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

/// Outcome of one simulated session.
#[derive(Debug, Clone)]
pub struct Summary {
    pub target: String,
    pub final_theme: ThemePreference,
    pub final_state: EffectState,
    pub toggles: u32,
    pub stats: ControllerStats,
    pub max_concurrent: u32,
    pub live_after_unmount: u32,
}

pub fn run(
    opts: &Opts,
    store: &ThemePreferenceStore,
    effects: ThemedEffects,
    config: BackgroundConfig,
) -> Summary {
    let library = MockEffectLibrary::new();
    let controller = Rc::new(RefCell::new(
        BackgroundEffectController::new(library.clone(), DeterministicScheduler::new())
            .with_effects(effects)
            .with_config(config),
    ));
    let binding = bind_to_store(&controller, store);

    let target = opts
        .target
        .clone()
        .unwrap_or_else(|| controller.borrow().config().target_id.clone());

    let mut loaded = opts.load_after_ms == 0;
    library.set_ready(loaded);
    let mut next_toggle = loaded.then_some(opts.toggle_every_ms);

    controller.borrow_mut().mount(&target);
    let mut last = controller.borrow().state();
    tracing::info!(target_id = %target, state = ?last, theme = %store.theme(), "mounted background");

    let mut now = 0u64;
    let mut toggles = 0u32;
    while now < opts.duration_ms {
        let step = opts.tick_ms.min(opts.duration_ms - now);
        now += step;

        if !loaded && now >= opts.load_after_ms {
            loaded = true;
            library.set_ready(true);
            next_toggle = Some(now.saturating_add(opts.toggle_every_ms));
            tracing::info!(at_ms = now, "particle script loaded");
        }

        controller.borrow_mut().advance(Duration::from_millis(step));

        if let Some(at) = next_toggle
            && now >= at
            && toggles < opts.toggles
        {
            let theme = store.toggle();
            toggles += 1;
            next_toggle = Some(at.saturating_add(opts.toggle_every_ms));
            tracing::info!(at_ms = now, theme = %theme, "toggled theme");
        }

        let state = controller.borrow().state();
        if mem::discriminant(&state) != mem::discriminant(&last) {
            tracing::info!(at_ms = now, state = ?state, "background state changed");
        }
        last = state;
    }

    let (final_state, stats) = {
        let ctl = controller.borrow();
        (ctl.state(), ctl.stats())
    };
    controller.borrow_mut().unmount();
    drop(binding);

    Summary {
        max_concurrent: library.max_concurrent(&target),
        live_after_unmount: library.live_handles(&target),
        target,
        final_theme: store.theme(),
        final_state,
        toggles,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Opts {
        Opts {
            in_memory: true,
            ..Opts::default()
        }
    }

    #[test]
    fn default_session_ends_on_starting_theme() {
        let store = ThemePreferenceStore::in_memory();
        let summary = run(
            &opts(),
            &store,
            ThemedEffects::default(),
            BackgroundConfig::default(),
        );
        assert_eq!(summary.toggles, 2);
        assert_eq!(summary.final_theme, ThemePreference::Light);
        assert_eq!(
            summary.final_state,
            EffectState::Active {
                theme: ThemePreference::Light
            }
        );
        assert_eq!(summary.stats.handles_created, 3);
        assert_eq!(summary.max_concurrent, 1);
        assert_eq!(summary.live_after_unmount, 0);
        assert_eq!(summary.target, "particles-js");
    }

    #[test]
    fn script_never_loading_keeps_polling() {
        let store = ThemePreferenceStore::in_memory();
        let summary = run(
            &Opts {
                load_after_ms: u64::MAX,
                duration_ms: 1000,
                ..opts()
            },
            &store,
            ThemedEffects::default(),
            BackgroundConfig::default(),
        );
        assert_eq!(summary.final_state, EffectState::AwaitingLibrary { attempts: 10 });
        assert_eq!(summary.stats.handles_created, 0);
        assert_eq!(summary.toggles, 0);
    }

    #[test]
    fn huge_toggle_interval_saturates() {
        let store = ThemePreferenceStore::in_memory();
        let summary = run(
            &Opts {
                load_after_ms: 100,
                toggle_every_ms: u64::MAX,
                duration_ms: 500,
                ..opts()
            },
            &store,
            ThemedEffects::default(),
            BackgroundConfig::default(),
        );
        assert_eq!(summary.toggles, 0);

        let half = u64::MAX / 2 + 1;
        let store = ThemePreferenceStore::in_memory();
        let summary = run(
            &Opts {
                load_after_ms: 0,
                toggle_every_ms: half,
                tick_ms: half,
                duration_ms: u64::MAX,
                ..opts()
            },
            &store,
            ThemedEffects::default(),
            BackgroundConfig::default(),
        );
        assert_eq!(summary.toggles, 2);
        assert_eq!(summary.max_concurrent, 1);
        assert_eq!(summary.live_after_unmount, 0);
    }

    #[test]
    fn immediate_load_with_odd_toggles_ends_dark() {
        let store = ThemePreferenceStore::in_memory();
        let summary = run(
            &Opts {
                load_after_ms: 0,
                toggles: 3,
                target: Some("hero".into()),
                ..opts()
            },
            &store,
            ThemedEffects::default(),
            BackgroundConfig::default(),
        );
        assert_eq!(summary.final_theme, ThemePreference::Dark);
        assert_eq!(summary.target, "hero");
        assert_eq!(summary.stats.transitions, 3);
    }
}
