#![forbid(unsafe_code)]

//! Backdrop Runtime
//!
//! Host-agnostic runtime for a themed particle background: the persisted
//! light/dark preference and the controller that keeps one particle effect
//! per surface in step with it.
//!
//! # Key Components
//!
//! - [`ThemePreferenceStore`] - Persisted theme with change notification
//! - [`BackgroundEffectController`] - Effect lifecycle state machine
//! - [`EffectLibrary`] / [`EffectHandle`] - Boundary to the rendering library
//! - [`Scheduler`] - Timers the controller asks the host for
//! - [`PreferenceStorage`] - Key/value backend for the preference
//!
//! # How it fits in the system
//! The runtime never touches a clock or a DOM itself. Hosts provide a
//! [`Scheduler`] and an [`EffectLibrary`], and deliver fired timers back
//! through [`BackgroundEffectController::on_timer`]. `backdrop-web` wires the
//! browser versions; tests and the native demo use [`DeterministicScheduler`]
//! and [`MockEffectLibrary`].
//!
//! ```
//! use backdrop_runtime::{
//!     BackgroundEffectController, DeterministicScheduler, MockEffectLibrary,
//!     ThemePreferenceStore, bind_to_store,
//! };
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let library = MockEffectLibrary::ready();
//! let store = ThemePreferenceStore::in_memory();
//! let controller = Rc::new(RefCell::new(BackgroundEffectController::new(
//!     library.clone(),
//!     DeterministicScheduler::new(),
//! )));
//! let _binding = bind_to_store(&controller, &store);
//!
//! controller.borrow_mut().mount("particles-js");
//! store.toggle();
//! controller.borrow_mut().advance(Duration::ZERO);
//! assert_eq!(library.live_handles("particles-js"), 1);
//! ```

pub mod background;
pub mod config;
pub mod library;
pub mod preference;
pub mod scheduler;
pub mod storage;

pub use background::{
    BackgroundEffectController, ControllerStats, EffectState, MountOutcome, bind_to_store,
};
pub use config::BackgroundConfig;
pub use library::{
    EffectError, EffectHandle, EffectLibrary, MockEffectHandle, MockEffectLibrary, MountTarget,
};
pub use preference::{DEFAULT_STORAGE_KEY, ThemePreferenceStore, ThemeSubscription};
pub use scheduler::{DeterministicClock, DeterministicScheduler, Scheduler, TimerId};
#[cfg(feature = "file-storage")]
pub use storage::FileStorage;
pub use storage::{
    MemoryStorage, PreferenceStorage, StorageError, StorageResult, UnavailableStorage,
};

pub use backdrop_core::{EffectConfig, ThemePreference, ThemedEffects};
