#![forbid(unsafe_code)]

//! Tab-wide theme preference with change notification and persistence.
//!
//! [`ThemePreferenceStore`] is the single source of truth for the active
//! [`ThemePreference`]. It is single-threaded (`Rc` + interior mutability) and
//! cheap to clone; clones share the same state.
//!
//! # Invariants
//!
//! 1. The persisted value is read at most once per store, on first access.
//!    Missing, unparsable or unavailable storage yields [`ThemePreference::Light`].
//! 2. Every change is written back to storage. Write failures are logged and
//!    swallowed; the in-memory value changes regardless.
//! 3. Subscribers are notified synchronously, in registration order, before
//!    [`toggle`](ThemePreferenceStore::toggle) returns.
//! 4. [`subscribe`](ThemePreferenceStore::subscribe) calls the new listener once
//!    with the current value before returning.
//!
//! # Failure Modes
//!
//! | Scenario | Behavior |
//! |----------|----------|
//! | Storage unavailable on read | Default `Light`, `warn` logged |
//! | Garbage stored value | Default `Light`, `warn` logged |
//! | Storage unavailable on write | Value still changes, `warn` logged |
//! | Listener toggles from inside a notification | Nested pass delivers the newer value; the outer pass stops |

use crate::storage::{MemoryStorage, PreferenceStorage};
use backdrop_core::ThemePreference;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Storage key used when none is given.
pub const DEFAULT_STORAGE_KEY: &str = "theme";

type Listener = Rc<dyn Fn(ThemePreference)>;

thread_local! {
    static GLOBAL_STORE: RefCell<Option<ThemePreferenceStore>> = const { RefCell::new(None) };
}

struct StoreInner {
    storage: Box<dyn PreferenceStorage>,
    key: String,
    theme: Cell<Option<ThemePreference>>,
    version: Cell<u64>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener_id: Cell<u64>,
}

/// Theme state shared by everything on the page.
#[derive(Clone)]
pub struct ThemePreferenceStore {
    inner: Rc<StoreInner>,
}

impl ThemePreferenceStore {
    /// Create a store persisting under [`DEFAULT_STORAGE_KEY`].
    ///
    /// Storage is not touched until the first read.
    #[must_use]
    pub fn new(storage: Box<dyn PreferenceStorage>) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    /// Create a store persisting under `key`.
    #[must_use]
    pub fn with_key(storage: Box<dyn PreferenceStorage>, key: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                storage,
                key: key.into(),
                theme: Cell::new(None),
                version: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    /// Create a store backed by [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Install `store` as this thread's global store.
    ///
    /// Returns `false` (and drops `store`) if a global store already exists.
    pub fn install_global(store: ThemePreferenceStore) -> bool {
        GLOBAL_STORE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                tracing::debug!("global theme store already installed");
                return false;
            }
            *slot = Some(store);
            true
        })
    }

    /// This thread's global store, installing an in-memory one if none exists.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_STORE.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(Self::in_memory)
                .clone()
        })
    }

    /// Current theme. Never fails.
    #[must_use]
    pub fn theme(&self) -> ThemePreference {
        if let Some(theme) = self.inner.theme.get() {
            return theme;
        }
        let theme = self.load_persisted();
        self.inner.theme.set(Some(theme));
        theme
    }

    /// Flip light/dark, persist, notify, and return the new theme.
    pub fn toggle(&self) -> ThemePreference {
        let next = self.theme().toggled();
        self.apply(next);
        next
    }

    /// Set the theme explicitly. Unchanged values are neither persisted nor notified.
    pub fn set(&self, theme: ThemePreference) {
        if self.theme() == theme {
            return;
        }
        self.apply(theme);
    }

    /// Register `listener` and call it once with the current theme.
    ///
    /// The listener stays registered until the returned guard is dropped.
    pub fn subscribe(&self, listener: impl Fn(ThemePreference) + 'static) -> ThemeSubscription {
        let id = self.inner.next_listener_id.get() + 1;
        self.inner.next_listener_id.set(id);

        let listener: Listener = Rc::new(listener);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::clone(&listener)));

        let current = self.theme();
        tracing::trace!(listener = id, theme = %current, "theme subscriber registered");
        listener(current);

        ThemeSubscription {
            store: Some(Rc::downgrade(&self.inner)),
            id,
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Change counter; increments once per applied change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether the persisted value has been read yet.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.theme.get().is_some()
    }

    /// Name of the storage backend.
    #[must_use]
    pub fn storage_name(&self) -> &str {
        self.inner.storage.name()
    }

    /// Storage key.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    fn load_persisted(&self) -> ThemePreference {
        let inner = &self.inner;
        match inner.storage.read(&inner.key) {
            Ok(Some(raw)) => match raw.parse::<ThemePreference>() {
                Ok(theme) => {
                    tracing::debug!(
                        backend = %inner.storage.name(),
                        theme = %theme,
                        "restored theme preference"
                    );
                    theme
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring stored theme preference");
                    ThemePreference::default()
                }
            },
            Ok(None) => ThemePreference::default(),
            Err(e) => {
                tracing::warn!(
                    backend = %inner.storage.name(),
                    error = %e,
                    "theme preference storage unavailable, using default"
                );
                ThemePreference::default()
            }
        }
    }

    fn apply(&self, theme: ThemePreference) {
        let inner = &self.inner;
        inner.theme.set(Some(theme));
        let version = inner.version.get() + 1;
        inner.version.set(version);

        if let Err(e) = inner.storage.write(&inner.key, theme.as_str()) {
            tracing::warn!(
                backend = %inner.storage.name(),
                error = %e,
                theme = %theme,
                "failed to persist theme preference"
            );
        }

        // Snapshot so listeners can (un)subscribe while being notified.
        let snapshot: Vec<Listener> = inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();

        tracing::debug!(theme = %theme, version, listeners = snapshot.len(), "theme changed");

        for listener in snapshot {
            if inner.version.get() != version {
                // A listener changed the theme; the nested pass already
                // delivered the newer value to everyone.
                break;
            }
            listener(theme);
        }
    }
}

impl fmt::Debug for ThemePreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemePreferenceStore")
            .field("backend", &self.inner.storage.name())
            .field("key", &self.inner.key)
            .field("theme", &self.inner.theme.get())
            .field("version", &self.inner.version.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registration guard returned by [`ThemePreferenceStore::subscribe`].
///
/// Dropping the guard unregisters the listener.
#[must_use = "dropping this guard unsubscribes the listener"]
pub struct ThemeSubscription {
    store: Option<Weak<StoreInner>>,
    id: u64,
}

impl ThemeSubscription {
    /// Unregister now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the rest of the store's life.
    pub fn detach(mut self) {
        self.store = None;
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|inner| inner.listeners.borrow().iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for ThemeSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        inner
            .listeners
            .borrow_mut()
            .retain(|(id, _)| *id != self.id);
        tracing::trace!(listener = self.id, "theme subscriber removed");
    }
}

impl fmt::Debug for ThemeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, StorageResult, UnavailableStorage};

    /// Storage that counts reads and can refuse writes.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        reads: Cell<u32>,
        refuse_writes: bool,
    }

    impl PreferenceStorage for CountingStorage {
        fn name(&self) -> &str {
            "CountingStorage"
        }

        fn read(&self, key: &str) -> StorageResult<Option<String>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> StorageResult<()> {
            if self.refuse_writes {
                return Err(StorageError::Unavailable("quota".into()));
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<ThemePreference>>>, impl Fn(ThemePreference) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |theme| sink.borrow_mut().push(theme))
    }

    #[test]
    fn defaults_to_light_without_stored_value() {
        let store = ThemePreferenceStore::in_memory();
        assert!(!store.is_loaded());
        assert_eq!(store.theme(), ThemePreference::Light);
        assert!(store.is_loaded());
    }

    #[test]
    fn restores_persisted_value() {
        let store = ThemePreferenceStore::new(Box::new(MemoryStorage::with_value("theme", "dark")));
        assert_eq!(store.theme(), ThemePreference::Dark);
    }

    #[test]
    fn custom_key_is_used() {
        let store = ThemePreferenceStore::with_key(
            Box::new(MemoryStorage::with_value("site-theme", "dark")),
            "site-theme",
        );
        assert_eq!(store.storage_key(), "site-theme");
        assert_eq!(store.theme(), ThemePreference::Dark);
    }

    #[test]
    fn garbage_stored_value_falls_back_to_light() {
        let store =
            ThemePreferenceStore::new(Box::new(MemoryStorage::with_value("theme", "neon")));
        assert_eq!(store.theme(), ThemePreference::Light);
    }

    #[test]
    fn unavailable_storage_falls_back_and_still_toggles() {
        let store = ThemePreferenceStore::new(Box::new(UnavailableStorage::default()));
        assert_eq!(store.theme(), ThemePreference::Light);
        assert_eq!(store.toggle(), ThemePreference::Dark);
        assert_eq!(store.theme(), ThemePreference::Dark);
    }

    #[test]
    fn storage_is_read_once() {
        let storage = Rc::new(CountingStorage::default());
        // Box a forwarding wrapper so the test keeps a handle on the counter.
        struct Shared(Rc<CountingStorage>);
        impl PreferenceStorage for Shared {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn read(&self, key: &str) -> StorageResult<Option<String>> {
                self.0.read(key)
            }
            fn write(&self, key: &str, value: &str) -> StorageResult<()> {
                self.0.write(key, value)
            }
            fn remove(&self, key: &str) -> StorageResult<()> {
                self.0.remove(key)
            }
        }

        let store = ThemePreferenceStore::new(Box::new(Shared(Rc::clone(&storage))));
        for _ in 0..5 {
            let _ = store.theme();
        }
        store.toggle();
        store.toggle();
        assert_eq!(storage.reads.get(), 1);
        assert_eq!(
            storage.inner.read("theme").unwrap().as_deref(),
            Some("light")
        );
    }

    #[test]
    fn write_failure_is_swallowed() {
        let store = ThemePreferenceStore::new(Box::new(CountingStorage {
            refuse_writes: true,
            ..CountingStorage::default()
        }));
        assert_eq!(store.toggle(), ThemePreference::Dark);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn subscribe_calls_eagerly_with_current_value() {
        let store = ThemePreferenceStore::in_memory();
        store.toggle();
        let (seen, listener) = recorder();
        let _sub = store.subscribe(listener);
        assert_eq!(*seen.borrow(), vec![ThemePreference::Dark]);
    }

    #[test]
    fn notifications_follow_registration_order() {
        let store = ThemePreferenceStore::in_memory();
        let order = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let order = Rc::clone(&order);
                store.subscribe(move |theme| order.borrow_mut().push((i, theme)))
            })
            .collect();
        order.borrow_mut().clear();

        store.toggle();
        assert_eq!(
            *order.borrow(),
            vec![
                (0, ThemePreference::Dark),
                (1, ThemePreference::Dark),
                (2, ThemePreference::Dark)
            ]
        );
        drop(subs);
    }

    #[test]
    fn dropping_guard_unsubscribes() {
        let store = ThemePreferenceStore::in_memory();
        let (seen, listener) = recorder();
        let sub = store.subscribe(listener);
        assert!(sub.is_active());
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        store.toggle();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn detached_listener_survives() {
        let store = ThemePreferenceStore::in_memory();
        let (seen, listener) = recorder();
        store.subscribe(listener).detach();
        store.toggle();
        assert_eq!(*seen.borrow(), vec![ThemePreference::Light, ThemePreference::Dark]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn set_same_value_is_silent() {
        let store = ThemePreferenceStore::in_memory();
        let (seen, listener) = recorder();
        let _sub = store.subscribe(listener);
        store.set(ThemePreference::Light);
        assert_eq!(store.version(), 0);
        store.set(ThemePreference::Dark);
        assert_eq!(store.version(), 1);
        assert_eq!(*seen.borrow(), vec![ThemePreference::Light, ThemePreference::Dark]);
    }

    #[test]
    fn listener_may_unsubscribe_others_during_notification() {
        let store = ThemePreferenceStore::in_memory();
        let victim: Rc<RefCell<Option<ThemeSubscription>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&victim);
        let _killer = store.subscribe(move |theme| {
            if theme.is_dark() {
                slot.borrow_mut().take();
            }
        });
        *victim.borrow_mut() = Some(store.subscribe(|_| {}));
        assert_eq!(store.subscriber_count(), 2);

        store.toggle();
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn nested_toggle_stops_stale_outer_pass() {
        let store = ThemePreferenceStore::in_memory();
        let bouncer_store = store.clone();
        let _bouncer = store.subscribe(move |theme| {
            // Refuse dark mode by flipping straight back.
            if theme.is_dark() {
                bouncer_store.toggle();
            }
        });
        let (seen, listener) = recorder();
        let _observer = store.subscribe(listener);

        store.toggle();
        assert_eq!(store.theme(), ThemePreference::Light);
        assert_eq!(seen.borrow().last(), Some(&ThemePreference::Light));
        assert!(!seen.borrow().contains(&ThemePreference::Dark));
    }

    #[test]
    fn global_store_is_installed_once_per_thread() {
        std::thread::spawn(|| {
            let custom =
                ThemePreferenceStore::new(Box::new(MemoryStorage::with_value("theme", "dark")));
            assert!(ThemePreferenceStore::install_global(custom));
            assert!(!ThemePreferenceStore::install_global(
                ThemePreferenceStore::in_memory()
            ));
            assert_eq!(ThemePreferenceStore::global().theme(), ThemePreference::Dark);
            ThemePreferenceStore::global().toggle();
            assert_eq!(ThemePreferenceStore::global().theme(), ThemePreference::Light);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn global_store_defaults_to_memory() {
        std::thread::spawn(|| {
            let store = ThemePreferenceStore::global();
            assert_eq!(store.storage_name(), "MemoryStorage");
        })
        .join()
        .unwrap();
    }
}
