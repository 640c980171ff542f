#![forbid(unsafe_code)]

//! Browser timers behind [`Scheduler`].
//!
//! Every scheduled timer owns a `Closure` that forwards its [`TimerId`] to the
//! dispatch sink installed with [`BrowserScheduler::set_dispatch`]. A closure
//! must outlive any JS call into it, so cancelled and fired closures are
//! parked and only dropped on a later scheduler call made outside dispatch.

use backdrop_runtime::{Scheduler, TimerId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::Window;

type Dispatch = Rc<dyn Fn(TimerId)>;

#[derive(Default)]
struct Shared {
    dispatch: RefCell<Option<Dispatch>>,
    dispatching: Cell<bool>,
    fired: RefCell<Vec<TimerId>>,
}

struct ActiveTimer {
    handle: i32,
    repeating: bool,
    closure: Closure<dyn FnMut()>,
}

/// `setInterval` / `setTimeout` scheduler.
pub struct BrowserScheduler {
    window: Window,
    shared: Rc<Shared>,
    active: HashMap<TimerId, ActiveTimer>,
    parked: Vec<Closure<dyn FnMut()>>,
    next_id: u64,
}

impl BrowserScheduler {
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            window,
            shared: Rc::new(Shared::default()),
            active: HashMap::new(),
            parked: Vec::new(),
            next_id: 0,
        }
    }

    /// Where fired timer ids are delivered.
    pub fn set_dispatch(&self, dispatch: impl Fn(TimerId) + 'static) {
        *self.shared.dispatch.borrow_mut() = Some(Rc::new(dispatch));
    }

    /// Number of live timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let fired = self.shared.fired.borrow();
        self.active.keys().filter(|id| !fired.contains(id)).count()
    }

    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId::from_raw(self.next_id)
    }

    fn callback(&self, id: TimerId, repeating: bool) -> Closure<dyn FnMut()> {
        let shared = Rc::clone(&self.shared);
        Closure::new(move || {
            if !repeating {
                shared.fired.borrow_mut().push(id);
            }
            let dispatch = shared.dispatch.borrow().clone();
            if let Some(dispatch) = dispatch {
                shared.dispatching.set(true);
                dispatch(id);
                shared.dispatching.set(false);
            }
        })
    }

    /// Drop closures that can no longer be running.
    fn collect(&mut self) {
        if self.shared.dispatching.get() {
            return;
        }
        let fired: Vec<TimerId> = self.shared.fired.borrow_mut().drain(..).collect();
        for id in fired {
            self.active.remove(&id);
        }
        self.parked.clear();
    }

    fn schedule(&mut self, delay: Duration, repeating: bool) -> TimerId {
        self.collect();
        let id = self.allocate();
        let closure = self.callback(id, repeating);
        let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let function = closure.as_ref().unchecked_ref();
        let started = if repeating {
            self.window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, ms)
        } else {
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, ms)
        };

        match started {
            Ok(handle) => {
                self.active.insert(
                    id,
                    ActiveTimer {
                        handle,
                        repeating,
                        closure,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(timer = %id, error = ?e, "failed to start browser timer");
            }
        }
        id
    }
}

impl Scheduler for BrowserScheduler {
    fn schedule_repeating(&mut self, interval: Duration) -> TimerId {
        self.schedule(interval.max(backdrop_runtime::scheduler::MIN_REPEAT_INTERVAL), true)
    }

    fn schedule_once(&mut self, delay: Duration) -> TimerId {
        self.schedule(delay, false)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let Some(timer) = self.active.remove(&id) else {
            return false;
        };
        if timer.repeating {
            self.window.clear_interval_with_handle(timer.handle);
        } else {
            self.window.clear_timeout_with_handle(timer.handle);
        }
        self.parked.push(timer.closure);

        let mut fired = self.shared.fired.borrow_mut();
        let already_fired = fired.contains(&id);
        fired.retain(|f| *f != id);
        !already_fired
    }

    fn is_scheduled(&self, id: TimerId) -> bool {
        self.active.contains_key(&id) && !self.shared.fired.borrow().contains(&id)
    }
}

impl Drop for BrowserScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.active.drain() {
            if timer.repeating {
                self.window.clear_interval_with_handle(timer.handle);
            } else {
                self.window.clear_timeout_with_handle(timer.handle);
            }
        }
    }
}
