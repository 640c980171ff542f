#![forbid(unsafe_code)]

use crate::local_storage::LocalStorage;
use crate::options::WebOptions;
use crate::particles::ParticlesJs;
use crate::timer::BrowserScheduler;
use backdrop_core::ThemePreference;
use backdrop_runtime::{
    BackgroundEffectController, EffectState, MountOutcome, ThemePreferenceStore,
    ThemeSubscription, bind_to_store,
};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

type Controller = BackgroundEffectController<ParticlesJs, BrowserScheduler>;

/// Themed particle background for a portfolio page.
///
/// ```js
/// const bg = new PortfolioBackground({ targetId: "particles-js" });
/// bg.mount();
/// button.onclick = () => bg.toggle();
/// ```
#[wasm_bindgen]
pub struct PortfolioBackground {
    store: ThemePreferenceStore,
    controller: Rc<RefCell<Controller>>,
    subscriptions: Vec<ThemeSubscription>,
}

#[wasm_bindgen]
impl PortfolioBackground {
    /// Build the store and controller. Nothing is drawn until [`mount`](Self::mount).
    #[wasm_bindgen(constructor)]
    pub fn new(options: Option<JsValue>) -> Result<PortfolioBackground, JsValue> {
        let options = match options.filter(|o| !o.is_undefined() && !o.is_null()) {
            Some(value) => {
                let json = js_sys::JSON::stringify(&value)?;
                WebOptions::from_json(&String::from(json))
                    .map_err(|e| JsValue::from_str(&e.to_string()))?
            }
            None => WebOptions::default(),
        };
        crate::console::init(options.log_filter());

        let config = options.background_config();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let library =
            ParticlesJs::from_window().ok_or_else(|| JsValue::from_str("no document"))?;

        let store =
            ThemePreferenceStore::with_key(Box::new(LocalStorage::new()), config.storage_key.clone());
        if !ThemePreferenceStore::install_global(store.clone()) {
            tracing::debug!("reusing the page's existing theme store");
        }
        let store = ThemePreferenceStore::global();

        let controller = Rc::new(RefCell::new(
            BackgroundEffectController::new(library, BrowserScheduler::new(window))
                .with_effects(options.effects())
                .with_config(config),
        ));

        let weak = Rc::downgrade(&controller);
        controller.borrow().scheduler().set_dispatch(move |id| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            match controller.try_borrow_mut() {
                Ok(mut controller) => controller.on_timer(id),
                Err(_) => tracing::warn!(timer = %id, "background controller busy, timer dropped"),
            };
        });

        let binding = bind_to_store(&controller, &store);
        Ok(Self {
            store,
            controller,
            subscriptions: vec![binding],
        })
    }

    /// Mount on `target_id`, or on the configured target when omitted.
    ///
    /// Returns `"started"`, `"already-mounted"` or `"remounted"`.
    pub fn mount(&self, target_id: Option<String>) -> String {
        let mut controller = self.controller.borrow_mut();
        let outcome = match target_id {
            Some(id) => controller.mount(&id),
            None => controller.mount_default(),
        };
        match outcome {
            MountOutcome::Started => "started",
            MountOutcome::AlreadyMounted => "already-mounted",
            MountOutcome::Remounted => "remounted",
        }
        .to_string()
    }

    pub fn unmount(&self) {
        self.controller.borrow_mut().unmount();
    }

    /// Flip the theme and return the new one.
    pub fn toggle(&self) -> String {
        self.store.toggle().as_str().to_string()
    }

    pub fn theme(&self) -> String {
        self.store.theme().as_str().to_string()
    }

    #[wasm_bindgen(js_name = setTheme)]
    pub fn set_theme(&self, theme: &str) -> Result<(), JsValue> {
        let theme: ThemePreference = theme
            .parse()
            .map_err(|e: backdrop_core::ParseThemeError| JsValue::from_str(&e.to_string()))?;
        self.store.set(theme);
        Ok(())
    }

    /// `"unmounted"`, `"awaiting-library"`, `"active"` or `"transitioning"`.
    pub fn state(&self) -> String {
        match self.controller.borrow().state() {
            EffectState::Unmounted => "unmounted",
            EffectState::AwaitingLibrary { .. } => "awaiting-library",
            EffectState::Active { .. } => "active",
            EffectState::Transitioning => "transitioning",
        }
        .to_string()
    }

    /// Call `callback(theme)` now and on every change until [`destroy`](Self::destroy).
    #[wasm_bindgen(js_name = onThemeChange)]
    pub fn on_theme_change(&mut self, callback: js_sys::Function) {
        let subscription = self.store.subscribe(move |theme| {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(theme.as_str())) {
                tracing::warn!(error = ?e, "theme listener threw");
            }
        });
        self.subscriptions.push(subscription);
    }

    /// Explicit teardown for JS callers.
    pub fn destroy(&mut self) {
        self.subscriptions.clear();
        self.controller.borrow_mut().unmount();
    }
}
