#![forbid(unsafe_code)]

//! `particles.js` adapter.
//!
//! The script registers `window.particlesJS(tagId, params)` once loaded and
//! keeps every running instance in the global `window.pJSDom` array. Each
//! entry's `pJS.canvas.el` is the `<canvas>` it appended to the target
//! element, which is how a handle finds its own instance again.

use backdrop_core::EffectConfig;
use backdrop_runtime::{EffectError, EffectHandle, EffectLibrary, MountTarget};
use js_sys::{Array, Function, JSON, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Window};

const ENTRY_POINT: &str = "particlesJS";
const REGISTRY: &str = "pJSDom";

/// `Reflect.get` along `keys`, stopping at the first missing link.
fn lookup(root: &JsValue, keys: &[&str]) -> Option<JsValue> {
    let mut current = root.clone();
    for key in keys {
        if current.is_undefined() || current.is_null() {
            return None;
        }
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
    }
    (!current.is_undefined() && !current.is_null()).then_some(current)
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// The `particles.js` library loaded into the page.
#[derive(Debug, Clone)]
pub struct ParticlesJs {
    window: Window,
    document: Document,
}

impl ParticlesJs {
    /// Bind to the current page. `None` outside a browsing context.
    #[must_use]
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn target_element(&self, target: &MountTarget) -> Result<Element, EffectError> {
        self.document
            .get_element_by_id(target.id())
            .ok_or_else(|| EffectError::TargetMissing(target.id().to_string()))
    }
}

impl EffectLibrary for ParticlesJs {
    type Handle = ParticlesJsHandle;

    fn is_ready(&self) -> bool {
        lookup(self.window.as_ref(), &[ENTRY_POINT]).is_some_and(|f| f.is_function())
    }

    fn init(
        &mut self,
        target: &MountTarget,
        config: &EffectConfig,
    ) -> Result<Self::Handle, EffectError> {
        let entry: Function = lookup(self.window.as_ref(), &[ENTRY_POINT])
            .and_then(|f| f.dyn_into().ok())
            .ok_or(EffectError::NotReady)?;
        self.target_element(target)?;

        let params = JSON::parse(&crate::particles_params(config))
            .map_err(|e| EffectError::Init(describe(&e)))?;
        entry
            .call2(&JsValue::NULL, &JsValue::from_str(target.id()), &params)
            .map_err(|e| EffectError::Init(describe(&e)))?;

        Ok(ParticlesJsHandle {
            target_id: target.id().to_string(),
            window: self.window.clone(),
            document: self.document.clone(),
        })
    }

    fn replace_target(&mut self, target: &MountTarget) -> Result<(), EffectError> {
        let element = self.target_element(target)?;
        let fresh = element
            .clone_node_with_deep(false)
            .map_err(|e| EffectError::Init(describe(&e)))?;
        element
            .replace_with_with_node_1(&fresh)
            .map_err(|e| EffectError::Init(describe(&e)))?;
        tracing::trace!(mount = %target, "replaced particles surface");
        Ok(())
    }
}

/// A running `particles.js` instance.
#[derive(Debug)]
pub struct ParticlesJsHandle {
    target_id: String,
    window: Window,
    document: Document,
}

impl ParticlesJsHandle {
    fn owns(&self, entry: &JsValue) -> bool {
        lookup(entry, &["pJS", "canvas", "el", "parentElement", "id"])
            .and_then(|id| id.as_string())
            .is_some_and(|id| id == self.target_id)
    }
}

impl EffectHandle for ParticlesJsHandle {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn destroy(self) {
        let window: &JsValue = self.window.as_ref();
        let kept = Array::new();
        let mut destroyed = 0u32;

        if let Some(registry) = lookup(window, &[REGISTRY]).filter(Array::is_array) {
            for entry in Array::from(&registry).iter() {
                if !self.owns(&entry) {
                    kept.push(&entry);
                    continue;
                }
                let destroy = lookup(&entry, &["pJS", "fn", "vendors", "destroypJS"])
                    .and_then(|f| f.dyn_into::<Function>().ok());
                if let Some(destroy) = destroy {
                    let this = lookup(&entry, &["pJS", "fn", "vendors"]).unwrap_or(JsValue::NULL);
                    if let Err(e) = destroy.call0(&this) {
                        tracing::warn!(target_id = %self.target_id, error = %describe(&e), "destroypJS failed");
                    }
                }
                destroyed += 1;
            }
        }

        // destroypJS nulls the registry; later particlesJS calls expect an array.
        if let Err(e) = Reflect::set(window, &JsValue::from_str(REGISTRY), &kept) {
            tracing::warn!(error = %describe(&e), "failed to reset pJSDom");
        }
        if let Some(element) = self.document.get_element_by_id(&self.target_id) {
            element.set_inner_html("");
        }
        tracing::trace!(target_id = %self.target_id, destroyed, "released particles instance");
    }
}
