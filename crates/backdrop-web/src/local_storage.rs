#![forbid(unsafe_code)]

use backdrop_runtime::{PreferenceStorage, StorageError, StorageResult};
use wasm_bindgen::JsValue;
use web_sys::Storage;

/// `window.localStorage` as a preference backend.
///
/// Storage is looked up on every call: browsers may revoke it mid-session, and
/// some throw on the property access itself in private mode. Every JS
/// exception maps to [`StorageError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn storage(&self) -> StorageResult<Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".to_string()))
    }
}

fn js_error(value: JsValue) -> StorageError {
    let message = value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"));
    StorageError::Unavailable(message)
}

impl PreferenceStorage for LocalStorage {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage()?.get_item(key).map_err(js_error)
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage()?.remove_item(key).map_err(js_error)
    }

    fn is_available(&self) -> bool {
        self.storage().is_ok()
    }
}
