#![forbid(unsafe_code)]

//! Key/value storage for user preferences.
//!
//! The theme store persists a single string under a single key. Storage is
//! best-effort: hosts may refuse it entirely (private browsing, disabled
//! storage, read-only home directory), so every operation returns a
//! [`StorageResult`] and callers decide how loudly to degrade.
//!
//! # Backends
//!
//! | Backend | Availability | Use |
//! |---------|--------------|-----|
//! | [`MemoryStorage`] | always | tests, fallback |
//! | [`UnavailableStorage`] | always fails | models disabled storage |
//! | [`FileStorage`] | `file-storage` feature | native hosts |
//! | `LocalStorage` | `backdrop-web` | browsers |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, nothing written |
//! | `StorageError::Serialization` | Not JSON, or encode failure | Returns error |
//! | `StorageError::Corruption` | Valid JSON, wrong layout | Returns error |
//! | `StorageError::Unavailable` | Host refuses storage | Returns error |
//! | Missing key | First run | `Ok(None)` |

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during preference storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Stored data has an unexpected layout.
    Corruption(String),
    /// The host does not provide storage right now.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_)
            | StorageError::Corruption(_)
            | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable string key/value storage.
///
/// Backends are used from the UI thread only and need not be `Send`.
pub trait PreferenceStorage {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the value stored under `key`. `Ok(None)` when absent.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is usable.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage. Values are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage holding one value.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.values.borrow_mut().insert(key.into(), value.into());
        storage
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStorage for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unavailable Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Storage that refuses every operation.
#[derive(Debug, Clone)]
pub struct UnavailableStorage {
    reason: String,
}

impl UnavailableStorage {
    /// Create with the reason reported in every error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableStorage {
    fn default() -> Self {
        Self::new("storage disabled")
    }
}

impl PreferenceStorage for UnavailableStorage {
    fn name(&self) -> &str {
        "UnavailableStorage"
    }

    fn read(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }

    fn write(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires file-storage feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "file-storage")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// On-disk layout.
    #[derive(Serialize, Deserialize)]
    struct PreferenceFile {
        format_version: u32,
        values: BTreeMap<String, String>,
    }

    impl PreferenceFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                values: BTreeMap::new(),
            }
        }
    }

    /// JSON file storage.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "values": { "theme": "dark" }
    /// }
    /// ```
    ///
    /// Writes go to `{path}.tmp` first, are flushed and synced, then renamed
    /// over `{path}` so a crash never leaves a half-written file behind.
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Create a file storage at the given path. The file is created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        /// Storage at `$XDG_STATE_HOME/backdrop/{app_name}/preferences.json`.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let base = state_dir_or_fallback();
            let path = base
                .join("backdrop")
                .join(app_name)
                .join("preferences.json");
            Self { path }
        }

        /// Location of the backing file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn load(&self) -> StorageResult<PreferenceFile> {
            if !self.path.exists() {
                return Ok(PreferenceFile::new());
            }

            let file = File::open(&self.path)?;
            let raw: serde_json::Value = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| {
                    StorageError::Serialization(format!("failed to parse preference file: {e}"))
                })?;
            let parsed: PreferenceFile = serde_json::from_value(raw).map_err(|e| {
                StorageError::Corruption(format!("unexpected preference file layout: {e}"))
            })?;

            if parsed.format_version != PreferenceFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = parsed.format_version,
                    expected = PreferenceFile::FORMAT_VERSION,
                    "preference file format version mismatch, ignoring stored values"
                );
                return Ok(PreferenceFile::new());
            }
            Ok(parsed)
        }

        fn store(&self, contents: &PreferenceFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, contents).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize preferences: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = contents.values.len(),
                "saved preferences"
            );
            Ok(())
        }
    }

    fn state_dir_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl PreferenceStorage for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn read(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.load()?.values.remove(key))
        }

        fn write(&self, key: &str, value: &str) -> StorageResult<()> {
            let mut contents = self.load()?;
            contents.values.insert(key.to_string(), value.to_string());
            self.store(&contents)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            let mut contents = self.load()?;
            if contents.values.remove(key).is_some() {
                self.store(&contents)?;
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            let Some(parent) = self.path.parent() else {
                return false;
            };
            if !parent.exists() {
                return fs::create_dir_all(parent).is_ok();
            }
            let probe = parent.join(".backdrop_test_write");
            if fs::write(&probe, b"test").is_ok() {
                let _ = fs::remove_file(&probe);
                return true;
            }
            false
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_read_write_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read("theme").unwrap(), None);
        storage.write("theme", "dark").unwrap();
        assert_eq!(storage.read("theme").unwrap().as_deref(), Some("dark"));
        storage.write("theme", "light").unwrap();
        assert_eq!(storage.len(), 1);
        storage.remove("theme").unwrap();
        storage.remove("theme").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_with_value() {
        let storage = MemoryStorage::with_value("theme", "dark");
        assert_eq!(storage.read("theme").unwrap().as_deref(), Some("dark"));
        assert!(format!("{storage:?}").contains("entries: 1"));
    }

    #[test]
    fn unavailable_storage_fails_everything() {
        let storage = UnavailableStorage::new("private mode");
        assert!(!storage.is_available());
        assert!(matches!(
            storage.read("theme"),
            Err(StorageError::Unavailable(ref msg)) if msg == "private mode"
        ));
        assert!(storage.write("theme", "dark").is_err());
        assert!(storage.remove("theme").is_err());
    }

    #[test]
    fn storage_error_display_and_source() {
        let io = StorageError::from(std::io::Error::other("disk gone"));
        assert!(io.to_string().contains("disk gone"));
        assert!(std::error::Error::source(&io).is_some());
        let unavailable = StorageError::Unavailable("nope".into());
        assert_eq!(unavailable.to_string(), "storage unavailable: nope");
        assert!(std::error::Error::source(&unavailable).is_none());
    }

    #[cfg(feature = "file-storage")]
    mod file {
        use super::super::*;

        #[test]
        fn missing_file_reads_as_absent() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("prefs.json"));
            assert_eq!(storage.read("theme").unwrap(), None);
        }

        #[test]
        fn write_then_read_from_fresh_instance() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("prefs.json");
            FileStorage::new(&path).write("theme", "dark").unwrap();

            let reopened = FileStorage::new(&path);
            assert_eq!(reopened.read("theme").unwrap().as_deref(), Some("dark"));
            assert!(!path.with_extension("json.tmp").exists());
        }

        #[test]
        fn write_preserves_other_keys() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("prefs.json"));
            storage.write("theme", "dark").unwrap();
            storage.write("accent", "green").unwrap();
            storage.remove("theme").unwrap();
            assert_eq!(storage.read("theme").unwrap(), None);
            assert_eq!(storage.read("accent").unwrap().as_deref(), Some("green"));
        }

        #[test]
        fn corrupt_file_is_a_serialization_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prefs.json");
            std::fs::write(&path, "{ this is not json").unwrap();
            assert!(matches!(
                FileStorage::new(&path).read("theme"),
                Err(StorageError::Serialization(_))
            ));
        }

        #[test]
        fn wrong_layout_is_corruption() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prefs.json");
            std::fs::write(&path, r#"{"format_version": 1, "values": {"theme": 7}}"#).unwrap();
            let err = FileStorage::new(&path).read("theme").unwrap_err();
            assert!(matches!(err, StorageError::Corruption(_)));
            assert!(err.to_string().starts_with("storage corruption"));

            std::fs::write(&path, r#"["dark"]"#).unwrap();
            assert!(matches!(
                FileStorage::new(&path).read("theme"),
                Err(StorageError::Corruption(_))
            ));
        }

        #[test]
        fn future_format_version_is_ignored() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prefs.json");
            std::fs::write(&path, r#"{"format_version": 99, "values": {"theme": "dark"}}"#)
                .unwrap();
            assert_eq!(FileStorage::new(&path).read("theme").unwrap(), None);
        }

        #[test]
        fn is_available_for_writable_dir() {
            let dir = tempfile::tempdir().unwrap();
            assert!(FileStorage::new(dir.path().join("prefs.json")).is_available());
        }
    }
}
