//! Session-scoped key-value store.
//!
//! Holds the handful of values that must survive a page navigation but
//! nothing longer: one JSON object, file backed, with consume-once reads.
//! A missing or corrupt session file degrades to an empty store; write
//! failures are swallowed so the store can never break navigation.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};

/// Reserved key: vertical offset of the last-clicked sidebar link
/// relative to the sidebar viewport, recorded just before a navigation.
pub const SIDEBAR_SCROLL_OFFSET: &str = "sidebar-scroll-offset";

/// A small string-to-string store scoped to one viewing session.
pub struct SessionStore {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl SessionStore {
    /// A store with no file backing. Used in tests and as a fallback when
    /// no writable session path is available.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Map::new(),
        }
    }

    /// Load the store from `path`, or start empty if the file is missing
    /// or does not parse as a JSON object.
    pub fn load(path: PathBuf) -> Self {
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            path: Some(path),
            values,
        }
    }

    /// Set `key` to `value` and persist immediately.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_owned(), Value::String(value.to_owned()));
        self.persist();
    }

    /// Consume-once read: removes `key` and persists the removal, so a
    /// second read in the same session returns `None`.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let taken = match self.values.remove(key)? {
            Value::String(s) => Some(s),
            _ => None,
        };
        self.persist();
        taken
    }

    fn persist(&self) {
        if let Some(path) = &self.path {
            // Write failures must not surface; the next navigation simply
            // sees an older (or empty) store.
            let _ = fs::write(path, Value::Object(self.values.clone()).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mdnav_session_{}_{}.json", tag, std::process::id()))
    }

    #[test]
    fn take_is_consume_once() {
        let mut store = SessionStore::in_memory();
        store.set(SIDEBAR_SCROLL_OFFSET, "42");
        assert_eq!(store.take(SIDEBAR_SCROLL_OFFSET).as_deref(), Some("42"));
        assert_eq!(store.take(SIDEBAR_SCROLL_OFFSET), None);
    }

    #[test]
    fn values_survive_reload() {
        let path = temp_session_path("reload");
        let _ = fs::remove_file(&path);

        let mut store = SessionStore::load(path.clone());
        store.set(SIDEBAR_SCROLL_OFFSET, "17.5");
        drop(store);

        let mut reloaded = SessionStore::load(path.clone());
        assert_eq!(
            reloaded.take(SIDEBAR_SCROLL_OFFSET).as_deref(),
            Some("17.5")
        );

        // The removal is persisted too.
        let mut third = SessionStore::load(path.clone());
        assert_eq!(third.take(SIDEBAR_SCROLL_OFFSET), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let path = temp_session_path("corrupt");
        fs::write(&path, "not json {").unwrap();

        let mut store = SessionStore::load(path.clone());
        assert_eq!(store.take(SIDEBAR_SCROLL_OFFSET), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn non_object_json_degrades_to_empty() {
        let path = temp_session_path("array");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let mut store = SessionStore::load(path.clone());
        assert_eq!(store.take(SIDEBAR_SCROLL_OFFSET), None);

        let _ = fs::remove_file(&path);
    }
}
