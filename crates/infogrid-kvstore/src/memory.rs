//! Non-persistent in-memory backend.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::{self, KeyPattern, KeyValueStore};

/// In-memory [`KeyValueStore`] over a mutex-guarded map.
///
/// Every operation serializes behind one mutex; none of them block on I/O.
/// `query_item` returns a copy of the stored value, never a shared
/// reference, so callers can mutate results freely. Absent keys always
/// yield the default — this backend claims full key ownership and treats
/// absence as "use default", never as an error.
pub struct MemoryStore {
    catch_all: bool,
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            catch_all: false,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Set the `catch_all` flag.
    pub fn with_catch_all(mut self, catch_all: bool) -> Self {
        self.catch_all = catch_all;
        self
    }

    /// A store pre-populated with the given entries.
    pub fn with_initial(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            catch_all: false,
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn catch_all(&self) -> bool {
        self.catch_all
    }

    fn query_item(&self, key: &str, default: Option<Value>) -> StoreResult<Option<Value>> {
        debug!(%key, "querying");
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).cloned().or(default))
    }

    fn set_item(&self, key: &str, value: Value) -> StoreResult<()> {
        debug!(%key, "setting");
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.contains_key(key))
    }

    fn enumerate(&self, pattern: KeyPattern<'_>) -> StoreResult<Vec<String>> {
        let keys: Vec<String> = {
            let entries = self.entries.lock().unwrap();
            entries.keys().cloned().collect()
        };
        let mut matched = Vec::new();
        for key in keys {
            if store::matches(&pattern, &key)? {
                matched.push(key);
            }
        }
        Ok(matched)
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        debug!(%key, "deleting");
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn set_then_query_round_trips() {
        let store = MemoryStore::new();
        store.set_item("k", json!({"a": 1})).unwrap();
        assert_eq!(store.query_item("k", None).unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn absent_key_yields_default() {
        let store = MemoryStore::new();
        assert_eq!(store.query_item("nope", None).unwrap(), None);
        assert_eq!(
            store.query_item("nope", Some(json!(42))).unwrap(),
            Some(json!(42))
        );
    }

    #[test]
    fn query_returns_independent_copy() {
        let store = MemoryStore::new();
        store.set_item("k", json!({"nested": {"n": 1}})).unwrap();

        let mut first = store.query_item("k", None).unwrap().unwrap();
        first["nested"]["n"] = json!(999);

        let second = store.query_item("k", None).unwrap().unwrap();
        assert_eq!(second, json!({"nested": {"n": 1}}));
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = MemoryStore::new();
        store.set_item("k", json!(1)).unwrap();
        store.set_item("k", json!(2)).unwrap();
        assert_eq!(store.query_item("k", None).unwrap(), Some(json!(2)));
    }

    #[test]
    fn has_key_honors_catch_all() {
        let store = MemoryStore::new();
        assert!(!store.has_key("k").unwrap());

        let catch_all = MemoryStore::new().with_catch_all(true);
        assert!(catch_all.has_key("k").unwrap());
    }

    #[test]
    fn delete_then_has_key_is_false() {
        let store = MemoryStore::new();
        store.set_item("k", json!(1)).unwrap();
        store.delete_key("k").unwrap();
        assert!(!store.has_key("k").unwrap());
        // Deleting again is a no-op.
        store.delete_key("k").unwrap();
    }

    #[test]
    fn enumerate_glob() {
        let store = MemoryStore::with_initial([
            ("alma".to_string(), json!("korte")),
            ("medve".to_string(), json!("durva")),
            ("elme".to_string(), json!("ize")),
        ]);
        let keys: BTreeSet<String> = store
            .enumerate(KeyPattern::Glob("*e*"))
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            keys,
            BTreeSet::from(["medve".to_string(), "elme".to_string()])
        );
    }

    #[test]
    fn enumerate_predicate() {
        let store = MemoryStore::with_initial([
            ("infra:1:state".to_string(), json!({})),
            ("infra:2:state".to_string(), json!({})),
            ("node_def:web".to_string(), json!([])),
        ]);
        let predicate = |k: &str| k.starts_with("infra:");
        let keys = store.enumerate(KeyPattern::Predicate(&predicate)).unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn field_operations_over_document() {
        let store = MemoryStore::new();
        store.field_set("scaling", "node-count-web", json!(3)).unwrap();
        store.field_set("scaling", "node-count-db", json!(1)).unwrap();

        assert_eq!(
            store.field_get("scaling", "node-count-web").unwrap(),
            Some(json!(3))
        );
        assert_eq!(store.field_get("scaling", "missing").unwrap(), None);

        let mut names = store.field_names("scaling").unwrap();
        names.sort();
        assert_eq!(names, vec!["node-count-db", "node-count-web"]);

        assert!(store.field_delete("scaling", "node-count-db").unwrap());
        assert!(!store.field_delete("scaling", "node-count-db").unwrap());
        assert_eq!(store.field_entries("scaling").unwrap().len(), 1);
    }

    #[test]
    fn field_get_on_absent_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.field_get("nope", "f").unwrap(), None);
        assert!(store.field_names("nope").unwrap().is_empty());
    }
}
