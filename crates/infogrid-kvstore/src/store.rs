//! The key-value store contract.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::pattern;

/// Key selection for [`KeyValueStore::enumerate`].
pub enum KeyPattern<'a> {
    /// A glob pattern (`*`, `?`, `[seq]`), matched by the backend where it
    /// can (the networked backend pushes globs server-side).
    Glob(&'a str),
    /// An arbitrary predicate, evaluated client-side over a full key scan.
    Predicate(&'a dyn Fn(&str) -> bool),
}

/// Abstract get/set/enumerate/delete over a storage backend.
///
/// Storage contract: every read returns a value independent of the stored
/// representation — callers may freely mutate what they get back without
/// corrupting the store, exactly matching what a networked backend provides.
///
/// The `catch_all` flag is a per-instance invariant deciding whether absent
/// keys are an error or a default: a catch-all store claims ownership of the
/// whole keyspace and answers every `has_key` with true.
pub trait KeyValueStore: Send + Sync {
    /// A short tag naming the backend, for diagnostics.
    fn backend_type(&self) -> &'static str;

    /// Whether this store claims ownership of all keys.
    fn catch_all(&self) -> bool;

    /// The stored value, or `default` if the key is absent.
    ///
    /// Whether a truly unrecognized key is an error is backend-specific:
    /// the in-memory backend never errors on absence, the networked backend
    /// reports `KeyNotFound` when `catch_all` is false and no default was
    /// supplied.
    fn query_item(&self, key: &str, default: Option<Value>) -> StoreResult<Option<Value>>;

    /// Store `value` under `key`, replacing any prior value.
    fn set_item(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Whether the backend can demonstrate that `key` exists.
    fn contains_key(&self, key: &str) -> StoreResult<bool>;

    /// Whether this store handles `key`: always true for a catch-all store,
    /// otherwise whatever the backend reports.
    fn has_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.catch_all() || self.contains_key(key)?)
    }

    /// The finite, restartable list of keys matching `pattern`.
    fn enumerate(&self, pattern: KeyPattern<'_>) -> StoreResult<Vec<String>>;

    /// Remove `key`. Removing an absent key is a no-op.
    fn delete_key(&self, key: &str) -> StoreResult<()>;

    // ── Field-level sub-operations ─────────────────────────────────
    //
    // Operate on one field of a JSON-object value. The defaults below are
    // read-modify-write over the whole document and therefore NOT atomic
    // under concurrent writers; the networked backend overrides them with
    // native hash commands, narrowing (not eliminating) that race.

    /// One field of the object stored at `key`.
    fn field_get(&self, key: &str, field: &str) -> StoreResult<Option<Value>> {
        Ok(self.load_object(key)?.remove(field))
    }

    /// Set one field of the object stored at `key`, creating the object if
    /// absent.
    fn field_set(&self, key: &str, field: &str, value: Value) -> StoreResult<()> {
        let mut object = self.load_object(key)?;
        object.insert(field.to_string(), value);
        self.set_item(key, Value::Object(object))
    }

    /// Remove one field. Returns whether the field existed.
    fn field_delete(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut object = self.load_object(key)?;
        let existed = object.remove(field).is_some();
        if existed {
            self.set_item(key, Value::Object(object))?;
        }
        Ok(existed)
    }

    /// All field names of the object stored at `key`.
    fn field_names(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.load_object(key)?.keys().cloned().collect())
    }

    /// All (field, value) pairs of the object stored at `key`.
    fn field_entries(&self, key: &str) -> StoreResult<Vec<(String, Value)>> {
        Ok(self.load_object(key)?.into_iter().collect())
    }

    /// The object stored at `key`, or an empty one if the key is absent.
    fn load_object(&self, key: &str) -> StoreResult<Map<String, Value>> {
        match self.query_item(key, None) {
            Ok(Some(Value::Object(object))) => Ok(object),
            Ok(Some(_)) => Err(StoreError::Deserialize(format!(
                "value at {key:?} is not an object"
            ))),
            Ok(None) | Err(StoreError::KeyNotFound(_)) => Ok(Map::new()),
            Err(e) => Err(e),
        }
    }
}

/// Evaluate a pattern against a key, for backends that match client-side.
pub(crate) fn matches(pattern: &KeyPattern<'_>, key: &str) -> StoreResult<bool> {
    match pattern {
        KeyPattern::Glob(glob) => pattern::glob_match(glob, key),
        KeyPattern::Predicate(predicate) => Ok(predicate(key)),
    }
}
