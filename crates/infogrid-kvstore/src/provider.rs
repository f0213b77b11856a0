//! An [`InfoProvider`] answering queries straight from a key-value store.

use std::sync::{Arc, LazyLock};

use serde_json::Value;

use infogrid_broker::{BrokerError, BrokerResult, HandlerTable, InfoProvider, QueryArgs};

use crate::store::KeyValueStore;

/// Serves any key present in the backing store, plus a small table of its
/// own. Local table keys take priority over stored keys.
pub struct KeyValueStoreProvider {
    backend: Arc<dyn KeyValueStore>,
}

impl KeyValueStoreProvider {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    fn table() -> &'static HandlerTable<Self> {
        static TABLE: LazyLock<HandlerTable<KeyValueStoreProvider>> = LazyLock::new(|| {
            HandlerTable::new().with("uds.backend_type", |p, _| {
                Ok(Value::from(p.backend.backend_type()))
            })
        });
        &TABLE
    }
}

impl InfoProvider for KeyValueStoreProvider {
    fn get(&self, key: &str, args: &QueryArgs) -> BrokerResult<Value> {
        if Self::table().contains(key) {
            return Self::table().dispatch(self, key, args);
        }
        if self.backend.has_key(key)? {
            let value = self.backend.query_item(key, None)?;
            Ok(value.unwrap_or(Value::Null))
        } else {
            Err(BrokerError::KeyNotFound(key.to_string()))
        }
    }

    fn can_get(&self, key: &str) -> bool {
        Self::table().contains(key) || self.backend.has_key(key).unwrap_or(false)
    }

    fn keys(&self) -> Vec<String> {
        // The stored keyspace is unbounded; only the local table is
        // introspectable.
        Self::table().keys()
    }
}
