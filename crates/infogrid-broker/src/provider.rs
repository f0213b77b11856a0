//! Information providers and their static handler tables.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::args::QueryArgs;
use crate::error::{BrokerError, BrokerResult};

/// A handler serving one capability key on provider type `P`.
pub type HandlerFn<P> = fn(&P, &QueryArgs) -> BrokerResult<Value>;

/// Immutable key → handler table, built once per provider type.
///
/// The table is static routing data: constructed during type initialization
/// (typically inside a `LazyLock`) and never mutated afterwards. All
/// instances of a provider type share the same table.
pub struct HandlerTable<P> {
    handlers: BTreeMap<&'static str, HandlerFn<P>>,
}

impl<P> HandlerTable<P> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler for `key`. Registering a key twice is a
    /// programming error and panics during type initialization.
    pub fn with(mut self, key: &'static str, handler: HandlerFn<P>) -> Self {
        let previous = self.handlers.insert(key, handler);
        assert!(previous.is_none(), "duplicate handler for key {key:?}");
        self
    }

    /// Whether `key` has a registered handler.
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    /// The keys served by this table.
    pub fn keys(&self) -> Vec<String> {
        self.handlers.keys().map(|k| k.to_string()).collect()
    }

    /// Invoke the handler registered for `key` on `provider`.
    pub fn dispatch(&self, provider: &P, key: &str, args: &QueryArgs) -> BrokerResult<Value> {
        debug!(%key, "dispatching query");
        let handler = self
            .handlers
            .get(key)
            .ok_or_else(|| BrokerError::KeyNotFound(key.to_string()))?;
        handler(provider, args)
    }
}

impl<P> Default for HandlerTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of the information broker: a set of capability keys and the
/// logic answering them.
///
/// The contract: `can_get(key)` is true exactly when `get(key, …)` would not
/// fail with [`BrokerError::KeyNotFound`]. `can_get` depends on the key only,
/// never on arguments.
pub trait InfoProvider: Send + Sync {
    /// Answer the query for `key`, or fail with `KeyNotFound` if this
    /// provider cannot reach it.
    fn get(&self, key: &str, args: &QueryArgs) -> BrokerResult<Value>;

    /// Whether `key` is reachable from this provider.
    fn can_get(&self, key: &str) -> bool;

    /// All keys reachable from this provider, for introspection and tests.
    fn keys(&self) -> Vec<String>;
}
