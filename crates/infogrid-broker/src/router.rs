//! Routing provider — composes providers into a priority chain.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::args::QueryArgs;
use crate::error::{BrokerError, BrokerResult};
use crate::provider::InfoProvider;

/// A provider that delegates to an ordered list of sub-providers.
///
/// An optional local provider takes absolute priority over the
/// sub-providers; among sub-providers, list position decides. Resolution is
/// deterministic and non-backtracking: once a sub-provider claims a key via
/// `can_get`, its `get` is trusted — if it fails anyway, the error
/// propagates instead of trying the next sub-provider.
///
/// Both the local provider and the sub-provider list are fixed at
/// construction.
pub struct InfoRouter {
    local: Option<Arc<dyn InfoProvider>>,
    sub_providers: Vec<Arc<dyn InfoProvider>>,
}

impl InfoRouter {
    /// A router over the given sub-providers, with no local handlers.
    pub fn new(sub_providers: Vec<Arc<dyn InfoProvider>>) -> Self {
        Self {
            local: None,
            sub_providers,
        }
    }

    /// A router whose `local` provider overrides every sub-provider.
    pub fn with_local(
        local: Arc<dyn InfoProvider>,
        sub_providers: Vec<Arc<dyn InfoProvider>>,
    ) -> Self {
        Self {
            local: Some(local),
            sub_providers,
        }
    }

    /// The first provider that can handle `key`, in priority order.
    fn find_responsible(&self, key: &str) -> Option<&dyn InfoProvider> {
        debug!(%key, "routing query");
        if let Some(local) = &self.local
            && local.can_get(key)
        {
            return Some(local.as_ref());
        }
        self.sub_providers
            .iter()
            .find(|p| p.can_get(key))
            .map(|p| p.as_ref())
    }
}

impl InfoProvider for InfoRouter {
    fn get(&self, key: &str, args: &QueryArgs) -> BrokerResult<Value> {
        match self.find_responsible(key) {
            Some(responsible) => responsible.get(key, args),
            None => Err(BrokerError::KeyNotFound(key.to_string())),
        }
    }

    fn can_get(&self, key: &str) -> bool {
        self.find_responsible(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match &self.local {
            Some(local) => local.keys(),
            None => Vec::new(),
        };
        for sub in &self.sub_providers {
            keys.extend(sub.keys());
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HandlerTable;
    use std::sync::LazyLock;

    /// A provider answering a fixed key with a fixed value.
    struct FixedProvider {
        key: &'static str,
        value: &'static str,
    }

    impl InfoProvider for FixedProvider {
        fn get(&self, key: &str, _args: &QueryArgs) -> BrokerResult<Value> {
            if key == self.key {
                Ok(Value::from(self.value))
            } else {
                Err(BrokerError::KeyNotFound(key.to_string()))
            }
        }
        fn can_get(&self, key: &str) -> bool {
            key == self.key
        }
        fn keys(&self) -> Vec<String> {
            vec![self.key.to_string()]
        }
    }

    /// A provider that claims a key but fails to serve it.
    struct LyingProvider;

    impl InfoProvider for LyingProvider {
        fn get(&self, key: &str, _args: &QueryArgs) -> BrokerResult<Value> {
            Err(BrokerError::KeyNotFound(key.to_string()))
        }
        fn can_get(&self, _key: &str) -> bool {
            true
        }
        fn keys(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct LocalProvider;

    impl LocalProvider {
        fn table() -> &'static HandlerTable<Self> {
            static TABLE: LazyLock<HandlerTable<LocalProvider>> = LazyLock::new(|| {
                HandlerTable::new().with("shared.key", |_, _| Ok(Value::from("local")))
            });
            &TABLE
        }
    }

    impl InfoProvider for LocalProvider {
        fn get(&self, key: &str, args: &QueryArgs) -> BrokerResult<Value> {
            Self::table().dispatch(self, key, args)
        }
        fn can_get(&self, key: &str) -> bool {
            Self::table().contains(key)
        }
        fn keys(&self) -> Vec<String> {
            Self::table().keys()
        }
    }

    fn fixed(key: &'static str, value: &'static str) -> Arc<dyn InfoProvider> {
        Arc::new(FixedProvider { key, value })
    }

    #[test]
    fn local_handler_wins_over_sub_provider() {
        let router = InfoRouter::with_local(
            Arc::new(LocalProvider),
            vec![fixed("shared.key", "from-sub")],
        );
        let result = router.get("shared.key", &QueryArgs::new()).unwrap();
        assert_eq!(result, Value::from("local"));
    }

    #[test]
    fn falls_back_to_only_capable_sub_provider() {
        let router = InfoRouter::new(vec![fixed("a.key", "a"), fixed("b.key", "b")]);
        assert_eq!(
            router.get("b.key", &QueryArgs::new()).unwrap(),
            Value::from("b")
        );
    }

    #[test]
    fn earlier_sub_provider_shadows_later() {
        let router = InfoRouter::new(vec![fixed("same.key", "first"), fixed("same.key", "second")]);
        assert_eq!(
            router.get("same.key", &QueryArgs::new()).unwrap(),
            Value::from("first")
        );
    }

    #[test]
    fn unresolvable_key_is_key_not_found() {
        let router = InfoRouter::new(vec![fixed("a.key", "a")]);
        let err = router.get("missing.key", &QueryArgs::new()).unwrap_err();
        assert!(matches!(err, BrokerError::KeyNotFound(_)));
        assert!(!router.can_get("missing.key"));
    }

    #[test]
    fn claimed_key_failure_propagates_without_backtracking() {
        // LyingProvider claims everything; the capable provider behind it
        // must never be consulted.
        let router = InfoRouter::new(vec![Arc::new(LyingProvider), fixed("x.key", "x")]);
        let err = router.get("x.key", &QueryArgs::new()).unwrap_err();
        assert!(matches!(err, BrokerError::KeyNotFound(_)));
    }

    #[test]
    fn nested_routers_resolve_transitively() {
        let inner = InfoRouter::new(vec![fixed("deep.key", "deep")]);
        let outer = InfoRouter::new(vec![fixed("top.key", "top"), Arc::new(inner)]);
        assert_eq!(
            outer.get("deep.key", &QueryArgs::new()).unwrap(),
            Value::from("deep")
        );
        assert!(outer.can_get("deep.key"));
    }

    #[test]
    fn keys_flatten_in_priority_order() {
        let inner = InfoRouter::new(vec![fixed("c.key", "c")]);
        let router = InfoRouter::with_local(
            Arc::new(LocalProvider),
            vec![fixed("a.key", "a"), Arc::new(inner)],
        );
        assert_eq!(router.keys(), vec!["shared.key", "a.key", "c.key"]);
    }
}
