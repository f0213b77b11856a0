//! Best-effort push-notification side channel.
//!
//! Notification delivery must never fail the event-log call itself: every
//! decode or delivery problem degrades to a logged no-op.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A push-notification delivery backend, registered under a type tag.
pub trait PushSender: Send + Sync {
    fn send(
        &self,
        event_name: &str,
        timestamp: u64,
        payload: &Map<String, Value>,
    ) -> anyhow::Result<()>;
}

/// Resolves a per-infrastructure notification configuration to a sender.
#[derive(Default)]
pub struct NotifierRegistry {
    senders: HashMap<String, Arc<dyn PushSender>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivery backend under its type tag.
    pub fn register(mut self, type_tag: &str, sender: Arc<dyn PushSender>) -> Self {
        self.senders.insert(type_tag.to_string(), sender);
        self
    }

    /// Attempt delivery for the given notification configuration.
    ///
    /// The configuration is either a JSON object or a JSON-encoded string
    /// of one, carrying a `type` field naming the sender. Anything that
    /// goes wrong is logged and swallowed.
    pub fn notify(
        &self,
        config: Option<&Value>,
        event_name: &str,
        timestamp: u64,
        payload: &Map<String, Value>,
    ) {
        let Some(config) = config else {
            return;
        };

        // Stored configurations may be JSON text; decode failures are a
        // no-op by contract.
        let decoded;
        let config = match config {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => {
                    decoded = value;
                    &decoded
                }
                Err(e) => {
                    debug!(error = %e, "undecodable notification configuration");
                    return;
                }
            },
            other => other,
        };

        let Some(type_tag) = config.get("type").and_then(Value::as_str) else {
            warn!("notification configuration without a type");
            return;
        };
        let Some(sender) = self.senders.get(type_tag) else {
            warn!(%type_tag, "unknown notification type");
            return;
        };

        if let Err(e) = sender.send(event_name, timestamp, payload) {
            warn!(%type_tag, %event_name, error = %e, "notification delivery failed");
        } else {
            debug!(%type_tag, %event_name, "notification sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl PushSender for RecordingSender {
        fn send(
            &self,
            event_name: &str,
            _timestamp: u64,
            _payload: &Map<String, Value>,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("delivery refused");
            }
            self.sent.lock().unwrap().push(event_name.to_string());
            Ok(())
        }
    }

    #[test]
    fn delivers_to_the_configured_sender() {
        let sender = Arc::new(RecordingSender::default());
        let registry = NotifierRegistry::new().register("push", Arc::clone(&sender) as _);

        let config = json!({"type": "push", "push": {"target": "t1"}});
        registry.notify(Some(&config), "nodecreated", 1, &Map::new());

        assert_eq!(*sender.sent.lock().unwrap(), vec!["nodecreated"]);
    }

    #[test]
    fn json_encoded_string_configs_are_decoded() {
        let sender = Arc::new(RecordingSender::default());
        let registry = NotifierRegistry::new().register("push", Arc::clone(&sender) as _);

        let config = Value::String(r#"{"type": "push"}"#.to_string());
        registry.notify(Some(&config), "infraready", 1, &Map::new());

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn failures_degrade_to_a_no_op() {
        let registry = NotifierRegistry::new().register(
            "push",
            Arc::new(RecordingSender {
                fail: true,
                ..Default::default()
            }),
        );

        // None of these may panic or surface an error.
        registry.notify(None, "e", 1, &Map::new());
        registry.notify(Some(&json!("not json at all")), "e", 1, &Map::new());
        registry.notify(Some(&json!({"no_type": true})), "e", 1, &Map::new());
        registry.notify(Some(&json!({"type": "unregistered"})), "e", 1, &Map::new());
        registry.notify(Some(&json!({"type": "push"})), "e", 1, &Map::new());
    }
}
