//! The event log.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};
use tracing::debug;

use infogrid_broker::{BrokerError, BrokerResult};
use infogrid_uds::{InstanceData, Uds};

use crate::event::{Event, EventSink, TracingEventSink};
use crate::notifier::NotifierRegistry;

/// Timestamps and persists structured lifecycle events.
///
/// Every record goes to the configured sink; independently, a best-effort
/// push notification is attempted through the infrastructure's stored
/// notification configuration. Notification failures never surface to the
/// caller.
pub struct EventLog {
    sink: Box<dyn EventSink>,
    notifiers: NotifierRegistry,
    uds: Arc<dyn Uds>,
}

impl EventLog {
    /// An event log recording to the standard logging channel.
    pub fn new(uds: Arc<dyn Uds>) -> Self {
        Self {
            sink: Box::new(TracingEventSink),
            notifiers: NotifierRegistry::new(),
            uds,
        }
    }

    /// Replace the record sink.
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Attach push-notification delivery backends.
    pub fn with_notifiers(mut self, notifiers: NotifierRegistry) -> Self {
        self.notifiers = notifiers;
        self
    }

    /// Timestamp and store an event. Exactly one of `event_data` and
    /// `fields` may carry the payload; supplying both is an error. Without
    /// an explicit timestamp the current time is used.
    pub fn log_event(
        &self,
        infra_id: &str,
        event_name: &str,
        timestamp: Option<u64>,
        event_data: Option<Map<String, Value>>,
        fields: Map<String, Value>,
    ) -> BrokerResult<()> {
        if event_data.is_some() && !fields.is_empty() {
            return Err(BrokerError::Argument(
                "event_data and fields cannot be specified together".to_string(),
            ));
        }

        let mut payload = event_data.unwrap_or(fields);
        payload.insert("infra_id".to_string(), Value::from(infra_id));
        let timestamp = timestamp.unwrap_or_else(epoch_secs);

        let event = Event {
            infra_id: infra_id.to_string(),
            event_name: event_name.to_string(),
            timestamp,
            payload,
        };

        self.notifiers.notify(
            self.uds.get_infrastructure_notification(infra_id).as_ref(),
            event_name,
            timestamp,
            &event.payload,
        );

        debug!(%infra_id, %event_name, timestamp, "logging event");
        self.sink
            .record(&event)
            .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    // ── Canonical lifecycle events ─────────────────────────────────

    /// Store event: infrastructure created.
    pub fn infrastructure_created(&self, infra_id: &str) -> BrokerResult<()> {
        self.log_event(infra_id, "infrastart", None, None, Map::new())
    }

    /// Store event: infrastructure updated.
    pub fn infrastructure_updated(&self, infra_id: &str) -> BrokerResult<()> {
        self.log_event(infra_id, "infraupdated", None, None, Map::new())
    }

    /// Store event: infrastructure is ready.
    pub fn infrastructure_ready(&self, infra_id: &str) -> BrokerResult<()> {
        self.log_event(infra_id, "infraready", None, None, Map::new())
    }

    /// Store event: infrastructure deleted.
    pub fn infrastructure_deleted(&self, infra_id: &str) -> BrokerResult<()> {
        self.log_event(infra_id, "infradrop", None, None, Map::new())
    }

    /// Store event: node creation started.
    pub fn node_creating(&self, instance: &InstanceData) -> BrokerResult<()> {
        let node_name = &instance.node_description.name;
        let target_count = self
            .uds
            .get_scaling_target_count(&instance.infra_id, node_name)?
            .unwrap_or(1);
        let mut fields = Map::new();
        fields.insert("node_id".to_string(), json!(instance.node_id));
        fields.insert("node_name".to_string(), json!(node_name));
        fields.insert("scaling_target_count".to_string(), json!(target_count));
        self.log_event(&instance.infra_id, "nodecreating", None, None, fields)
    }

    /// Store event: node created.
    pub fn node_created(&self, instance: &InstanceData) -> BrokerResult<()> {
        self.log_node_event(instance, "nodecreated")
    }

    /// Store event: node failed.
    pub fn node_failed(&self, instance: &InstanceData) -> BrokerResult<()> {
        self.log_node_event(instance, "nodefailed")
    }

    /// Store event: node deletion started.
    pub fn node_deleting(&self, instance: &InstanceData) -> BrokerResult<()> {
        self.log_node_event(instance, "nodedropping")
    }

    /// Store event: node deleted.
    pub fn node_deleted(&self, instance: &InstanceData) -> BrokerResult<()> {
        self.log_node_event(instance, "nodedropped")
    }

    fn log_node_event(&self, instance: &InstanceData, event_name: &str) -> BrokerResult<()> {
        let mut fields = Map::new();
        fields.insert("endpoint".to_string(), json!(instance.resource.endpoint));
        fields.insert("node_id".to_string(), json!(instance.node_id));
        fields.insert(
            "node_name".to_string(),
            json!(instance.node_description.name),
        );
        self.log_event(&instance.infra_id, event_name, None, None, fields)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::PushSender;
    use infogrid_kvstore::MemoryStore;
    use infogrid_uds::{DocumentUds, NodeDescription, ResourceInfo, StaticDescription};
    use std::sync::Mutex;

    /// Sink capturing every record for inspection.
    #[derive(Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl EventSink for RecordingSink {
        fn record(&self, event: &Event) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn test_uds() -> Arc<dyn Uds> {
        Arc::new(DocumentUds::new(Arc::new(MemoryStore::new())))
    }

    fn recording_log(uds: Arc<dyn Uds>) -> (EventLog, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            events: Arc::clone(&events),
        };
        (EventLog::new(uds).with_sink(Box::new(sink)), events)
    }

    fn test_instance(infra_id: &str, node_name: &str, node_id: &str) -> InstanceData {
        InstanceData {
            node_id: node_id.to_string(),
            infra_id: infra_id.to_string(),
            backend_id: "cloud-a".to_string(),
            resource: ResourceInfo {
                endpoint: format!("10.0.0.1:{node_id}"),
                extra: Map::new(),
            },
            node_description: NodeDescription {
                name: node_name.to_string(),
                node_type: None,
                extra: Map::new(),
            },
            resolved_node_definition: None,
            state: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn logged_event_carries_infra_id_and_timestamp() {
        let (log, events) = recording_log(test_uds());

        let mut fields = Map::new();
        fields.insert("node_id".to_string(), json!("n1"));
        log.log_event("infra1", "nodecreated", None, None, fields)
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].infra_id, "infra1");
        assert_eq!(events[0].event_name, "nodecreated");
        assert!(events[0].timestamp > 0);
        assert_eq!(events[0].payload["infra_id"], json!("infra1"));
        assert_eq!(events[0].payload["node_id"], json!("n1"));
    }

    #[test]
    fn explicit_timestamp_is_preserved() {
        let (log, events) = recording_log(test_uds());
        log.log_event("i", "e", Some(12345), None, Map::new())
            .unwrap();
        assert_eq!(events.lock().unwrap()[0].timestamp, 12345);
    }

    #[test]
    fn event_data_and_fields_together_is_an_error() {
        let (log, _) = recording_log(test_uds());

        let mut data = Map::new();
        data.insert("a".to_string(), json!(1));
        let mut fields = Map::new();
        fields.insert("b".to_string(), json!(2));

        let err = log
            .log_event("i", "e", None, Some(data), fields)
            .unwrap_err();
        assert!(matches!(err, BrokerError::Argument(_)));
    }

    #[test]
    fn lifecycle_wrappers_use_canonical_names() {
        let (log, events) = recording_log(test_uds());

        log.infrastructure_created("i").unwrap();
        log.infrastructure_updated("i").unwrap();
        log.infrastructure_ready("i").unwrap();
        log.infrastructure_deleted("i").unwrap();

        let names: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_name.clone())
            .collect();
        assert_eq!(names, vec!["infrastart", "infraupdated", "infraready", "infradrop"]);
    }

    #[test]
    fn node_events_pull_fields_from_instance_data() {
        let (log, events) = recording_log(test_uds());
        let instance = test_instance("i", "web", "n1");

        log.node_created(&instance).unwrap();
        log.node_failed(&instance).unwrap();
        log.node_deleting(&instance).unwrap();
        log.node_deleted(&instance).unwrap();

        let events = events.lock().unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["nodecreated", "nodefailed", "nodedropping", "nodedropped"]
        );
        for event in events.iter() {
            assert_eq!(event.payload["node_id"], json!("n1"));
            assert_eq!(event.payload["node_name"], json!("web"));
            assert_eq!(event.payload["endpoint"], json!("10.0.0.1:n1"));
        }
    }

    #[test]
    fn node_creating_reports_the_scaling_target() {
        let uds = test_uds();
        let (log, events) = recording_log(Arc::clone(&uds));
        let instance = test_instance("i", "web", "n1");

        // No target recorded yet: defaults to 1.
        log.node_creating(&instance).unwrap();

        uds.set_scaling_target_count("i", "web", 4).unwrap();
        log.node_creating(&instance).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0].payload["scaling_target_count"], json!(1));
        assert_eq!(events[1].payload["scaling_target_count"], json!(4));
    }

    #[test]
    fn notification_is_attempted_but_never_fatal() {
        #[derive(Default)]
        struct CountingSender {
            delivered: Arc<Mutex<u32>>,
            fail: bool,
        }
        impl PushSender for CountingSender {
            fn send(
                &self,
                _event_name: &str,
                _timestamp: u64,
                _payload: &Map<String, Value>,
            ) -> anyhow::Result<()> {
                if self.fail {
                    anyhow::bail!("unreachable push gateway");
                }
                *self.delivered.lock().unwrap() += 1;
                Ok(())
            }
        }

        let uds = test_uds();
        uds.add_infrastructure(&StaticDescription {
            infra_id: "i".to_string(),
            name: "demo".to_string(),
            user_id: None,
            suspended: false,
            userinfo_strategy: None,
            notification: Some(json!({"type": "push"})),
            extra: Map::new(),
        })
        .unwrap();

        let delivered = Arc::new(Mutex::new(0));
        let sender = CountingSender {
            delivered: Arc::clone(&delivered),
            fail: false,
        };
        let (log, events) = recording_log(Arc::clone(&uds));
        let log = log.with_notifiers(NotifierRegistry::new().register("push", Arc::new(sender)));

        log.infrastructure_ready("i").unwrap();
        assert_eq!(*delivered.lock().unwrap(), 1);
        assert_eq!(events.lock().unwrap().len(), 1);

        // A failing sender still leaves the log call successful.
        let failing = CountingSender {
            delivered: Arc::new(Mutex::new(0)),
            fail: true,
        };
        let (log, events) = recording_log(uds);
        let log = log.with_notifiers(NotifierRegistry::new().register("push", Arc::new(failing)));
        log.infrastructure_ready("i").unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
