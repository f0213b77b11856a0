//! Event records and sinks.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::info;

/// A structured lifecycle event. Immutable once logged; round-trips
/// through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub infra_id: String,
    pub event_name: String,
    /// Unix timestamp, seconds.
    pub timestamp: u64,
    /// Opaque event fields.
    pub payload: Map<String, serde_json::Value>,
}

/// Where assembled event records go.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event) -> anyhow::Result<()>;
}

/// Default sink: structured text on the logging channel.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &Event) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event.payload)?;
        info!(
            target: "infogrid::events",
            infra_id = %event.infra_id,
            event = %event.event_name,
            timestamp = event.timestamp,
            %payload,
            "event"
        );
        Ok(())
    }
}
