//! Interfaces of the external collaborators the status aggregation
//! consumes. The implementations live outside this workspace; only the
//! seams are specified here.

use serde_json::Value;

use infogrid_uds::InstanceData;

use crate::status::NodeStatus;

/// The resource/compute backend that provisions instances.
pub trait ResourceBackend: Send + Sync {
    /// Provisioning-level status of an instance.
    fn node_state(&self, instance: &InstanceData) -> anyhow::Result<NodeStatus>;

    /// Resource-level address(es) of an instance. May be a single address
    /// or a list.
    fn node_address(&self, instance: &InstanceData) -> anyhow::Result<Value>;
}

/// The service composer owning post-provisioning configuration state.
pub trait ServiceComposer: Send + Sync {
    /// Service-configuration status of an instance. Only meaningful once
    /// the resource status is `Ready`.
    fn service_state(&self, instance: &InstanceData) -> anyhow::Result<NodeStatus>;

    /// A node attribute, addressed by a dotted string or a list of path
    /// segments.
    fn node_attribute(&self, node_id: &str, attribute: &Value) -> anyhow::Result<Value>;

    /// Whether the infrastructure has been started on the composer side.
    fn infrastructure_exists(&self, infra_id: &str) -> anyhow::Result<bool>;
}

/// The health-check probe, distinct from provisioning state.
pub trait HealthCheck: Send + Sync {
    /// Liveness/readiness of the service on an instance. Only meaningful
    /// once both resource and service status are `Ready`.
    fn state(&self, instance: &InstanceData) -> anyhow::Result<NodeStatus>;
}
