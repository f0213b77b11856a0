//! Domain types persisted by the UDS.
//!
//! Everything round-trips through JSON; open-ended fields use flattened
//! maps so records written by other orchestrator components survive
//! read-modify-write cycles intact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dynamic state of one infrastructure: node name → node id → instance.
/// Invariant: every instance appears under exactly one node name.
pub type InfraState = BTreeMap<String, BTreeMap<String, InstanceData>>;

/// Static description of an infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticDescription {
    pub infra_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Set while the infrastructure is administratively suspended.
    #[serde(default)]
    pub suspended: bool,
    /// Userinfo gathering strategy tag; `basic` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_strategy: Option<String>,
    /// Per-infrastructure push-notification configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The resource-level endpoint block of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub endpoint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The node declaration an instance was created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Health-check parameters of a resolved node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckDef {
    /// Seconds an unhealthy node is tolerated before it counts as failed.
    #[serde(default = "default_health_timeout")]
    pub timeout: u64,
}

pub(crate) fn default_health_timeout() -> u64 {
    600
}

/// One registered implementation of a node type on some backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub backend_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_health_check: Option<HealthCheckDef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One running instance of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceData {
    pub node_id: String,
    pub infra_id: String,
    pub backend_id: String,
    pub resource: ResourceInfo,
    pub node_description: NodeDescription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_node_definition: Option<NodeDefinition>,
    /// Computed compound status. Derived at query time, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceData {
    /// The health-check timeout from the resolved definition, falling back
    /// to the 600 s default.
    pub fn health_check_timeout(&self) -> u64 {
        self.resolved_node_definition
            .as_ref()
            .and_then(|def| def.service_health_check.as_ref())
            .map(|hc| hc.timeout)
            .unwrap_or_else(default_health_timeout)
    }
}

/// A pending scaling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingRequest {
    /// Opaque unique token identifying the request.
    pub id: String,
    /// For destroy requests, the instance the request is pinned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Search criteria for instance lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFilter {
    #[serde(default)]
    pub infra_id: Option<String>,
    /// Node name as declared in the infrastructure description.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_round_trips_with_unknown_fields() {
        let raw = json!({
            "node_id": "n1",
            "infra_id": "i1",
            "backend_id": "aws",
            "resource": {"endpoint": "10.0.0.1", "zone": "eu-1"},
            "node_description": {"name": "web", "type": "frontend", "weight": 2},
            "custom_annotation": true
        });
        let instance: InstanceData = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(instance.resource.extra["zone"], json!("eu-1"));
        assert_eq!(instance.extra["custom_annotation"], json!(true));
        assert_eq!(serde_json::to_value(&instance).unwrap(), raw);
    }

    #[test]
    fn derived_state_is_not_serialized_when_absent() {
        let instance = InstanceData {
            node_id: "n1".to_string(),
            infra_id: "i1".to_string(),
            backend_id: "aws".to_string(),
            resource: ResourceInfo {
                endpoint: "10.0.0.1".to_string(),
                extra: Map::new(),
            },
            node_description: NodeDescription {
                name: "web".to_string(),
                node_type: None,
                extra: Map::new(),
            },
            resolved_node_definition: None,
            state: None,
            extra: Map::new(),
        };
        let value = serde_json::to_value(&instance).unwrap();
        assert!(value.get("state").is_none());
    }

    #[test]
    fn health_check_timeout_defaults() {
        let mut instance: InstanceData = serde_json::from_value(json!({
            "node_id": "n1",
            "infra_id": "i1",
            "backend_id": "aws",
            "resource": {"endpoint": "e"},
            "node_description": {"name": "web"}
        }))
        .unwrap();
        assert_eq!(instance.health_check_timeout(), 600);

        instance.resolved_node_definition = Some(NodeDefinition {
            backend_id: "aws".to_string(),
            service_health_check: Some(HealthCheckDef { timeout: 30 }),
            extra: Map::new(),
        });
        assert_eq!(instance.health_check_timeout(), 30);
    }

    #[test]
    fn description_suspended_defaults_to_false() {
        let desc: StaticDescription = serde_json::from_value(json!({
            "infra_id": "i1",
            "name": "demo"
        }))
        .unwrap();
        assert!(!desc.suspended);
        assert!(desc.notification.is_none());
    }
}
