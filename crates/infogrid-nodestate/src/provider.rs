//! Dynamic-state and userinfo providers.

use std::sync::{Arc, LazyLock};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use infogrid_broker::{BrokerError, BrokerResult, HandlerTable, InfoProvider, QueryArgs};
use infogrid_uds::{InstanceData, Uds};

use crate::collaborators::{HealthCheck, ResourceBackend, ServiceComposer};
use crate::status::{NodeStatus, combine};

fn seam<T>(result: anyhow::Result<T>) -> BrokerResult<T> {
    result.map_err(|e| BrokerError::Internal(e.to_string()))
}

/// Queries over the dynamic (actual) state of infrastructures, aggregated
/// from the provisioning backend, the service composer, and the health
/// check. All dependencies are injected at construction.
pub struct DynamicStateProvider {
    uds: Arc<dyn Uds>,
    resource: Arc<dyn ResourceBackend>,
    composer: Arc<dyn ServiceComposer>,
    health: Arc<dyn HealthCheck>,
}

impl DynamicStateProvider {
    pub fn new(
        uds: Arc<dyn Uds>,
        resource: Arc<dyn ResourceBackend>,
        composer: Arc<dyn ServiceComposer>,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            uds,
            resource,
            composer,
            health,
        }
    }

    /// The compound status of one instance.
    ///
    /// Service status is consulted only once the resource is `Ready`, and
    /// health only once both are. An unhealthy health signal is tolerated
    /// for the node's configured failing period (600 s unless its resolved
    /// definition says otherwise): within the window it counts as
    /// `Pending`, beyond it as `Fail`. The window resets the instant
    /// health is `Ready` again.
    pub fn node_state(&self, instance: &InstanceData) -> BrokerResult<NodeStatus> {
        debug!(node_id = %instance.node_id, "querying node state");

        let resource_state = seam(self.resource.node_state(instance))?;
        let service_state = if resource_state == NodeStatus::Ready {
            seam(self.composer.service_state(instance))?
        } else {
            NodeStatus::Unknown
        };
        let health_state = if service_state == NodeStatus::Ready {
            let health = seam(self.health.state(instance))?;
            if health == NodeStatus::Ready {
                self.uds
                    .get_failing_period(&instance.infra_id, &instance.node_id, false)?;
                NodeStatus::Ready
            } else {
                let period =
                    self.uds
                        .get_failing_period(&instance.infra_id, &instance.node_id, true)?;
                let timeout = instance.health_check_timeout();
                warn!(
                    node_id = %instance.node_id,
                    period,
                    timeout,
                    "service health check failing"
                );
                if period > timeout as f64 {
                    NodeStatus::Fail
                } else {
                    NodeStatus::Pending
                }
            }
        } else {
            NodeStatus::Unknown
        };

        let compound = combine(resource_state, service_state, health_state);
        debug!(
            node_id = %instance.node_id,
            ?resource_state,
            ?service_state,
            ?health_state,
            %compound,
            "node states combined"
        );
        Ok(compound)
    }

    /// The dynamic node map with every instance annotated with its
    /// computed status and resource address.
    pub fn infrastructure_state(
        &self,
        infra_id: &str,
        allow_default: bool,
    ) -> BrokerResult<Value> {
        debug!(%infra_id, "gathering states of nodes");
        let state = self.uds.get_infrastructure_state(infra_id, allow_default)?;

        let mut result = Map::new();
        for (node_name, instances) in state {
            let mut annotated_instances = Map::new();
            for (node_id, instance) in instances {
                let status = self.node_state(&instance)?;
                let address = seam(self.resource.node_address(&instance))?;
                let mut entry = serde_json::to_value(&instance)
                    .map_err(|e| BrokerError::Internal(e.to_string()))?;
                entry["state"] = Value::from(status.to_string());
                entry["resource_address"] = address;
                annotated_instances.insert(node_id, entry);
            }
            result.insert(node_name, Value::Object(annotated_instances));
        }
        Ok(Value::Object(result))
    }

    fn table() -> &'static HandlerTable<Self> {
        static TABLE: LazyLock<HandlerTable<DynamicStateProvider>> = LazyLock::new(|| {
            HandlerTable::new()
                .with("node.state", |p: &DynamicStateProvider, a| {
                    let instance: InstanceData = a.arg(0)?;
                    Ok(Value::from(p.node_state(&instance)?.to_string()))
                })
                .with("infrastructure.state", |p, a| {
                    let infra_id: String = a.arg(0)?;
                    let allow_default = match a.opt_arg::<bool>(1)? {
                        Some(flag) => flag,
                        None => a.kwarg_or("allow_default", false)?,
                    };
                    p.infrastructure_state(&infra_id, allow_default)
                })
                .with("infrastructure.started", |p, a| {
                    let infra_id: String = a.arg(0)?;
                    debug!(%infra_id, "checking infrastructure started");
                    Ok(Value::from(seam(
                        p.composer.infrastructure_exists(&infra_id),
                    )?))
                })
                .with("node.attribute", |p, a| {
                    let node_id: String = a.arg(0)?;
                    let attribute: Value = a.arg(1)?;
                    debug!(%node_id, %attribute, "querying node attribute");
                    seam(p.composer.node_attribute(&node_id, &attribute))
                })
        });
        &TABLE
    }
}

impl InfoProvider for DynamicStateProvider {
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

/// Gathers user-facing information about an infrastructure. The strategy
/// is selected by the infrastructure's static description; `basic` maps
/// every instance to its resource address.
pub struct UserInfoProvider {
    uds: Arc<dyn Uds>,
    dynamic: Arc<DynamicStateProvider>,
}

impl UserInfoProvider {
    pub fn new(uds: Arc<dyn Uds>, dynamic: Arc<DynamicStateProvider>) -> Self {
        Self { uds, dynamic }
    }

    fn userinfo(&self, infra_id: &str) -> BrokerResult<Value> {
        debug!(%infra_id, "querying userinfo");
        let description = self.uds.get_static_description(infra_id)?;
        let strategy = description.userinfo_strategy.as_deref().unwrap_or("basic");
        match strategy {
            "basic" => self.basic_userinfo(infra_id),
            other => Err(BrokerError::Configuration(format!(
                "unknown userinfo strategy {other:?}"
            ))),
        }
    }

    fn basic_userinfo(&self, infra_id: &str) -> BrokerResult<Value> {
        let state = self.dynamic.infrastructure_state(infra_id, false)?;
        let Value::Object(nodes) = state else {
            return Err(BrokerError::Internal(
                "infrastructure state is not a mapping".to_string(),
            ));
        };

        let mut userinfo = Map::new();
        for (node_name, instances) in nodes {
            let Value::Object(instances) = instances else {
                continue;
            };
            let mut addresses = Map::new();
            for (node_id, instance) in instances {
                addresses.insert(node_id, single_address(&instance));
            }
            userinfo.insert(node_name, Value::Object(addresses));
        }
        Ok(Value::Object(userinfo))
    }

    fn table() -> &'static HandlerTable<Self> {
        static TABLE: LazyLock<HandlerTable<UserInfoProvider>> = LazyLock::new(|| {
            HandlerTable::new().with("infrastructure.userinfo", |p, a| {
                let infra_id: String = a.arg(0)?;
                p.userinfo(&infra_id)
            })
        });
        &TABLE
    }
}

/// A resource address may be a single value or a list; userinfo reports
/// one address per instance.
fn single_address(instance: &Value) -> Value {
    match instance.get("resource_address") {
        Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
        Some(address) => address.clone(),
        None => Value::Null,
    }
}

impl InfoProvider for UserInfoProvider {
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
