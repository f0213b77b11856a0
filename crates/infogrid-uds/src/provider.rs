//! The UDS-backed information provider.

use std::sync::{Arc, LazyLock};

use serde_json::Value;

use infogrid_broker::{BrokerError, BrokerResult, HandlerTable, InfoProvider, QueryArgs};

use crate::keys;
use crate::select::DefinitionStrategy;
use crate::types::InstanceFilter;
use crate::uds::{Uds, from_value, query_optional, to_value};

/// Serves the stored-data query keys over a [`Uds`].
pub struct UdsProvider {
    uds: Arc<dyn Uds>,
}

impl UdsProvider {
    pub fn new(uds: Arc<dyn Uds>) -> Self {
        Self { uds }
    }

    fn table() -> &'static HandlerTable<Self> {
        static TABLE: LazyLock<HandlerTable<UdsProvider>> = LazyLock::new(|| {
            HandlerTable::new()
                .with("node.definition.all", |p: &UdsProvider, a| {
                    let node_type: String = a.arg(0)?;
                    to_value(&p.uds.all_node_definitions(&node_type)?)
                })
                .with("node.definition", |p, a| {
                    let node_type: String = a.arg(0)?;
                    let preselected = preselected_backend_ids(a)?;
                    let strategy =
                        DefinitionStrategy::parse(&a.kwarg_or("strategy", "random".to_string())?)?;
                    to_value(&p.uds.get_one_definition(&node_type, &preselected, strategy)?)
                })
                .with("backends.auth_data", |p, a| {
                    let backend_id: String = a.arg(0)?;
                    let user_id: String = a.arg(1)?;
                    let key = keys::auth_data(&backend_id, &user_id);
                    Ok(query_optional(p.uds.store(), &key)?.unwrap_or(Value::Null))
                })
                .with("backends", |p, a| {
                    let backend_id: String = a.arg(0)?;
                    let key = keys::backend(&backend_id);
                    Ok(query_optional(p.uds.store(), &key)?.unwrap_or(Value::Null))
                })
                .with("infrastructure.static_description", |p, a| {
                    let infra_id: String = a.arg(0)?;
                    to_value(&p.uds.get_static_description(&infra_id)?)
                })
                .with("infrastructure.name", |p, a| {
                    let infra_id: String = a.arg(0)?;
                    Ok(Value::from(p.uds.infra_name(&infra_id)?))
                })
                .with("infrastructure.node_instances", |p, a| {
                    let infra_id: String = a.arg(0)?;
                    let allow_default = match a.opt_arg::<bool>(1)? {
                        Some(flag) => flag,
                        None => a.kwarg_or("allow_default", false)?,
                    };
                    to_value(&p.uds.get_infrastructure_state(&infra_id, allow_default)?)
                })
                .with("node.find", |p, a| {
                    to_value(&p.uds.find_instances(&instance_filter(a)?)?)
                })
                .with("node.find_one", |p, a| {
                    to_value(&p.uds.find_one_instance(&instance_filter(a)?)?)
                })
                .with("service_composer.aux_data", |p, a| {
                    let sc_id: String = a.arg(0)?;
                    let key = keys::service_composer(&sc_id);
                    Ok(query_optional(p.uds.store(), &key)?
                        .unwrap_or_else(|| Value::Object(Default::default())))
                })
        });
        &TABLE
    }
}

impl InfoProvider for UdsProvider {
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

fn instance_filter(args: &QueryArgs) -> BrokerResult<InstanceFilter> {
    from_value(
        Value::Object(args.kwargs.clone()),
        "instance search criteria",
    )
}

/// The backend allowlist accepts both a single id and a list of ids.
fn preselected_backend_ids(args: &QueryArgs) -> BrokerResult<Vec<String>> {
    match args.kwarg::<Value>("preselected_backend_ids")? {
        None => Ok(Vec::new()),
        Some(Value::String(id)) => Ok(vec![id]),
        Some(list @ Value::Array(_)) => from_value(list, "preselected_backend_ids"),
        Some(other) => Err(BrokerError::Argument(format!(
            "preselected_backend_ids must be a string or list, got {other}"
        ))),
    }
}
