//! Whole-document state layout.
//!
//! The entire dynamic node map of an infrastructure lives under one key
//! (`infra:<id>:state`). Simple and fine for the in-memory backend; every
//! registration or removal rewrites the whole document.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use infogrid_broker::{BrokerError, BrokerResult};
use infogrid_kvstore::{KeyPattern, KeyValueStore};

use crate::keys;
use crate::types::{InfraState, InstanceData};
use crate::uds::{Uds, from_value, query_optional, stripped, to_value};

/// UDS over the whole-document state layout.
pub struct DocumentUds {
    store: Arc<dyn KeyValueStore>,
}

impl DocumentUds {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl Uds for DocumentUds {
    fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn load_infra_state(&self, infra_id: &str) -> BrokerResult<Option<InfraState>> {
        match query_optional(self.store(), &keys::infra_state(infra_id))? {
            Some(value) => from_value(value, "infrastructure state").map(Some),
            None => Ok(None),
        }
    }

    fn register_started_node(
        &self,
        infra_id: &str,
        node_name: &str,
        instance: &InstanceData,
    ) -> BrokerResult<()> {
        debug!(%infra_id, %node_name, node_id = %instance.node_id, "registering started instance");
        let mut state = self.load_infra_state(infra_id)?.unwrap_or_default();
        state
            .entry(node_name.to_string())
            .or_default()
            .insert(instance.node_id.clone(), stripped(instance));
        self.store()
            .set_item(&keys::infra_state(infra_id), to_value(&state)?)?;
        Ok(())
    }

    fn remove_nodes(&self, infra_id: &str, node_ids: &[&str]) -> BrokerResult<()> {
        info!(%infra_id, ?node_ids, "removing node instances");
        if node_ids.is_empty() {
            return Ok(());
        }
        let mut state = self.get_infrastructure_state(infra_id, false)?;
        let lookup: HashMap<String, String> = state
            .iter()
            .flat_map(|(node_name, instances)| {
                instances
                    .keys()
                    .map(move |node_id| (node_id.clone(), node_name.clone()))
            })
            .collect();

        for node_id in node_ids {
            let Some(node_name) = lookup.get(*node_id) else {
                // Nothing was written yet: stored state is untouched.
                return Err(BrokerError::KeyNotFound(format!(
                    "instance does not exist: {node_id}"
                )));
            };
            if let Some(instances) = state.get_mut(node_name) {
                instances.remove(*node_id);
                if instances.is_empty() {
                    state.remove(node_name);
                }
            }
        }
        self.store()
            .set_item(&keys::infra_state(infra_id), to_value(&state)?)?;
        Ok(())
    }

    fn state_infra_ids(&self) -> BrokerResult<Vec<String>> {
        let keys = self.store().enumerate(KeyPattern::Glob("infra:*:state"))?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix("infra:")
                    .and_then(|rest| rest.strip_suffix(":state"))
                    .map(str::to_string)
            })
            .collect())
    }
}
