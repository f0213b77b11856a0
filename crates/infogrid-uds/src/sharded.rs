//! Per-node state layout.
//!
//! Each node name gets its own key (`infra:<id>:state:<node_name>`) holding
//! one field per instance. Registration and removal touch a single field,
//! narrowing the concurrent-writer race the whole-document layout has.
//! This is the layout the networked backend deploys with.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use infogrid_broker::{BrokerError, BrokerResult};
use infogrid_kvstore::{KeyPattern, KeyValueStore};

use crate::keys;
use crate::types::{InfraState, InstanceData};
use crate::uds::{Uds, from_value, stripped, to_value};

/// UDS over the per-node state layout.
pub struct ShardedUds {
    store: Arc<dyn KeyValueStore>,
}

impl ShardedUds {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl Uds for ShardedUds {
    fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn load_infra_state(&self, infra_id: &str) -> BrokerResult<Option<InfraState>> {
        let pattern = keys::node_state(infra_id, "*");
        let node_keys = self.store().enumerate(KeyPattern::Glob(&pattern))?;
        if node_keys.is_empty() {
            return Ok(None);
        }

        let prefix = keys::node_state(infra_id, "");
        let mut state = InfraState::new();
        for key in node_keys {
            let Some(node_name) = key.strip_prefix(&prefix) else {
                continue;
            };
            let mut instances = BTreeMap::new();
            for (node_id, value) in self.store().field_entries(&key)? {
                instances.insert(node_id, from_value(value, "instance data")?);
            }
            state.insert(node_name.to_string(), instances);
        }
        Ok(Some(state))
    }

    fn register_started_node(
        &self,
        infra_id: &str,
        node_name: &str,
        instance: &InstanceData,
    ) -> BrokerResult<()> {
        debug!(%infra_id, %node_name, node_id = %instance.node_id, "registering started instance");
        self.store().field_set(
            &keys::node_state(infra_id, node_name),
            &instance.node_id,
            to_value(&stripped(instance))?,
        )?;
        Ok(())
    }

    fn remove_nodes(&self, infra_id: &str, node_ids: &[&str]) -> BrokerResult<()> {
        info!(%infra_id, ?node_ids, "removing node instances");
        if node_ids.is_empty() {
            return Ok(());
        }

        // Locate every id up front so a missing one fails before anything
        // is deleted.
        let state = self.get_infrastructure_state(infra_id, false)?;
        let lookup: HashMap<String, String> = state
            .iter()
            .flat_map(|(node_name, instances)| {
                instances
                    .keys()
                    .map(move |node_id| (node_id.clone(), node_name.clone()))
            })
            .collect();
        let mut located = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            match lookup.get(*node_id) {
                Some(node_name) => located.push((*node_id, node_name.clone())),
                None => {
                    return Err(BrokerError::KeyNotFound(format!(
                        "instance does not exist: {node_id}"
                    )));
                }
            }
        }

        for (node_id, node_name) in located {
            let key = keys::node_state(infra_id, &node_name);
            self.store().field_delete(&key, node_id)?;
            if self.store().field_names(&key)?.is_empty() {
                self.store().delete_key(&key)?;
            }
        }
        Ok(())
    }

    fn state_infra_ids(&self) -> BrokerResult<Vec<String>> {
        let keys = self.store().enumerate(KeyPattern::Glob("infra:*:state:*"))?;
        let ids: BTreeSet<String> = keys
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix("infra:")
                    .and_then(|rest| rest.split_once(":state:"))
                    .map(|(infra_id, _)| infra_id.to_string())
            })
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_instance;
    use infogrid_kvstore::MemoryStore;

    fn uds() -> ShardedUds {
        ShardedUds::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn state_assembles_from_per_node_keys() {
        let uds = uds();
        uds.register_started_node("X", "A", &test_instance("X", "A", "1"))
            .unwrap();
        uds.register_started_node("X", "A", &test_instance("X", "A", "2"))
            .unwrap();
        uds.register_started_node("X", "B", &test_instance("X", "B", "3"))
            .unwrap();

        // Instances land under the documented per-node keys.
        assert!(uds.store().has_key("infra:X:state:A").unwrap());
        assert!(uds.store().has_key("infra:X:state:B").unwrap());

        let state = uds.get_infrastructure_state("X", false).unwrap();
        assert_eq!(state["A"].len(), 2);
        assert_eq!(state["B"]["3"].node_id, "3");
    }

    #[test]
    fn register_same_id_overwrites() {
        let uds = uds();
        let mut instance = test_instance("X", "A", "1");
        uds.register_started_node("X", "A", &instance).unwrap();

        instance.backend_id = "other".to_string();
        uds.register_started_node("X", "A", &instance).unwrap();

        let state = uds.get_infrastructure_state("X", false).unwrap();
        assert_eq!(state["A"].len(), 1);
        assert_eq!(state["A"]["1"].backend_id, "other");
    }

    #[test]
    fn unknown_infrastructure_errors_unless_default_allowed() {
        let uds = uds();
        assert!(uds.get_infrastructure_state("nope", false).is_err());
        assert!(uds.get_infrastructure_state("nope", true).unwrap().is_empty());
    }

    #[test]
    fn remove_nodes_prunes_empty_bucket() {
        let uds = uds();
        uds.register_started_node("X", "A", &test_instance("X", "A", "1"))
            .unwrap();
        uds.register_started_node("X", "B", &test_instance("X", "B", "2"))
            .unwrap();

        uds.remove_nodes("X", &["2"]).unwrap();

        let state = uds.get_infrastructure_state("X", false).unwrap();
        assert!(!state.contains_key("B"));
        assert!(!uds.store().has_key("infra:X:state:B").unwrap());
    }

    #[test]
    fn remove_missing_node_fails_before_deleting_anything() {
        let uds = uds();
        uds.register_started_node("X", "A", &test_instance("X", "A", "1"))
            .unwrap();

        assert!(uds.remove_nodes("X", &["1", "ghost"]).is_err());

        let state = uds.get_infrastructure_state("X", false).unwrap();
        assert!(state["A"].contains_key("1"));
    }

    #[test]
    fn state_infra_ids_deduplicates() {
        let uds = uds();
        uds.register_started_node("X", "A", &test_instance("X", "A", "1"))
            .unwrap();
        uds.register_started_node("X", "B", &test_instance("X", "B", "2"))
            .unwrap();
        uds.register_started_node("Y", "A", &test_instance("Y", "A", "3"))
            .unwrap();

        assert_eq!(uds.state_infra_ids().unwrap(), vec!["X", "Y"]);
    }
}
