//! The UDS contract — stored-data querying and manipulation primitives.
//!
//! Most operations are layout-independent and live here as default methods
//! over the backing [`KeyValueStore`]. The dynamic node map is the
//! exception: how it is keyed differs between the whole-document layout
//! ([`DocumentUds`](crate::document::DocumentUds)) and the per-node layout
//! ([`ShardedUds`](crate::sharded::ShardedUds)), so loading, registration
//! and removal are required methods.
//!
//! Read-modify-write sequences here span multiple store operations and are
//! not atomic: concurrent writers to the same infrastructure can lose
//! updates. The per-node layout narrows the window to a single hash field
//! but does not eliminate it.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use infogrid_broker::{BrokerError, BrokerResult};
use infogrid_kvstore::{KeyPattern, KeyValueStore, StoreError};

use crate::keys;
use crate::select::DefinitionStrategy;
use crate::types::{InfraState, InstanceData, InstanceFilter, NodeDefinition, ScalingRequest,
                   StaticDescription};

pub(crate) fn to_value<T: Serialize>(value: &T) -> BrokerResult<Value> {
    serde_json::to_value(value).map_err(|e| BrokerError::Store(e.to_string()))
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value, what: &str) -> BrokerResult<T> {
    serde_json::from_value(value).map_err(|e| BrokerError::Store(format!("decoding {what}: {e}")))
}

/// Read a key, mapping backend-level absence to `None`.
pub(crate) fn query_optional(
    store: &dyn KeyValueStore,
    key: &str,
) -> BrokerResult<Option<Value>> {
    match store.query_item(key, None) {
        Ok(value) => Ok(value),
        Err(StoreError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The persisted form of an instance: the derived `state` field is never
/// stored.
pub(crate) fn stripped(instance: &InstanceData) -> InstanceData {
    let mut instance = instance.clone();
    instance.state = None;
    instance
}

pub(crate) fn unknown_infrastructure(infra_id: &str) -> BrokerError {
    BrokerError::KeyNotFound(format!("unknown infrastructure {infra_id}"))
}

fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Stored-data primitives used across the orchestrator.
pub trait Uds: Send + Sync {
    /// The backing key-value store.
    fn store(&self) -> &dyn KeyValueStore;

    // ── Static descriptions ────────────────────────────────────────

    /// Persist a static description keyed by its infra id. Idempotent
    /// overwrite.
    fn add_infrastructure(&self, description: &StaticDescription) -> BrokerResult<()> {
        debug!(infra_id = %description.infra_id, "adding infrastructure");
        self.store().set_item(
            &keys::infra_description(&description.infra_id),
            to_value(description)?,
        )?;
        Ok(())
    }

    /// Overwrite the static description of an existing infrastructure.
    fn update_infrastructure(&self, description: &StaticDescription) -> BrokerResult<()> {
        debug!(infra_id = %description.infra_id, "updating infrastructure");
        self.store().set_item(
            &keys::infra_description(&description.infra_id),
            to_value(description)?,
        )?;
        Ok(())
    }

    /// Delete every key under the infrastructure's prefix.
    fn remove_infrastructure(&self, infra_id: &str) -> BrokerResult<()> {
        debug!(%infra_id, "removing infrastructure");
        let pattern = format!("{}*", keys::infra(infra_id));
        for key in self.store().enumerate(KeyPattern::Glob(&pattern))? {
            self.store().delete_key(&key)?;
        }
        Ok(())
    }

    fn get_static_description(&self, infra_id: &str) -> BrokerResult<StaticDescription> {
        match query_optional(self.store(), &keys::infra_description(infra_id))? {
            Some(value) => from_value(value, "static description"),
            None => Err(unknown_infrastructure(infra_id)),
        }
    }

    fn infra_name(&self, infra_id: &str) -> BrokerResult<String> {
        Ok(self.get_static_description(infra_id)?.name)
    }

    /// Flag the infrastructure as suspended. Read-modify-write, not
    /// transactional.
    fn suspend_infrastructure(&self, infra_id: &str, reason: &str) -> BrokerResult<()> {
        debug!(%infra_id, %reason, "suspending infrastructure");
        let mut description = self.get_static_description(infra_id)?;
        description.suspended = true;
        self.update_infrastructure(&description)
    }

    /// Clear the suspended flag.
    fn resume_infrastructure(&self, infra_id: &str) -> BrokerResult<()> {
        debug!(%infra_id, "resuming infrastructure");
        let mut description = self.get_static_description(infra_id)?;
        description.suspended = false;
        self.update_infrastructure(&description)
    }

    /// The per-infrastructure push-notification configuration. Any failure
    /// degrades to `None`.
    fn get_infrastructure_notification(&self, infra_id: &str) -> Option<Value> {
        self.get_static_description(infra_id)
            .ok()
            .and_then(|description| description.notification)
    }

    // ── Dynamic state ──────────────────────────────────────────────

    /// Layout-specific load of the dynamic node map; `None` when the
    /// infrastructure has no recorded state.
    fn load_infra_state(&self, infra_id: &str) -> BrokerResult<Option<InfraState>>;

    /// The dynamic node map. Fails for an unknown infrastructure unless
    /// `allow_default` is set, in which case an empty map is returned.
    fn get_infrastructure_state(
        &self,
        infra_id: &str,
        allow_default: bool,
    ) -> BrokerResult<InfraState> {
        match self.load_infra_state(infra_id)? {
            Some(state) => Ok(state),
            None if allow_default => Ok(InfraState::new()),
            None => Err(unknown_infrastructure(infra_id)),
        }
    }

    /// Layout-specific upsert of a started instance under
    /// `[node_name][node_id]`.
    fn register_started_node(
        &self,
        infra_id: &str,
        node_name: &str,
        instance: &InstanceData,
    ) -> BrokerResult<()>;

    /// Layout-specific removal of instances by id, wherever they are found
    /// across node-name buckets. Fails naming the first missing id and
    /// leaves stored state unchanged in that case; a bucket emptied by the
    /// removal is pruned.
    fn remove_nodes(&self, infra_id: &str, node_ids: &[&str]) -> BrokerResult<()>;

    /// Infrastructure ids that have recorded dynamic state.
    fn state_infra_ids(&self) -> BrokerResult<Vec<String>>;

    /// Merge failure snapshots into the archive, overwriting by node id.
    fn store_failed_nodes(&self, infra_id: &str, instances: &[InstanceData]) -> BrokerResult<()> {
        if instances.is_empty() {
            return Ok(());
        }
        info!(%infra_id, count = instances.len(), "archiving failed node instances");
        let key = keys::failed_nodes(infra_id);
        let mut archive = match query_optional(self.store(), &key)? {
            Some(value) => from_value::<Map<String, Value>>(value, "failed-node archive")?,
            None => Map::new(),
        };
        for instance in instances {
            archive.insert(instance.node_id.clone(), to_value(instance)?);
        }
        self.store().set_item(&key, Value::Object(archive))?;
        Ok(())
    }

    /// The failed-node archive, empty when nothing was archived yet.
    fn get_failed_nodes(&self, infra_id: &str) -> BrokerResult<BTreeMap<String, InstanceData>> {
        match query_optional(self.store(), &keys::failed_nodes(infra_id))? {
            Some(value) => from_value(value, "failed-node archive"),
            None => Ok(BTreeMap::new()),
        }
    }

    // ── Scaling ────────────────────────────────────────────────────

    fn set_scaling_target_count(
        &self,
        infra_id: &str,
        node_name: &str,
        target_count: u64,
    ) -> BrokerResult<()> {
        debug!(%infra_id, %node_name, target_count, "storing scaling target count");
        self.store().field_set(
            &keys::infra_scaling(infra_id),
            &keys::scaling_target_count_field(node_name),
            json!(target_count),
        )?;
        Ok(())
    }

    fn get_scaling_target_count(
        &self,
        infra_id: &str,
        node_name: &str,
    ) -> BrokerResult<Option<u64>> {
        match self.store().field_get(
            &keys::infra_scaling(infra_id),
            &keys::scaling_target_count_field(node_name),
        )? {
            Some(value) => from_value(value, "scaling target count").map(Some),
            None => Ok(None),
        }
    }

    /// Append `count` uniquely-identified create requests. Requests are
    /// never deduplicated; every call adds new ids.
    fn set_scaling_createnode(
        &self,
        infra_id: &str,
        node_name: &str,
        count: usize,
    ) -> BrokerResult<Vec<String>> {
        debug!(%infra_id, %node_name, count, "storing create-node requests");
        let key = keys::infra_scaling(infra_id);
        let mut request_ids = Vec::with_capacity(count);
        for _ in 0..count {
            let request_id = Uuid::new_v4().to_string();
            self.store().field_set(
                &key,
                &keys::scaling_create_field(node_name, &request_id),
                json!(""),
            )?;
            request_ids.push(request_id);
        }
        Ok(request_ids)
    }

    /// Append one destroy request, optionally pinned to a specific
    /// instance.
    fn set_scaling_destroynode(
        &self,
        infra_id: &str,
        node_name: &str,
        node_id: Option<&str>,
    ) -> BrokerResult<String> {
        let request_id = Uuid::new_v4().to_string();
        debug!(%infra_id, %node_name, ?node_id, "storing destroy-node request");
        self.store().field_set(
            &keys::infra_scaling(infra_id),
            &keys::scaling_destroy_field(node_name, &request_id),
            json!(node_id.unwrap_or("")),
        )?;
        Ok(request_id)
    }

    fn get_scaling_createnode(
        &self,
        infra_id: &str,
        node_name: &str,
    ) -> BrokerResult<Vec<ScalingRequest>> {
        let prefix = keys::scaling_create_field(node_name, "");
        let names = self.store().field_names(&keys::infra_scaling(infra_id))?;
        Ok(names
            .into_iter()
            .filter_map(|name| {
                name.strip_prefix(&prefix).map(|id| ScalingRequest {
                    id: id.to_string(),
                    node_id: None,
                })
            })
            .collect())
    }

    fn get_scaling_destroynode(
        &self,
        infra_id: &str,
        node_name: &str,
    ) -> BrokerResult<Vec<ScalingRequest>> {
        let prefix = keys::scaling_destroy_field(node_name, "");
        let entries = self.store().field_entries(&keys::infra_scaling(infra_id))?;
        Ok(entries
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(&prefix).map(|id| ScalingRequest {
                    id: id.to_string(),
                    node_id: value
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                })
            })
            .collect())
    }

    /// Remove one create request by id. Returns whether it existed.
    fn del_scaling_createnode(
        &self,
        infra_id: &str,
        node_name: &str,
        request_id: &str,
    ) -> BrokerResult<bool> {
        debug!(%infra_id, %node_name, %request_id, "deleting create-node request");
        Ok(self.store().field_delete(
            &keys::infra_scaling(infra_id),
            &keys::scaling_create_field(node_name, request_id),
        )?)
    }

    /// Remove one destroy request by id. Returns whether it existed.
    fn del_scaling_destroynode(
        &self,
        infra_id: &str,
        node_name: &str,
        request_id: &str,
    ) -> BrokerResult<bool> {
        debug!(%infra_id, %node_name, %request_id, "deleting destroy-node request");
        Ok(self.store().field_delete(
            &keys::infra_scaling(infra_id),
            &keys::scaling_destroy_field(node_name, request_id),
        )?)
    }

    // ── Failing period ─────────────────────────────────────────────

    /// Elapsed seconds since a node's health first left `READY`.
    ///
    /// While failing, the first call records the current time and reports
    /// zero; later calls report the elapsed time since that record. The
    /// instant the node is healthy again the record is cleared and zero is
    /// reported.
    fn get_failing_period(
        &self,
        infra_id: &str,
        node_id: &str,
        is_failed: bool,
    ) -> BrokerResult<f64> {
        let key = keys::infra_failtime(infra_id);
        let stored = self
            .store()
            .field_get(&key, node_id)?
            .and_then(|value| value.as_f64());
        if is_failed {
            match stored {
                Some(first_failure) => {
                    let period = epoch_secs_f64() - first_failure;
                    debug!(%infra_id, %node_id, period, "failing period");
                    Ok(period)
                }
                None => {
                    self.store()
                        .field_set(&key, node_id, json!(epoch_secs_f64()))?;
                    Ok(0.0)
                }
            }
        } else {
            if stored.is_some() {
                self.store().field_delete(&key, node_id)?;
            }
            Ok(0.0)
        }
    }

    // ── Node definitions ───────────────────────────────────────────

    /// All registered implementations of a node type.
    fn all_node_definitions(&self, node_type: &str) -> BrokerResult<Vec<NodeDefinition>> {
        match query_optional(self.store(), &keys::node_def(node_type))? {
            Some(value) => from_value(value, "node definitions"),
            None => Ok(Vec::new()),
        }
    }

    /// Filter the registered implementations to a backend allowlist, then
    /// let the strategy choose exactly one.
    fn get_one_definition(
        &self,
        node_type: &str,
        preselected_backend_ids: &[String],
        strategy: DefinitionStrategy,
    ) -> BrokerResult<NodeDefinition> {
        debug!(
            %node_type,
            ?preselected_backend_ids,
            ?strategy,
            "selecting node definition"
        );
        let mut candidates = self.all_node_definitions(node_type)?;
        if !preselected_backend_ids.is_empty() {
            candidates.retain(|def| preselected_backend_ids.contains(&def.backend_id));
        }
        if candidates.is_empty() {
            return Err(BrokerError::NoMatchingNodeDefinition {
                node_type: node_type.to_string(),
                backend_filter: preselected_backend_ids.to_vec(),
            });
        }
        Ok(strategy.select(&candidates).clone())
    }

    // ── Instance search ────────────────────────────────────────────

    /// Instances matching all given criteria. Without `infra_id` this is a
    /// full database sweep.
    fn find_instances(&self, filter: &InstanceFilter) -> BrokerResult<Vec<InstanceData>> {
        debug!(?filter, "looking up instances");
        let infra_ids = match &filter.infra_id {
            Some(infra_id) => vec![infra_id.clone()],
            None => {
                warn!(
                    "instance lookup without infra_id sweeps every \
                     infrastructure; consider passing infra_id"
                );
                self.state_infra_ids()?
            }
        };

        let mut matches = Vec::new();
        for infra_id in infra_ids {
            let Some(state) = self.load_infra_state(&infra_id)? else {
                continue;
            };
            for (node_name, instances) in state {
                if let Some(name) = &filter.name
                    && name != &node_name
                {
                    continue;
                }
                for (node_id, instance) in instances {
                    if let Some(wanted) = &filter.node_id
                        && wanted != &node_id
                    {
                        continue;
                    }
                    matches.push(instance);
                }
            }
        }
        Ok(matches)
    }

    /// The single instance matching the criteria. Multiple matches are
    /// tolerated: matches are ordered by node id and the first is returned
    /// with a warning.
    fn find_one_instance(&self, filter: &InstanceFilter) -> BrokerResult<InstanceData> {
        let mut matches = self.find_instances(filter)?;
        if matches.is_empty() {
            return Err(BrokerError::KeyNotFound(format!(
                "no instance matching {filter:?}"
            )));
        }
        matches.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        if matches.len() > 1 {
            warn!(
                ?filter,
                count = matches.len(),
                "multiple instances match; using the first by node id"
            );
        }
        Ok(matches.remove(0))
    }
}
