//! infogrid-uds — the persistent-state layer of InfoGrid.
//!
//! The UDS stores everything the orchestrator must remember across
//! restarts: infrastructure descriptions, the dynamic node map, scaling
//! counters and request queues, the failed-node archive, node definitions,
//! and per-backend auth data. It implements data querying and manipulation
//! primitives over a [`KeyValueStore`](infogrid_kvstore::KeyValueStore);
//! dynamic (run-time, on-demand) information is the broker's job.
//!
//! Two state layouts implement the [`Uds`] trait: [`DocumentUds`] keeps an
//! infrastructure's node map in one document, [`ShardedUds`] keeps one key
//! per node name with one field per instance.

pub mod document;
pub mod keys;
pub mod provider;
pub mod select;
pub mod sharded;
pub mod types;
pub mod uds;

pub use document::DocumentUds;
pub use provider::UdsProvider;
pub use select::DefinitionStrategy;
pub use sharded::ShardedUds;
pub use types::*;
pub use uds::Uds;

use std::sync::Arc;

use infogrid_broker::BrokerResult;
use infogrid_kvstore::{StoreConfig, build_store};

/// Build the UDS matching a store configuration: the whole-document layout
/// over the in-memory backend, the per-node layout over the networked one.
pub fn build_uds(config: &StoreConfig) -> BrokerResult<Arc<dyn Uds>> {
    let store = build_store(config)?;
    Ok(match config {
        StoreConfig::Memory { .. } => Arc::new(DocumentUds::new(store)),
        StoreConfig::Redis(_) => Arc::new(ShardedUds::new(store)),
    })
}
