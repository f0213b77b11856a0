//! Backend selection.
//!
//! Backends are chosen by a discriminant tag from a closed set, validated
//! when the configuration is decoded — an unknown tag fails fast at startup
//! instead of at first use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::redis::{RedisConfig, RedisStore};
use crate::store::KeyValueStore;

/// Key-value store backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// The in-memory backend.
    Memory {
        #[serde(default)]
        catch_all: bool,
    },
    /// The Redis-protocol backend.
    Redis(RedisConfig),
}

/// Construct the backend described by `config`.
pub fn build_store(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match config {
        StoreConfig::Memory { catch_all } => {
            Ok(Arc::new(MemoryStore::new().with_catch_all(*catch_all)))
        }
        StoreConfig::Redis(redis) => Ok(Arc::new(RedisStore::new(redis.clone())?)),
    }
}
