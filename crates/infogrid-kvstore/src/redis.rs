//! Networked [`KeyValueStore`] speaking the Redis protocol.
//!
//! Connections come from process-wide pools keyed by `(host, port, db)`.
//! Keys may carry a `name:` prefix selecting one of several configured
//! alternate logical databases; the prefix→database mapping must be a
//! bijection. Values pass through a pluggable [`ValueCodec`] (JSON default).

pub mod conn;
pub mod pool;
pub mod resp;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec::{JsonCodec, ValueCodec};
use crate::error::{StoreError, StoreResult};
use crate::store::{KeyPattern, KeyValueStore};
use self::conn::ConnectOptions;
use self::pool::{PoolConfig, PoolKey, shared_pool};
use self::resp::Reply;

/// Configuration for a [`RedisStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default logical database.
    #[serde(default)]
    pub db: u32,
    /// Alternate databases, selected by key prefix (`name:` → db).
    #[serde(default)]
    pub altdbs: HashMap<String, u32>,
    #[serde(default)]
    pub catch_all: bool,
    #[serde(default)]
    pub password: Option<String>,
    /// Maximum pooled connections per logical database.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_max_connections() -> usize {
    10
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: 0,
            altdbs: HashMap::new(),
            catch_all: false,
            password: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Redis-protocol implementation of [`KeyValueStore`].
pub struct RedisStore {
    host: String,
    port: u16,
    default_db: u32,
    altdbs: HashMap<String, u32>,
    inverse_altdbs: HashMap<u32, String>,
    catch_all: bool,
    pool_config: PoolConfig,
    codec: Arc<dyn ValueCodec>,
}

impl RedisStore {
    /// Build a store, validating the alternate-database mapping.
    pub fn new(config: RedisConfig) -> StoreResult<Self> {
        let inverse_altdbs: HashMap<u32, String> = config
            .altdbs
            .iter()
            .map(|(name, db)| (*db, name.clone()))
            .collect();
        if inverse_altdbs.len() != config.altdbs.len() {
            return Err(StoreError::Configuration(format!(
                "altdbs mapping is not a bijection: {:?}",
                config.altdbs
            )));
        }

        let pool_config = PoolConfig {
            max_size: config.max_connections,
            connect: ConnectOptions {
                password: config.password.clone(),
                ..ConnectOptions::default()
            },
            ..PoolConfig::default()
        };

        Ok(Self {
            host: config.host,
            port: config.port,
            default_db: config.db,
            altdbs: config.altdbs,
            inverse_altdbs,
            catch_all: config.catch_all,
            pool_config,
            codec: Arc::new(JsonCodec),
        })
    }

    /// Replace the value codec.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Resolve a key to its logical database: a `name:` prefix naming a
    /// configured alternate database routes there (prefix stripped),
    /// everything else goes to the default database unchanged.
    fn split_key<'k>(&self, key: &'k str) -> (u32, &'k str) {
        if let Some((prefix, rest)) = key.split_once(':')
            && let Some(db) = self.altdbs.get(prefix)
        {
            return (*db, rest);
        }
        (self.default_db, key)
    }

    /// Inverse of [`split_key`](Self::split_key): restore the prefix of a
    /// key enumerated from an alternate database.
    fn prefixed(&self, db: u32, key: &str) -> String {
        match self.inverse_altdbs.get(&db) {
            Some(prefix) if db != self.default_db => format!("{prefix}:{key}"),
            _ => key.to_string(),
        }
    }

    /// Run one command against a pooled connection for `db`. I/O failures
    /// invalidate the connection so it is not returned to the pool.
    fn command(&self, db: u32, parts: &[&str]) -> StoreResult<Reply> {
        let pool = shared_pool(
            PoolKey {
                host: self.host.clone(),
                port: self.port,
                db,
            },
            &self.pool_config,
        );
        let mut conn = pool.checkout()?;
        match conn.command(parts) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.is_io() {
                    conn.invalidate();
                }
                Err(e)
            }
        }
    }

    fn decode_bulk(&self, reply: Reply, context: &str) -> StoreResult<Option<Value>> {
        match reply {
            Reply::Bulk(Some(text)) => Ok(Some(self.codec.decode(&text)?)),
            Reply::Bulk(None) => Ok(None),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to {context}: {other:?}"
            ))),
        }
    }

    fn key_list(&self, db: u32, reply: Reply, context: &str) -> StoreResult<Vec<String>> {
        match reply {
            Reply::Array(items) => items
                .unwrap_or_default()
                .into_iter()
                .map(|item| match item {
                    Reply::Bulk(Some(key)) => Ok(self.prefixed(db, &key)),
                    other => Err(StoreError::Protocol(format!(
                        "unexpected element in {context} reply: {other:?}"
                    ))),
                })
                .collect(),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to {context}: {other:?}"
            ))),
        }
    }
}

impl KeyValueStore for RedisStore {
    fn backend_type(&self) -> &'static str {
        "redis"
    }

    fn catch_all(&self) -> bool {
        self.catch_all
    }

    fn query_item(&self, key: &str, default: Option<Value>) -> StoreResult<Option<Value>> {
        debug!(%key, "querying");
        let (db, k) = self.split_key(key);
        match self.decode_bulk(self.command(db, &["GET", k])?, "GET")? {
            Some(value) => Ok(Some(value)),
            None if default.is_some() => Ok(default),
            None if self.catch_all => Ok(None),
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: Value) -> StoreResult<()> {
        debug!(%key, "setting");
        let (db, k) = self.split_key(key);
        let encoded = self.codec.encode(&value)?;
        match self.command(db, &["SET", k, &encoded])? {
            Reply::Simple(s) if s == "OK" => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to SET: {other:?}"
            ))),
        }
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let (db, k) = self.split_key(key);
        match self.command(db, &["EXISTS", k])? {
            Reply::Integer(n) => Ok(n > 0),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to EXISTS: {other:?}"
            ))),
        }
    }

    fn enumerate(&self, pattern: KeyPattern<'_>) -> StoreResult<Vec<String>> {
        match pattern {
            // Globs are matched server-side on the database the pattern's
            // prefix selects.
            KeyPattern::Glob(glob) => {
                let (db, p) = self.split_key(glob);
                self.key_list(db, self.command(db, &["KEYS", p])?, "KEYS")
            }
            // Predicates need a full key scan, evaluated client-side over
            // the default database.
            KeyPattern::Predicate(predicate) => {
                let keys = self.key_list(
                    self.default_db,
                    self.command(self.default_db, &["KEYS", "*"])?,
                    "KEYS",
                )?;
                Ok(keys.into_iter().filter(|key| predicate(key)).collect())
            }
        }
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        debug!(%key, "deleting");
        let (db, k) = self.split_key(key);
        self.command(db, &["DEL", k])?;
        Ok(())
    }

    // Field operations use native hash commands: one field per instance
    // narrows concurrent read-modify-write races to a single field instead
    // of the whole document.

    fn field_get(&self, key: &str, field: &str) -> StoreResult<Option<Value>> {
        let (db, k) = self.split_key(key);
        self.decode_bulk(self.command(db, &["HGET", k, field])?, "HGET")
    }

    fn field_set(&self, key: &str, field: &str, value: Value) -> StoreResult<()> {
        let (db, k) = self.split_key(key);
        let encoded = self.codec.encode(&value)?;
        self.command(db, &["HSET", k, field, &encoded])?;
        Ok(())
    }

    fn field_delete(&self, key: &str, field: &str) -> StoreResult<bool> {
        let (db, k) = self.split_key(key);
        match self.command(db, &["HDEL", k, field])? {
            Reply::Integer(n) => Ok(n > 0),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to HDEL: {other:?}"
            ))),
        }
    }

    fn field_names(&self, key: &str) -> StoreResult<Vec<String>> {
        let (db, k) = self.split_key(key);
        match self.command(db, &["HKEYS", k])? {
            Reply::Array(items) => items
                .unwrap_or_default()
                .into_iter()
                .map(|item| match item {
                    Reply::Bulk(Some(name)) => Ok(name),
                    other => Err(StoreError::Protocol(format!(
                        "unexpected element in HKEYS reply: {other:?}"
                    ))),
                })
                .collect(),
            other => Err(StoreError::Protocol(format!(
                "unexpected reply to HKEYS: {other:?}"
            ))),
        }
    }

    fn field_entries(&self, key: &str) -> StoreResult<Vec<(String, Value)>> {
        let (db, k) = self.split_key(key);
        let items = match self.command(db, &["HGETALL", k])? {
            Reply::Array(items) => items.unwrap_or_default(),
            other => {
                return Err(StoreError::Protocol(format!(
                    "unexpected reply to HGETALL: {other:?}"
                )));
            }
        };
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            match (field, value) {
                (Reply::Bulk(Some(field)), Reply::Bulk(Some(text))) => {
                    entries.push((field, self.codec.decode(&text)?));
                }
                pair => {
                    return Err(StoreError::Protocol(format!(
                        "unexpected pair in HGETALL reply: {pair:?}"
                    )));
                }
            }
        }
        Ok(entries)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
