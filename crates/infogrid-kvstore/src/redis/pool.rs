//! Process-wide bounded connection pools.
//!
//! Pools are keyed by `(host, port, db)` — connections with the same key
//! share a pool, and pools live for the whole process, reused across store
//! instances addressing the same physical database.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, LazyLock, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::redis::conn::{ConnectOptions, RedisConnection};

/// Key identifying a connection pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub db: u32,
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Configuration for one connection pool.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum connections per pool key.
    pub max_size: usize,
    /// Maximum time to wait for a connection when the pool is exhausted.
    pub checkout_timeout: Duration,
    /// Options for establishing new connections.
    pub connect: ConnectOptions,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            checkout_timeout: Duration::from_secs(5),
            connect: ConnectOptions::default(),
        }
    }
}

struct PoolState {
    /// Idle connections available for checkout.
    idle: Vec<RedisConnection>,
    /// Total connections (idle + checked out).
    total: usize,
}

/// A bounded pool of connections to one `(host, port, db)`.
pub struct ConnectionPool {
    key: PoolKey,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    fn new(key: PoolKey, config: PoolConfig) -> Self {
        Self {
            key,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Check out a connection: reuse an idle one, create one if under the
    /// limit, or wait until one is released (bounded by `checkout_timeout`).
    pub fn checkout(self: &Arc<Self>) -> StoreResult<PooledConnection> {
        let deadline = Instant::now() + self.config.checkout_timeout;
        let mut state = self.state.lock().unwrap();

        loop {
            if let Some(conn) = state.idle.pop() {
                debug!(pool = %self.key, "reused idle connection");
                return Ok(PooledConnection::new(Arc::clone(self), conn));
            }

            if state.total < self.config.max_size {
                state.total += 1;
                drop(state);
                match RedisConnection::connect(
                    &self.key.host,
                    self.key.port,
                    self.key.db,
                    &self.config.connect,
                ) {
                    Ok(conn) => {
                        debug!(pool = %self.key, "created new connection");
                        return Ok(PooledConnection::new(Arc::clone(self), conn));
                    }
                    Err(e) => {
                        let mut state = self.state.lock().unwrap();
                        state.total -= 1;
                        self.available.notify_one();
                        return Err(e);
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::PoolExhausted(format!(
                    "{} ({} connections, waited {:?})",
                    self.key, self.config.max_size, self.config.checkout_timeout
                )));
            }
            let (guard, _timeout) = self.available.wait_timeout(state, remaining).unwrap();
            state = guard;
        }
    }

    /// Return a connection to the pool, or account for a broken one.
    fn release(&self, conn: Option<RedisConnection>) {
        let mut state = self.state.lock().unwrap();
        match conn {
            Some(conn) => state.idle.push(conn),
            None => {
                state.total = state.total.saturating_sub(1);
                debug!(pool = %self.key, "discarded broken connection");
            }
        }
        self.available.notify_one();
    }

    /// Idle and total connection counts, for tests and diagnostics.
    pub fn stats(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.idle.len(), state.total)
    }
}

/// A checked-out connection that returns itself to its pool on drop.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    conn: Option<RedisConnection>,
    broken: bool,
}

impl PooledConnection {
    fn new(pool: Arc<ConnectionPool>, conn: RedisConnection) -> Self {
        Self {
            pool,
            conn: Some(conn),
            broken: false,
        }
    }

    /// Mark the connection as unusable; it will be discarded instead of
    /// returned to the pool.
    pub fn invalidate(&mut self) {
        self.broken = true;
    }
}

impl Deref for PooledConnection {
    type Target = RedisConnection;
    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = if self.broken { None } else { self.conn.take() };
        self.pool.release(conn);
    }
}

/// The process-wide pool registry.
static POOLS: LazyLock<Mutex<HashMap<PoolKey, Arc<ConnectionPool>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The shared pool for `key`, created on first use. The configuration of
/// the first caller wins; later callers reuse the existing pool as-is.
pub fn shared_pool(key: PoolKey, config: &PoolConfig) -> Arc<ConnectionPool> {
    let mut pools = POOLS.lock().unwrap();
    Arc::clone(
        pools
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ConnectionPool::new(key, config.clone()))),
    )
}
