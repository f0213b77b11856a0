//! Error types for the key-value store layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during key-value store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl StoreError {
    /// Whether this error indicates a dead connection that must not be
    /// returned to the pool.
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Connect(_) | StoreError::Protocol(_))
    }
}

impl From<StoreError> for infogrid_broker::BrokerError {
    fn from(err: StoreError) -> Self {
        use infogrid_broker::BrokerError;
        match err {
            StoreError::KeyNotFound(key) => BrokerError::KeyNotFound(key),
            StoreError::Configuration(msg) => BrokerError::Configuration(msg),
            other => BrokerError::Store(other.to_string()),
        }
    }
}
