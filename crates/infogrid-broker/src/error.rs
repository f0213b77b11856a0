//! Error taxonomy shared across the InfoGrid query surface.

use thiserror::Error;

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can surface from a capability query.
///
/// Handler-level errors propagate unchanged through the router chain to the
/// original caller; only the RPC skeleton translates them into status codes,
/// and only for `KeyNotFound` (404) and `Argument` (400).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The key is not supported by any reachable provider.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Malformed call arguments for an otherwise valid key.
    #[error("bad argument: {0}")]
    Argument(String),

    /// Invalid component wiring, detected at startup. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Node-definition selection ran against an empty candidate set.
    #[error("no matching node definition for node type {node_type:?} (backend filter: {backend_filter:?})")]
    NoMatchingNodeDefinition {
        node_type: String,
        backend_filter: Vec<String>,
    },

    /// A storage backend failed underneath a handler.
    #[error("store error: {0}")]
    Store(String),

    /// Anything else a handler can produce.
    #[error("internal error: {0}")]
    Internal(String),
}
