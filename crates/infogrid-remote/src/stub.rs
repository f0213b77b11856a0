//! The stub side of the bridge: issue queries against a remote provider.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use infogrid_broker::{BrokerError, BrokerResult, QueryArgs};

use crate::transport::QueryTransport;
use crate::wire::{QueryRequest, STATUS_BAD_REQUEST, STATUS_NOT_FOUND, STATUS_OK};

/// Remote counterpart of a provider's `get`.
///
/// `can_get` is deliberately not exposed remotely: when the remote
/// provider can serve the key, a membership probe would just double the
/// message count — callers issue `get` directly and handle the
/// key-not-found outcome.
pub struct RemoteProviderStub {
    transport: Arc<dyn QueryTransport>,
}

impl RemoteProviderStub {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    /// Issue a query and suspend until the correlated response arrives.
    /// No timeout is enforced here; impose a deadline at the call site.
    pub async fn get(&self, key: &str, args: QueryArgs) -> BrokerResult<Value> {
        debug!(%key, "remote query");
        let response = self
            .transport
            .round_trip(QueryRequest::new(key, args))
            .await
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

        match response.status_code {
            STATUS_OK => Ok(response.payload.unwrap_or(Value::Null)),
            STATUS_NOT_FOUND => Err(BrokerError::KeyNotFound(
                response.error.unwrap_or_else(|| key.to_string()),
            )),
            STATUS_BAD_REQUEST => {
                Err(BrokerError::Argument(response.error.unwrap_or_default()))
            }
            other => Err(BrokerError::Internal(format!(
                "unexpected response status {other} for key {key:?}"
            ))),
        }
    }
}
