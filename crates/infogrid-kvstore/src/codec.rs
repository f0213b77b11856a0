//! Pluggable value serialization for networked backends.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Converts values to and from the textual representation a networked
/// backend stores.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: &Value) -> StoreResult<String>;
    fn decode(&self, text: &str) -> StoreResult<Value>;
}

/// JSON codec, the default.
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> StoreResult<String> {
        serde_json::to_string(value).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    fn decode(&self, text: &str) -> StoreResult<Value> {
        serde_json::from_str(text).map_err(|e| StoreError::Deserialize(e.to_string()))
    }
}
