//! Query arguments — the positional/named argument bundle passed to handlers.
//!
//! `QueryArgs` doubles as the RPC wire shape: it serializes to
//! `{"args": […], "kwargs": {…}}` and back without loss.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BrokerError, BrokerResult};

/// Positional and named arguments for a capability query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryArgs {
    /// Positional arguments, in call order.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl QueryArgs {
    /// An empty argument bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn with_kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.to_string(), value.into());
        self
    }

    /// Required positional argument at `index`, decoded into `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> BrokerResult<T> {
        let value = self
            .args
            .get(index)
            .ok_or_else(|| BrokerError::Argument(format!("missing positional argument {index}")))?;
        decode(value, &format!("positional argument {index}"))
    }

    /// Optional positional argument at `index`. Absent or `null` yields `None`.
    pub fn opt_arg<T: DeserializeOwned>(&self, index: usize) -> BrokerResult<Option<T>> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(value, &format!("positional argument {index}")).map(Some),
        }
    }

    /// Optional named argument. Absent or `null` yields `None`.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> BrokerResult<Option<T>> {
        match self.kwargs.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(value, &format!("argument {name:?}")).map(Some),
        }
    }

    /// Named argument with a fallback when absent.
    pub fn kwarg_or<T: DeserializeOwned>(&self, name: &str, default: T) -> BrokerResult<T> {
        Ok(self.kwarg(name)?.unwrap_or(default))
    }
}

fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> BrokerResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| BrokerError::Argument(format!("{what}: {e}")))
}
