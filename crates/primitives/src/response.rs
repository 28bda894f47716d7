use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wallet's answer, as stored by the relay under `{id}.resp`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelayedResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RelayedResponse {
    /// A non-empty `error` is terminal; otherwise the payload is the result.
    /// A response carrying neither resolves to `null`.
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) if !error.is_empty() => Err(error),
            _ => Ok(self.payload.unwrap_or(Value::Null)),
        }
    }
}
