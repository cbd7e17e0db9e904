//! Remote call envelopes and their JSON wire form.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trellis_core::Value;
use uuid::Uuid;

use crate::error::Result;

/// Opaque token pairing a call with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A method call on its way to the privileged context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCallEnvelope {
    pub call_id: CallId,
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// The calling context; results are routed back to it.
    pub origin: String,
}

impl RemoteCallEnvelope {
    pub fn new(
        origin: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            call_id: CallId::new(),
            target: target.into(),
            method: method.into(),
            args,
            origin: origin.into(),
        }
    }
}

/// The outcome of one call, on its way back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCallResult {
    pub call_id: CallId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl RemoteCallResult {
    pub fn success(call_id: CallId, value: Value) -> Self {
        Self {
            call_id,
            ok: true,
            value: Some(value),
            error_description: None,
        }
    }

    pub fn failure(call_id: CallId, description: impl Into<String>) -> Self {
        Self {
            call_id,
            ok: false,
            value: None,
            error_description: Some(description.into()),
        }
    }

    pub fn from_outcome(call_id: CallId, outcome: std::result::Result<Value, String>) -> Self {
        match outcome {
            Ok(value) => Self::success(call_id, value),
            Err(description) => Self::failure(call_id, description),
        }
    }

    /// The value, or the error description of a failed call.
    pub fn into_outcome(self) -> std::result::Result<Value, String> {
        if self.ok {
            Ok(self.value.unwrap_or_default())
        } else {
            Err(self
                .error_description
                .unwrap_or_else(|| "remote call failed".to_string()))
        }
    }
}

/// Encode a frame as JSON text.
pub fn encode<T: Serialize>(frame: &T) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a JSON text frame.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use collection_literals::btree;

    #[test]
    fn envelope_wire_shape() {
        let mut envelope = RemoteCallEnvelope::new(
            "app",
            "maps",
            "create",
            vec![Value::Map(btree! {
                "id".into() => Value::from("m1"),
                "zoom".into() => Value::from(8),
            })],
        );
        envelope.call_id = CallId::from_uuid(Uuid::nil());

        let json: serde_json::Value = serde_json::from_str(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "callId": "00000000-0000-0000-0000-000000000000",
                "target": "maps",
                "method": "create",
                "args": [{"id": "m1", "zoom": 8}],
                "origin": "app"
            })
        );
    }

    #[test]
    fn result_wire_shape() {
        let id = CallId::from_uuid(Uuid::nil());
        let ok = encode(&RemoteCallResult::success(id, Value::from(true))).unwrap();
        assert_eq!(
            ok,
            r#"{"callId":"00000000-0000-0000-0000-000000000000","ok":true,"value":true}"#
        );

        let failed: RemoteCallResult = decode(
            r#"{"callId":"00000000-0000-0000-0000-000000000000","ok":false,"errorDescription":"no map"}"#,
        )
        .unwrap();
        assert_eq!(failed.into_outcome(), Err("no map".to_string()));
    }

    #[test]
    fn missing_value_is_null() {
        let result: RemoteCallResult = decode(
            r#"{"callId":"00000000-0000-0000-0000-000000000000","ok":true}"#,
        )
        .unwrap();
        assert_eq!(result.into_outcome(), Ok(Value::Null));
    }

    #[test]
    fn call_ids_are_unique() {
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode::<RemoteCallEnvelope>("{not json").unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
    }
}
