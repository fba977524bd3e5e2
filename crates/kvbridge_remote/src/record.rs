//! The replicated record and its wire shape.

use crate::error::{RemoteError, RemoteResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the optional logical timestamp embedded in structured values.
pub const EMBEDDED_TIMESTAMP_FIELD: &str = "updatedAt";

/// One replicated entry as held by the remote store.
///
/// On the wire the value may arrive as a raw string or as a structured
/// JSON value; a record with no value at all is malformed and skipped
/// by the engine. `ts` is the writing client's clock in milliseconds;
/// `server_ts` (wire name `updatedAt`) is assigned by the remote store
/// at write time and is monotonic per write, but otherwise opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// The entry's key, unique within the collection.
    pub key: String,
    /// The replicated value: raw string or structured JSON.
    #[serde(default)]
    pub value: Option<Value>,
    /// Identifier of the device that produced this version.
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Client-assigned write time, milliseconds since the epoch.
    pub ts: u64,
    /// Server-assigned write stamp, monotonic per write.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub server_ts: Option<u64>,
}

impl RemoteRecord {
    /// Creates a record holding a raw string value.
    pub fn text(
        key: impl Into<String>,
        value: impl Into<String>,
        device_id: impl Into<String>,
        ts: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value: Some(Value::String(value.into())),
            device_id: device_id.into(),
            ts,
            server_ts: None,
        }
    }

    /// Creates a record holding a structured value.
    pub fn structured(
        key: impl Into<String>,
        value: Value,
        device_id: impl Into<String>,
        ts: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            device_id: device_id.into(),
            ts,
            server_ts: None,
        }
    }

    /// Normalizes the value to the string form the local store holds.
    ///
    /// Raw strings pass through unchanged; structured values serialize
    /// to their JSON text, with `null` normalizing to an empty object.
    /// Returns `None` for a record with no value at all.
    pub fn normalized_value(&self) -> Option<String> {
        match &self.value {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) => Some("{}".to_string()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Reads the embedded logical timestamp, if the value carries one.
    pub fn embedded_updated_at(&self) -> Option<i64> {
        embedded_updated_at(&self.normalized_value()?)
    }

    /// Decodes a record from its wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Codec`] if the document is not valid JSON
    /// or is missing required fields.
    pub fn decode(raw: &str) -> RemoteResult<Self> {
        serde_json::from_str(raw).map_err(|e| RemoteError::Codec(e.to_string()))
    }

    /// Encodes the record to its wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Codec`] if serialization fails.
    pub fn encode(&self) -> RemoteResult<String> {
        serde_json::to_string(self).map_err(|e| RemoteError::Codec(e.to_string()))
    }
}

/// Probes a stored string for an embedded logical timestamp.
///
/// The string must parse as a JSON object carrying an integer
/// [`EMBEDDED_TIMESTAMP_FIELD`] member; anything else yields `None`.
pub fn embedded_updated_at(raw: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(raw).ok()?;
    value.get(EMBEDDED_TIMESTAMP_FIELD)?.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_value_passes_through() {
        let record = RemoteRecord::text("k", "plain text", "dev-a", 1);
        assert_eq!(record.normalized_value().as_deref(), Some("plain text"));
    }

    #[test]
    fn structured_value_serializes() {
        let record = RemoteRecord::structured("k", json!({"n": 1}), "dev-a", 1);
        assert_eq!(record.normalized_value().as_deref(), Some(r#"{"n":1}"#));
    }

    #[test]
    fn null_value_normalizes_to_empty_object() {
        let record = RemoteRecord::structured("k", Value::Null, "dev-a", 1);
        assert_eq!(record.normalized_value().as_deref(), Some("{}"));
    }

    #[test]
    fn missing_value_is_none() {
        let record = RemoteRecord {
            key: "k".into(),
            value: None,
            device_id: "dev-a".into(),
            ts: 1,
            server_ts: None,
        };
        assert!(record.normalized_value().is_none());
    }

    #[test]
    fn embedded_timestamp_from_object() {
        assert_eq!(embedded_updated_at(r#"{"updatedAt": 42, "v": "x"}"#), Some(42));
    }

    #[test]
    fn embedded_timestamp_absent_or_unparseable() {
        assert_eq!(embedded_updated_at(r#"{"v": "x"}"#), None);
        assert_eq!(embedded_updated_at("not json"), None);
        assert_eq!(embedded_updated_at(r#""a plain string""#), None);
        assert_eq!(embedded_updated_at(r#"{"updatedAt": "noon"}"#), None);
    }

    #[test]
    fn record_embedded_timestamp_via_value() {
        let record =
            RemoteRecord::structured("k", json!({"updatedAt": 7}), "dev-a", 1);
        assert_eq!(record.embedded_updated_at(), Some(7));

        let record = RemoteRecord::text("k", r#"{"updatedAt": 9}"#, "dev-a", 1);
        assert_eq!(record.embedded_updated_at(), Some(9));
    }

    #[test]
    fn wire_field_names() {
        let record = RemoteRecord::text("k", "v", "dev-a", 123);
        let wire = record.encode().unwrap();
        assert!(wire.contains(r#""deviceId":"dev-a""#));
        assert!(wire.contains(r#""ts":123"#));
        assert!(!wire.contains("server_ts"));

        let decoded = RemoteRecord::decode(&wire).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_tolerates_missing_value() {
        let decoded =
            RemoteRecord::decode(r#"{"key":"k","deviceId":"dev-a","ts":5}"#).unwrap();
        assert!(decoded.value.is_none());
        assert_eq!(decoded.ts, 5);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            RemoteRecord::decode("{{"),
            Err(RemoteError::Codec(_))
        ));
    }

    #[test]
    fn decode_reads_server_stamp() {
        let decoded = RemoteRecord::decode(
            r#"{"key":"k","value":"v","deviceId":"dev-a","ts":5,"updatedAt":99}"#,
        )
        .unwrap();
        assert_eq!(decoded.server_ts, Some(99));
    }
}
