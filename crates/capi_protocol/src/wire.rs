//! Wire representation of messages.
//!
//! Serialization goes through these structs so field order is fixed by
//! declaration order. Deserialization keeps the payload collection in the
//! order it was received, which the default JSON map does not.

use crate::entry::ErrorEntry;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A payload as written to the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WirePayload {
    /// Correlation identifier.
    pub identifier: String,
    /// Module name.
    pub module: String,
    /// Action name.
    pub action: String,
    /// Action-specific data.
    pub data: Map<String, Value>,
    /// Accumulated errors.
    pub errors: Vec<ErrorEntry>,
    /// HTTP-style status.
    pub status: Option<u16>,
    /// Success flag.
    pub success: bool,
}

/// Payloads serialized as an object keyed by identifier, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadMap(pub Vec<WirePayload>);

impl Serialize for PayloadMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for payload in &self.0 {
            map.serialize_entry(&payload.identifier, payload)?;
        }
        map.end()
    }
}

/// The signed part of a message: everything except the digest.
///
/// Field order here is the canonical order the digest is computed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageBody {
    /// API key, or null when withheld.
    pub api_key: Option<String>,
    /// Message-level errors.
    pub errors: Vec<ErrorEntry>,
    /// Payloads keyed by identifier.
    pub payloads: PayloadMap,
    /// Message-level status.
    pub status: Option<u16>,
    /// Message-level success flag.
    pub success: bool,
}

impl MessageBody {
    /// Returns the canonical bytes the digest is computed over.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A body together with its digest, ready for transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedMessage {
    /// The signed body.
    #[serde(flatten)]
    pub body: MessageBody,
    /// Lowercase hex HMAC-SHA256 of the canonical body.
    pub digest: String,
}

impl SignedMessage {
    /// Serializes to JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A received envelope. Each field is `None` when absent and
/// `Some(Value::Null)` when present but null.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawEnvelope {
    #[serde(default, deserialize_with = "present")]
    pub api_key: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub digest: Option<Value>,
    #[serde(default, deserialize_with = "ordered_payloads")]
    pub payloads: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "present")]
    pub errors: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub status: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub success: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn ordered_payloads<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Value>>, D::Error> {
    deserializer.deserialize_any(PayloadsVisitor).map(Some)
}

/// Collects payload values in received order. An empty list is accepted
/// as an empty collection; peers that serialize empty maps as lists send it.
struct PayloadsVisitor;

impl<'de> Visitor<'de> for PayloadsVisitor {
    type Value = Vec<Value>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of payloads keyed by identifier")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut payloads = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((_identifier, payload)) = access.next_entry::<String, Value>()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut payloads = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(payload) = access.next_element::<Value>()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Err(E::custom("payloads is null"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_payload(identifier: &str) -> WirePayload {
        WirePayload {
            identifier: identifier.into(),
            module: "articles".into(),
            action: "post".into(),
            data: Map::new(),
            errors: vec![],
            status: None,
            success: false,
        }
    }

    #[test]
    fn body_field_order() {
        let body = MessageBody {
            api_key: None,
            errors: vec![],
            payloads: PayloadMap(vec![wire_payload("b"), wire_payload("a")]),
            status: Some(200),
            success: true,
        };
        let text = String::from_utf8(body.canonical_bytes().unwrap()).unwrap();
        assert!(text.starts_with(r#"{"api_key":null,"errors":[],"payloads":{"b":"#));
        assert!(text.find(r#""b":"#).unwrap() < text.find(r#""a":"#).unwrap());
        assert!(text.ends_with(r#""status":200,"success":true}"#));
    }

    #[test]
    fn signed_message_appends_digest() {
        let signed = SignedMessage {
            body: MessageBody {
                api_key: Some("key".into()),
                errors: vec![],
                payloads: PayloadMap::default(),
                status: None,
                success: false,
            },
            digest: "abc".into(),
        };
        let text = String::from_utf8(signed.to_json().unwrap()).unwrap();
        assert_eq!(
            text,
            r#"{"api_key":"key","errors":[],"payloads":{},"status":null,"success":false,"digest":"abc"}"#
        );
    }

    #[test]
    fn envelope_keeps_payload_order() {
        let json = br#"{"payloads":{"z":{"n":1},"a":{"n":2},"m":{"n":3}}}"#;
        let envelope: RawEnvelope = serde_json::from_slice(json).unwrap();
        let order: Vec<_> = envelope
            .payloads
            .unwrap()
            .iter()
            .map(|p| p["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(envelope.digest.is_none());
    }

    #[test]
    fn envelope_distinguishes_null_from_absent() {
        let envelope: RawEnvelope =
            serde_json::from_slice(br#"{"api_key":null,"payloads":[]}"#).unwrap();
        assert_eq!(envelope.api_key, Some(Value::Null));
        assert_eq!(envelope.payloads, Some(vec![]));
        assert!(envelope.status.is_none());
    }
}
