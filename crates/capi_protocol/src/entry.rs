//! Structured failure entries carried by payloads and messages.

use crate::error::{ProtocolError, ProtocolResult};
use serde::Serialize;
use serde_json::Value;

/// A single failure: code, description and optional detail.
///
/// Entries are immutable once built and only exist nested inside a
/// [`Payload`](crate::Payload) or [`Message`](crate::Message).
/// Field order is part of the canonical form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    code: u16,
    description: String,
    information: Option<Value>,
}

impl ErrorEntry {
    /// Creates an entry without detail.
    pub fn new(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            information: None,
        }
    }

    /// Attaches detail (text or structured).
    pub fn with_information(mut self, information: impl Into<Value>) -> Self {
        let information = information.into();
        self.information = (!information.is_null()).then_some(information);
        self
    }

    /// Returns the registry code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detail, if any.
    pub fn information(&self) -> Option<&Value> {
        self.information.as_ref()
    }

    /// Rebuilds an entry from decoded wire data.
    ///
    /// All of `code`, `description` and `information` must be present;
    /// `information` may be null.
    pub fn from_data(data: &Value) -> ProtocolResult<Self> {
        let map = data
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("error entry is not an object"))?;

        for key in ["code", "description", "information"] {
            if !map.contains_key(key) {
                return Err(ProtocolError::malformed(format!(
                    "error does not contain a key \"{key}\""
                )));
            }
        }

        let code = map
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| ProtocolError::malformed("error code is not a small integer"))?;

        let description = map
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::malformed("error description is not a string"))?;

        let information = map.get("information").cloned().unwrap_or(Value::Null);

        Ok(Self::new(code, description).with_information(information))
    }

    /// Rebuilds a list of entries from a decoded JSON array.
    pub(crate) fn list_from_data(data: &Value) -> ProtocolResult<Vec<Self>> {
        match data {
            Value::Array(items) => items.iter().map(Self::from_data).collect(),
            Value::Null => Ok(Vec::new()),
            _ => Err(ProtocolError::malformed("errors is not a list")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_data_requires_every_key() {
        let missing = json!({"code": 4, "description": "bad key"});
        assert!(matches!(
            ErrorEntry::from_data(&missing),
            Err(ProtocolError::MalformedData(_))
        ));

        let complete = json!({"code": 4, "description": "bad key", "information": null});
        let entry = ErrorEntry::from_data(&complete).unwrap();
        assert_eq!(entry.code(), 4);
        assert_eq!(entry.description(), "bad key");
        assert!(entry.information().is_none());
    }

    #[test]
    fn structured_information() {
        let entry = ErrorEntry::new(0x15, "Could not assign image to article")
            .with_information(json!({"articleid": 3, "attachmentid": 4}));
        assert_eq!(entry.information().unwrap()["attachmentid"], 4);
    }

    #[test]
    fn canonical_field_order() {
        let entry = ErrorEntry::new(5, "digest").with_information("detail");
        let text = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            text,
            r#"{"code":5,"description":"digest","information":"detail"}"#
        );
    }

    #[test]
    fn rejects_oversized_code() {
        let data = json!({"code": 70000, "description": "x", "information": null});
        assert!(ErrorEntry::from_data(&data).is_err());
    }
}
