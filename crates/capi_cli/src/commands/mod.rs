//! CLI command implementations.

pub mod handle;
pub mod send;
pub mod sign;
pub mod verify;

use capi_protocol::{Message, Payload};
use serde_json::Value;
use std::path::Path;

/// Reads a JSON array of payloads (`identifier`, `module`, `action`, `data`)
/// and builds a request message from it.
pub fn load_request(path: &Path) -> Result<Message, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let items: Value = serde_json::from_str(&text)?;
    let items = items
        .as_array()
        .ok_or("payload file must contain a JSON array")?;

    let mut request = Message::request();
    for item in items {
        request.add_payload(Payload::from_data(item)?)?;
    }
    Ok(request)
}

/// Pretty-prints wire bytes when they are JSON, raw text otherwise.
pub fn pretty(bytes: &[u8]) -> String {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_request_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"identifier": "art-2", "module": "articles", "action": "post", "data": {{"title": "B"}}}},
                {{"identifier": "art-1", "module": "articles", "action": "delete"}}
            ]"#
        )
        .unwrap();

        let request = load_request(file.path()).unwrap();
        let identifiers: Vec<_> = request.payloads().map(|p| p.identifier()).collect();
        assert_eq!(identifiers, vec!["art-2", "art-1"]);
    }

    #[test]
    fn load_request_rejects_unknown_module() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"identifier": "v", "module": "videos", "action": "post"}}]"#
        )
        .unwrap();
        assert!(load_request(file.path()).is_err());
    }

    #[test]
    fn load_request_rejects_duplicates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"identifier": "a", "module": "articles", "action": "post"}},
                {{"identifier": "a", "module": "articles", "action": "patch"}}
            ]"#
        )
        .unwrap();
        let err = load_request(file.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn pretty_falls_back_to_text() {
        assert_eq!(pretty(b"plain"), "plain");
        assert!(pretty(br#"{"a":1}"#).contains("\"a\": 1"));
    }
}
