//! The signed message envelope.

use crate::auth::{keys_match, sign, verify_digest};
use crate::codes;
use crate::entry::ErrorEntry;
use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::{Payload, PayloadEntry, UnroutablePayload};
use crate::wire::{MessageBody, PayloadMap, RawEnvelope, SignedMessage};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Keys every received message must carry.
const REQUIRED_KEYS: [&str; 6] = ["api_key", "digest", "payloads", "errors", "status", "success"];

/// A message: an ordered batch of payloads plus message-level status.
///
/// The API key is withheld from the serialized body while
/// `protect_key` is set. Outbound requests show it; responses only show it
/// once the request they answer has validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    key: Option<String>,
    digest: Option<String>,
    entries: Vec<PayloadEntry>,
    errors: Vec<ErrorEntry>,
    status: Option<u16>,
    success: bool,
    protect_key: bool,
    sent_raw: Option<String>,
}

impl Message {
    fn empty() -> Self {
        Self {
            key: None,
            digest: None,
            entries: Vec::new(),
            errors: Vec::new(),
            status: None,
            success: false,
            protect_key: true,
            sent_raw: None,
        }
    }

    /// Creates an outbound request. The sender's key is shown.
    pub fn request() -> Self {
        let mut message = Self::empty();
        message.protect_key = false;
        message
    }

    /// Creates a response. The key stays withheld until the request
    /// being answered validates.
    pub fn respond() -> Self {
        Self::empty()
    }

    /// Parses a message from JSON bytes.
    pub fn from_wire(bytes: &[u8]) -> ProtocolResult<Self> {
        let envelope: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Parse(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    /// Rebuilds a message from decoded JSON.
    ///
    /// Payload order follows the order of the map that is passed in; use
    /// [`Message::from_wire`] to keep the order the sender used.
    pub fn from_data(data: Value) -> ProtocolResult<Self> {
        if !data.is_object() {
            return Err(ProtocolError::malformed("message is not an object"));
        }
        let envelope =
            RawEnvelope::deserialize(data).map_err(|e| ProtocolError::malformed(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    /// Reads a message from an incoming request: the `message` form field
    /// when present, otherwise the raw body.
    pub fn receive(form_message: Option<&str>, body: &[u8]) -> ProtocolResult<Self> {
        match form_message.filter(|message| !message.is_empty()) {
            Some(message) => Self::from_wire(message.as_bytes()),
            None if !body.is_empty() => Self::from_wire(body),
            None => Err(ProtocolError::NoMessage),
        }
    }

    fn from_envelope(envelope: RawEnvelope) -> ProtocolResult<Self> {
        let fields = [
            envelope.api_key.is_some(),
            envelope.digest.is_some(),
            envelope.payloads.is_some(),
            envelope.errors.is_some(),
            envelope.status.is_some(),
            envelope.success.is_some(),
        ];
        if let Some(index) = fields.iter().position(|present| !present) {
            return Err(ProtocolError::MissingField(REQUIRED_KEYS[index]));
        }

        let mut message = Self::empty();
        message.key = optional_text(envelope.api_key, "api_key")?;
        message.digest = optional_text(envelope.digest, "digest")?;
        message.errors = envelope
            .errors
            .as_ref()
            .map(ErrorEntry::list_from_data)
            .transpose()?
            .unwrap_or_default();
        message.status = match envelope.status {
            None | Some(Value::Null) => None,
            Some(status) => Some(
                status
                    .as_u64()
                    .and_then(|status| u16::try_from(status).ok())
                    .ok_or_else(|| ProtocolError::malformed("message status is not a code"))?,
            ),
        };
        message.success = match envelope.success {
            Some(Value::Bool(success)) => success,
            _ => return Err(ProtocolError::malformed("message success is not a flag")),
        };

        for data in envelope.payloads.unwrap_or_default() {
            message.add_entry(PayloadEntry::from_data(&data)?)?;
        }

        // A received message signs over the key it carried.
        message.protect_key = false;

        debug!(
            payloads = message.entries.len(),
            errors = message.errors.len(),
            "parsed message"
        );
        Ok(message)
    }

    /// Adds a payload. Fails if the identifier is already present, leaving
    /// the existing payload untouched.
    pub fn add_payload(&mut self, payload: Payload) -> ProtocolResult<&mut Self> {
        self.add_entry(PayloadEntry::Routable(payload))
    }

    /// Adds the reply to an unroutable payload.
    pub fn add_unroutable(&mut self, payload: UnroutablePayload) -> ProtocolResult<&mut Self> {
        self.add_entry(PayloadEntry::Unroutable(payload))
    }

    fn add_entry(&mut self, entry: PayloadEntry) -> ProtocolResult<&mut Self> {
        if self.contains(entry.identifier()) {
            return Err(ProtocolError::DuplicatePayload(entry.identifier().to_string()));
        }
        self.entries.push(entry);
        Ok(self)
    }

    /// Appends a message-level error.
    pub fn add_error(&mut self, error: ErrorEntry) -> &mut Self {
        self.errors.push(error);
        self.recompute();
        self
    }

    /// Sets the message-level status.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        self.success = matches!(self.status, Some(status) if (200..300).contains(&status))
            && self.errors.is_empty();
    }

    /// Returns true if a payload with this identifier is present.
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.identifier() == identifier)
    }

    /// Returns every payload entry in insertion order.
    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    /// Returns the routable payloads in insertion order.
    pub fn payloads(&self) -> impl Iterator<Item = &Payload> {
        self.entries.iter().filter_map(PayloadEntry::as_payload)
    }

    /// Returns the entry with this identifier.
    pub fn entry(&self, identifier: &str) -> Option<&PayloadEntry> {
        self.entries
            .iter()
            .find(|entry| entry.identifier() == identifier)
    }

    /// Returns the routable payload with this identifier.
    pub fn payload(&self, identifier: &str) -> Option<&Payload> {
        self.entry(identifier).and_then(PayloadEntry::as_payload)
    }

    /// Returns the number of payload entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the message carries no payloads.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the message-level errors.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Returns the message-level status.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the message-level success flag.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns the key carried by a received message.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the digest carried by a received message.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Returns true if the key is withheld from the serialized body.
    pub fn is_key_protected(&self) -> bool {
        self.protect_key
    }

    /// Returns the JSON that was transmitted, once sent.
    pub fn sent_raw(&self) -> Option<&str> {
        self.sent_raw.as_deref()
    }

    /// Records the JSON that was transmitted.
    pub fn mark_sent(&mut self, raw: impl Into<String>) {
        self.sent_raw = Some(raw.into());
    }

    /// HTTP status for this message: the message-level status when set,
    /// otherwise the most severe failed payload status, otherwise 200.
    pub fn http_status(&self) -> u16 {
        self.status.unwrap_or_else(|| {
            self.entries
                .iter()
                .filter_map(PayloadEntry::status)
                .filter(|status| *status >= 400)
                .max()
                .unwrap_or(200)
        })
    }

    fn body(&self, api_key: Option<String>) -> MessageBody {
        MessageBody {
            api_key,
            errors: self.errors.clone(),
            payloads: PayloadMap(self.entries.iter().map(PayloadEntry::to_wire).collect()),
            status: self.status,
            success: self.success,
        }
    }

    fn body_for(&self, key: &str) -> MessageBody {
        let api_key = (!self.protect_key).then(|| key.to_string());
        self.body(api_key)
    }

    /// Digest of the body as it would be sent with `key`.
    pub fn get_digest(&self, key: &str, secret: &str) -> ProtocolResult<String> {
        let bytes = self.body_for(key).canonical_bytes()?;
        sign(secret.as_bytes(), &bytes)
    }

    /// Builds the body for `key` and attaches its digest.
    pub fn get_message(&self, key: &str, secret: &str) -> ProtocolResult<SignedMessage> {
        let body = self.body_for(key);
        let digest = sign(secret.as_bytes(), &body.canonical_bytes()?)?;
        Ok(SignedMessage { body, digest })
    }

    /// Serializes the signed message to JSON bytes.
    pub fn to_wire(&self, key: &str, secret: &str) -> ProtocolResult<Vec<u8>> {
        Ok(self.get_message(key, secret)?.to_json()?)
    }

    /// Checks a received message against the local key and secret.
    ///
    /// Key mismatch and digest mismatch each add their own error to
    /// `response` and set its status to 400. Only when both checks pass is
    /// the response allowed to show the key.
    pub fn valid(&self, expected_key: &str, secret: &str, response: &mut Message) -> bool {
        let mut error_occurred = false;

        let key_matches = self
            .key
            .as_deref()
            .is_some_and(|key| keys_match(key, expected_key));
        if !key_matches {
            warn!("message API key did not match");
            response
                .add_error(ErrorEntry::new(
                    codes::KEY_MISMATCH,
                    "The message API key was incorrect",
                ))
                .set_status(400);
            error_occurred = true;
        }

        let digest_matches = match (&self.digest, self.body(self.key.clone()).canonical_bytes()) {
            (Some(digest), Ok(bytes)) => verify_digest(secret.as_bytes(), &bytes, digest),
            _ => false,
        };
        if !digest_matches {
            warn!("message digest did not validate");
            response
                .add_error(ErrorEntry::new(
                    codes::DIGEST_MISMATCH,
                    "The message digest did not validate",
                ))
                .set_status(400);
            error_occurred = true;
        }

        if error_occurred {
            return false;
        }
        response.protect_key = false;
        true
    }
}

fn optional_text(value: Option<Value>, field: &str) -> ProtocolResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(ProtocolError::malformed(format!(
            "message {field} is not a string"
        ))),
    }
}
