//! Transport abstraction for sending messages.

use crate::config::RemoteEndpoint;
use crate::error::{TransportError, TransportResult};
use capi_protocol::{Message, ProtocolError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// Name of the form field that carries the signed message.
pub(crate) const MESSAGE_FIELD: &str = "message";

/// Sends a message to a remote endpoint and returns its reply.
///
/// Implementations sign the message with the endpoint's credentials,
/// record the exact JSON that went out on the message, and parse the
/// reply body. The reply's digest is not checked here.
pub trait MessageTransport: Send + Sync {
    /// Sends `message` to `endpoint`.
    fn send(&self, message: &mut Message, endpoint: &RemoteEndpoint) -> TransportResult<Message>;
}

/// Signs `message` and records the JSON text on it.
pub(crate) fn prepare(message: &mut Message, endpoint: &RemoteEndpoint) -> TransportResult<String> {
    let signed = message.get_message(endpoint.api_key(), endpoint.api_secret())?;
    let json = serde_json::to_string(&signed).map_err(ProtocolError::from)?;
    message.mark_sent(json.clone());
    debug!(
        uri = %endpoint.uri,
        payloads = message.len(),
        bytes = json.len(),
        "sending message"
    );
    Ok(json)
}

/// Parses a reply body.
pub(crate) fn parse_reply(body: &[u8]) -> TransportResult<Message> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(TransportError::EmptyResponse);
    }
    let reply = Message::from_wire(body)?;
    debug!(
        status = ?reply.status(),
        payloads = reply.len(),
        success = reply.success(),
        "received reply"
    );
    Ok(reply)
}

/// A scripted transport for tests.
///
/// Replies are returned in the order they were queued. When the queue is
/// empty, `send` fails with [`TransportError::EmptyResponse`].
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    sent: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a mock transport with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw reply body.
    pub fn push_reply(&self, body: impl Into<Vec<u8>>) {
        self.replies.lock().push_back(Ok(body.into()));
    }

    /// Queues a network failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().push_back(Err(message.into()));
    }

    /// Returns the JSON text of every message sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl MessageTransport for MockTransport {
    fn send(&self, message: &mut Message, endpoint: &RemoteEndpoint) -> TransportResult<Message> {
        let json = prepare(message, endpoint)?;
        self.sent.lock().push(json);

        match self.replies.lock().pop_front() {
            Some(Ok(body)) => parse_reply(&body),
            Some(Err(err)) => Err(TransportError::Network(err)),
            None => Err(TransportError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capi_protocol::{codes, Action, ErrorEntry, Module, Payload};

    fn endpoint() -> RemoteEndpoint {
        RemoteEndpoint::new("https://cms.example.com/capi", "key", "secret")
    }

    fn request() -> Message {
        let mut request = Message::request();
        let mut payload = Payload::new("art-1", Module::Articles, Action::Create);
        payload.add_data("title", "Hello");
        request.add_payload(payload).unwrap();
        request
    }

    #[test]
    fn send_records_raw_json() {
        let transport = MockTransport::new();
        let mut reply = Message::respond();
        reply.set_status(200);
        transport.push_reply(reply.to_wire("key", "secret").unwrap());

        let mut message = request();
        let received = transport.send(&mut message, &endpoint()).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(message.sent_raw(), Some(sent[0].as_str()));
        assert!(sent[0].contains("\"digest\""));
        assert_eq!(received.status(), Some(200));
    }

    #[test]
    fn sent_message_validates_at_receiver() {
        let transport = MockTransport::new();
        transport.push_reply(Message::respond().to_wire("key", "secret").unwrap());

        let mut message = request();
        transport.send(&mut message, &endpoint()).unwrap();

        let received = Message::from_wire(transport.sent()[0].as_bytes()).unwrap();
        let mut response = Message::respond();
        assert!(received.valid("key", "secret", &mut response));
    }

    #[test]
    fn empty_reply_is_an_error() {
        let transport = MockTransport::new();
        transport.push_reply(Vec::new());

        let err = transport.send(&mut request(), &endpoint()).unwrap_err();
        assert!(matches!(err, TransportError::EmptyResponse));
        assert_eq!(err.to_string(), "unexpected empty response");
    }

    #[test]
    fn network_failure_is_retryable() {
        let transport = MockTransport::new();
        transport.push_failure("connection refused");

        let err = transport.send(&mut request(), &endpoint()).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn malformed_reply_is_a_protocol_error() {
        let transport = MockTransport::new();
        transport.push_reply(b"<html>Bad Gateway</html>".to_vec());

        let err = transport.send(&mut request(), &endpoint()).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ProtocolError::Parse(_))));
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_replies_are_returned_not_raised() {
        let transport = MockTransport::new();
        let mut reply = Message::respond();
        reply.add_error(ErrorEntry::new(codes::DIGEST_MISMATCH, "The message digest did not validate"));
        reply.set_status(400);
        transport.push_reply(reply.to_wire("key", "secret").unwrap());

        let received = transport.send(&mut request(), &endpoint()).unwrap();
        assert!(!received.success());
        assert_eq!(received.errors()[0].code(), codes::DIGEST_MISMATCH);
    }
}
