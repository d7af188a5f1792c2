//! HTTP transport implementation.
//!
//! The HTTP library sits behind [`HttpClient`] so the transport can run
//! against `reqwest` in production and against an in-process endpoint in
//! tests.

use crate::config::{ClientConfig, RemoteEndpoint};
use crate::error::{TransportError, TransportResult};
use crate::transport::{parse_reply, prepare, MessageTransport, MESSAGE_FIELD};
use capi_protocol::Message;
use parking_lot::RwLock;
use tracing::warn;

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Posts a single URL-encoded form field and returns the response body.
    ///
    /// Non-2xx responses still return their body; only failures to
    /// complete the exchange are errors.
    fn post_form(&self, url: &str, field: &str, value: &str) -> Result<Vec<u8>, String>;
}

/// Blocking `reqwest` client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client from the configuration.
    pub fn new(config: &ClientConfig) -> TransportResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn post_form(&self, url: &str, field: &str, value: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .post(url)
            .form(&[(field, value)])
            .send()
            .map_err(|e| e.to_string())?;
        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|e| e.to_string())
    }
}

/// HTTP-based message transport.
pub struct HttpTransport<C: HttpClient> {
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport over the given client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the last network error, if the previous send failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: HttpClient> MessageTransport for HttpTransport<C> {
    fn send(&self, message: &mut Message, endpoint: &RemoteEndpoint) -> TransportResult<Message> {
        let json = prepare(message, endpoint)?;

        let body = self
            .client
            .post_form(&endpoint.uri, MESSAGE_FIELD, &json)
            .map_err(|e| {
                warn!(uri = %endpoint.uri, error = %e, "message delivery failed");
                *self.last_error.write() = Some(e.clone());
                TransportError::Network(e)
            })?;

        *self.last_error.write() = None;
        parse_reply(&body)
    }
}

/// Trait for endpoints that can answer loopback requests.
pub trait LoopbackServer {
    /// Handles a form post and returns the response body.
    fn handle_form(&self, url: &str, field: &str, value: &str) -> Result<Vec<u8>, String>;
}

/// An HTTP client that hands requests straight to an in-process endpoint.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post_form(&self, url: &str, field: &str, value: &str) -> Result<Vec<u8>, String> {
        self.server.handle_form(url, field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capi_protocol::{codes, Action, Module, Payload};
    use parking_lot::Mutex;

    /// Echoes every payload back with status 201.
    struct EchoServer {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl EchoServer {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl LoopbackServer for EchoServer {
        fn handle_form(&self, url: &str, field: &str, value: &str) -> Result<Vec<u8>, String> {
            self.seen.lock().push((url.to_string(), field.to_string()));
            let request = Message::from_wire(value.as_bytes()).map_err(|e| e.to_string())?;
            let mut response = Message::respond();
            if !request.valid("key", "secret", &mut response) {
                return response.to_wire("key", "secret").map_err(|e| e.to_string());
            }
            for payload in request.payloads() {
                response
                    .add_payload(payload.make_response().with_status(201))
                    .map_err(|e| e.to_string())?;
            }
            response.set_status(200);
            response.to_wire("key", "secret").map_err(|e| e.to_string())
        }
    }

    struct FailingClient;

    impl HttpClient for FailingClient {
        fn post_form(&self, _url: &str, _field: &str, _value: &str) -> Result<Vec<u8>, String> {
            Err("dns error: no such host".to_string())
        }
    }

    fn request() -> Message {
        let mut request = Message::request();
        request
            .add_payload(Payload::new("art-1", Module::Articles, Action::Create))
            .unwrap();
        request
    }

    #[test]
    fn loopback_round_trip() {
        let transport = HttpTransport::new(LoopbackClient::new(EchoServer::new()));
        let endpoint = RemoteEndpoint::new("http://localhost/capi", "key", "secret");

        let reply = transport.send(&mut request(), &endpoint).unwrap();

        assert_eq!(reply.status(), Some(200));
        assert_eq!(reply.payload("art-1").unwrap().status(), Some(201));
        assert!(transport.last_error().is_none());

        let seen = transport.client().server().seen.lock().clone();
        assert_eq!(seen, vec![("http://localhost/capi".to_string(), "message".to_string())]);
    }

    #[test]
    fn reply_validates_when_key_is_released() {
        let transport = HttpTransport::new(LoopbackClient::new(EchoServer::new()));
        let endpoint = RemoteEndpoint::new("http://localhost/capi", "key", "secret");

        let reply = transport.send(&mut request(), &endpoint).unwrap();
        let mut check = Message::respond();
        assert!(reply.valid("key", "secret", &mut check));
    }

    #[test]
    fn wrong_secret_gets_signed_rejection() {
        let transport = HttpTransport::new(LoopbackClient::new(EchoServer::new()));
        let endpoint = RemoteEndpoint::new("http://localhost/capi", "key", "wrong");

        let reply = transport.send(&mut request(), &endpoint).unwrap();
        assert_eq!(reply.status(), Some(400));
        assert_eq!(reply.errors()[0].code(), codes::DIGEST_MISMATCH);
        assert!(reply.key().is_none());
    }

    #[test]
    fn network_error_is_remembered() {
        let transport = HttpTransport::new(FailingClient);
        let endpoint = RemoteEndpoint::new("http://nowhere.invalid/capi", "key", "secret");

        let mut message = request();
        let err = transport.send(&mut message, &endpoint).unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
        assert!(transport.last_error().unwrap().contains("no such host"));
        // The attempt is still recorded on the message.
        assert!(message.sent_raw().is_some());
    }

    #[test]
    fn reqwest_client_builds() {
        let client = ReqwestClient::new(&ClientConfig::default());
        assert!(client.is_ok());
    }
}
