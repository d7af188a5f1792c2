//! Request processing for the endpoint.

use crate::config::EndpointConfig;
use crate::error::EndpointResult;
use crate::handler::{answer, ContentHandler, HandlerRegistry};
use crate::store::ContentStore;
use capi_protocol::{codes, ErrorEntry, Message, PayloadEntry, ProtocolError};
use parking_lot::{Mutex, MutexGuard};
use serde_json::json;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Content type of every response body.
pub const CONTENT_TYPE: &str = "application/json";

/// One HTTP request as seen by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    /// HTTP method.
    pub method: String,
    /// Value of the `message` form field, if the request was a form post.
    pub form_message: Option<String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl IncomingRequest {
    /// Creates a request.
    pub fn new(method: impl Into<String>, form_message: Option<String>, body: Vec<u8>) -> Self {
        Self {
            method: method.into(),
            form_message,
            body,
        }
    }

    /// A POST carrying the message in the `message` form field.
    pub fn post_form(message: impl Into<String>) -> Self {
        Self::new("POST", Some(message.into()), Vec::new())
    }

    /// A POST carrying the message as the raw body.
    pub fn post_body(body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", None, body.into())
    }
}

/// The HTTP response to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type header value.
    pub content_type: &'static str,
    /// Signed response message.
    pub body: Vec<u8>,
}

/// The receiving endpoint.
///
/// Holds the configuration, the handler for each module and the content
/// store. Requests are processed one at a time against the store.
///
/// # Example
///
/// ```
/// use capi_endpoint::{ArticleHandler, Endpoint, EndpointConfig, IncomingRequest, MemoryStore};
///
/// let mut endpoint = Endpoint::new(EndpointConfig::new("key", "secret"), MemoryStore::default());
/// endpoint.register(ArticleHandler::default()).unwrap();
///
/// let reply = endpoint.handle(&IncomingRequest::new("GET", None, Vec::new()));
/// assert_eq!(reply.status, 405);
/// ```
pub struct Endpoint<S: ContentStore> {
    config: EndpointConfig,
    handlers: HandlerRegistry,
    store: Mutex<S>,
}

impl<S: ContentStore> Endpoint<S> {
    /// Creates an endpoint with no handlers.
    pub fn new(config: EndpointConfig, store: S) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            store: Mutex::new(store),
        }
    }

    /// Registers a content handler.
    pub fn register<H: ContentHandler + 'static>(&mut self, handler: H) -> EndpointResult<()> {
        self.handlers.register(handler)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Locks and returns the store.
    pub fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock()
    }

    /// Handles one request and returns the signed response.
    pub fn handle(&self, request: &IncomingRequest) -> EndpointResponse {
        let response = self.process(request);
        let mut status = response.http_status();

        let body = match response.to_wire(&self.config.api_key, self.config.api_secret()) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "response could not be signed");
                status = 500;
                self.signing_failure(&err.to_string())
            }
        };

        info!(
            status,
            payloads = response.len(),
            success = response.success(),
            "request processed"
        );
        EndpointResponse {
            status,
            content_type: CONTENT_TYPE,
            body,
        }
    }

    /// Processes one request into an unsigned response message.
    pub fn process(&self, request: &IncomingRequest) -> Message {
        let mut response = Message::respond();

        if !request.method.eq_ignore_ascii_case("POST") {
            warn!(method = %request.method, "rejecting request method");
            response
                .add_error(ErrorEntry::new(codes::BAD_METHOD, "Bad method, expected POST"))
                .set_status(405);
            return response;
        }

        let message = match Message::receive(request.form_message.as_deref(), &request.body) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "request message could not be parsed");
                response
                    .add_error(
                        ErrorEntry::new(codes::INTERNAL, "The message could not be parsed")
                            .with_information(err.to_string()),
                    )
                    .set_status(500);
                return response;
            }
        };

        if !self.config.is_configured() {
            warn!("endpoint key or secret is not configured");
            response.add_error(ErrorEntry::new(
                codes::NOT_CONFIGURED,
                "A required endpoint setting is not defined",
            ));
        }

        if !message.valid(&self.config.api_key, self.config.api_secret(), &mut response) {
            return response;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(&message, &mut response)
        }));
        if let Err(cause) = outcome {
            let detail = panic_text(cause.as_ref());
            error!(detail = %detail, "payload dispatch panicked");
            self.recover_store();
            response
                .add_error(
                    ErrorEntry::new(codes::INTERNAL, "A fatal error occurred at the endpoint")
                        .with_information(detail),
                )
                .set_status(500);
        }

        if response.status().is_none() {
            let status = response.http_status();
            response.set_status(status);
        }
        response
    }

    /// A bare signed 0x00/500 reply for when the full response cannot be signed.
    fn signing_failure(&self, detail: &str) -> Vec<u8> {
        let mut fallback = Message::respond();
        fallback
            .add_error(
                ErrorEntry::new(codes::INTERNAL, "The response could not be signed")
                    .with_information(detail),
            )
            .set_status(500);
        fallback
            .to_wire(&self.config.api_key, self.config.api_secret())
            .unwrap_or_else(|err| {
                error!(error = %err, "fallback response could not be signed");
                Vec::new()
            })
    }

    /// Routes every payload of an authenticated message.
    fn dispatch(&self, message: &Message, response: &mut Message) {
        if message.is_empty() {
            response
                .add_error(ErrorEntry::new(codes::NO_PAYLOADS, "No payloads provided"))
                .set_status(400);
            return;
        }
        if message.len() > self.config.max_payloads {
            warn!(
                received = message.len(),
                limit = self.config.max_payloads,
                "too many payloads"
            );
            response
                .add_error(
                    ErrorEntry::new(codes::TOO_MANY_PAYLOADS, "Too many payloads").with_information(
                        json!({"limit": self.config.max_payloads, "received": message.len()}),
                    ),
                )
                .set_status(413);
            return;
        }

        let mut store = self.store.lock();
        for entry in message.entries() {
            match entry {
                PayloadEntry::Unroutable(payload) => {
                    let error = match payload.reason() {
                        ProtocolError::InvalidAction(_) => ErrorEntry::new(
                            codes::UNKNOWN_ACTION,
                            format!("Unknown action {}", payload.action_name()),
                        ),
                        _ => ErrorEntry::new(
                            codes::UNKNOWN_MODULE,
                            format!("Unknown module {}", payload.module_name()),
                        ),
                    };
                    warn!(
                        identifier = payload.identifier(),
                        module = payload.module_name(),
                        action = payload.action_name(),
                        "unroutable payload"
                    );
                    let reply = payload.make_response().with_error(error).with_status(400);
                    if let Err(err) = response.add_unroutable(reply) {
                        warn!(error = %err, "dropping duplicate reply payload");
                    }
                }
                PayloadEntry::Routable(payload) => match self.handlers.get(payload.module()) {
                    Some(handler) => {
                        handler.handle(payload, &mut *store, response);
                        if !response.contains(payload.identifier()) {
                            error!(
                                identifier = payload.identifier(),
                                "handler did not answer payload"
                            );
                            answer(
                                response,
                                payload
                                    .make_response()
                                    .with_error(ErrorEntry::new(
                                        codes::INTERNAL,
                                        "The payload was not answered",
                                    ))
                                    .with_status(500),
                            );
                        }
                    }
                    None => {
                        warn!(
                            identifier = payload.identifier(),
                            module = payload.module().as_str(),
                            "no handler registered for module"
                        );
                        answer(
                            response,
                            payload
                                .make_response()
                                .with_error(ErrorEntry::new(
                                    codes::UNKNOWN_MODULE,
                                    format!("Unknown module {}", payload.module().as_str()),
                                ))
                                .with_status(400),
                        );
                    }
                },
            }
        }
        debug!(answered = response.len(), "dispatch finished");
    }

    /// Discards a transaction left open by a panicking handler.
    fn recover_store(&self) {
        if self.store.lock().rollback().is_ok() {
            warn!("rolled back transaction left open by panic");
        }
    }
}

fn panic_text(cause: &(dyn Any + Send)) -> String {
    if let Some(text) = cause.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = cause.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
