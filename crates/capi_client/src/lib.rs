//! # CAPI Client
//!
//! Client role of the Content API sync protocol.
//!
//! This crate provides:
//! - [`MessageTransport`], which signs a [`Message`](capi_protocol::Message),
//!   posts it to a remote endpoint and parses the reply
//! - [`HttpClient`], the seam for the HTTP library, with a blocking
//!   `reqwest` implementation and an in-process loopback client
//! - [`MockTransport`] for tests
//!
//! The transport does not verify the reply's digest. Callers check it with
//! [`Message::valid`](capi_protocol::Message::valid), the same way the
//! endpoint checks requests.
//!
//! ```rust,ignore
//! use capi_client::{ClientConfig, HttpTransport, MessageTransport, RemoteEndpoint, ReqwestClient};
//! use capi_protocol::Message;
//!
//! let endpoint = RemoteEndpoint::new("https://cms.example.com/capi", "key", "secret");
//! let transport = HttpTransport::new(ReqwestClient::new(&ClientConfig::default())?);
//!
//! let mut request = Message::request();
//! // add payloads...
//! let reply = transport.send(&mut request, &endpoint)?;
//!
//! let mut check = Message::respond();
//! if !reply.valid(endpoint.api_key(), endpoint.api_secret(), &mut check) {
//!     // reply was not signed with our secret
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod http;
mod transport;

pub use config::{ClientConfig, RemoteEndpoint};
pub use error::{TransportError, TransportResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer, ReqwestClient};
pub use transport::{MessageTransport, MockTransport};
