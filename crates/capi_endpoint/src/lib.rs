//! # CAPI Endpoint
//!
//! Receiving side of the Content API sync protocol.
//!
//! An [`Endpoint`] takes one incoming HTTP request, authenticates the
//! signed message it carries, routes each payload to the
//! [`ContentHandler`] registered for its module, and always answers with a
//! signed response message.
//!
//! Handlers write through a [`ContentStore`]. Each payload's effects run
//! in their own store transaction, so a failure part way through a payload
//! leaves nothing behind.
//!
//! ```
//! use capi_endpoint::{ArticleHandler, Endpoint, EndpointConfig, IncomingRequest, MemoryStore};
//! use capi_protocol::{Action, Message, Module, Payload};
//! use serde_json::json;
//!
//! let config = EndpointConfig::new("key", "secret");
//! let mut endpoint = Endpoint::new(config, MemoryStore::new("https://news.example.com"));
//! endpoint.register(ArticleHandler::default()).unwrap();
//!
//! let mut request = Message::request();
//! let mut payload = Payload::new("art-1", Module::Articles, Action::Create);
//! payload
//!     .add_data("title", "Hello")
//!     .add_data("content", "<p>Body</p>")
//!     .add_data("start_date", "2026-01-05 09:00:00")
//!     .add_data("image", json!({"src": "https://img.example.com/a.jpg"}));
//! request.add_payload(payload).unwrap();
//!
//! let wire = request.to_wire("key", "secret").unwrap();
//! let reply = endpoint.handle(&IncomingRequest::post_body(wire));
//! assert_eq!(reply.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod articles;
mod config;
mod error;
mod handler;
mod memory;
mod server;
mod store;

pub use articles::{slugify, ArticleHandler};
pub use config::EndpointConfig;
pub use error::{EndpointError, EndpointResult, StoreError, StoreResult};
pub use handler::{answer, ContentHandler, HandlerRegistry};
pub use memory::{MemoryStore, StoreOp};
pub use server::{Endpoint, EndpointResponse, IncomingRequest, CONTENT_TYPE};
pub use store::{
    transaction, ArticleDraft, ArticleId, ArticleRecord, ContentStore, MediaId, MediaRecord,
};
