//! # CAPI Protocol
//!
//! Message types and authentication for the Content API sync protocol.
//!
//! This crate provides:
//! - [`ErrorEntry`] for structured failures carried on the wire
//! - [`Payload`] for one unit of work (module, action, identifier, data)
//! - [`Message`], the signed envelope carrying an ordered batch of payloads
//! - HMAC-SHA256 digests over a fixed canonical JSON form
//! - The error code registry shared with existing peers
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! # Canonical form
//!
//! The digest covers the message body without the `digest` field. Fields are
//! always serialized in the order `api_key, errors, payloads, status,
//! success`; payloads keep their insertion order and free-form data maps are
//! written with sorted keys, so sender and verifier produce identical bytes.
//!
//! # Example
//!
//! ```
//! use capi_protocol::{Action, Message, Module, Payload};
//!
//! let mut request = Message::request();
//! request
//!     .add_payload(Payload::new("art-1", Module::Articles, Action::Create))
//!     .unwrap();
//!
//! let wire = request.to_wire("key", "secret").unwrap();
//! let received = Message::from_wire(&wire).unwrap();
//!
//! let mut response = Message::respond();
//! assert!(received.valid("key", "secret", &mut response));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
pub mod codes;
mod entry;
mod error;
mod message;
mod payload;
mod wire;

pub use auth::{keys_match, sign, verify_digest};
pub use entry::ErrorEntry;
pub use error::{ErrorKind, ProtocolError, ProtocolResult};
pub use message::Message;
pub use payload::{Action, Module, Payload, PayloadEntry, UnroutablePayload};
pub use wire::{MessageBody, SignedMessage, WirePayload};
