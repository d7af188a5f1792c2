//! Error types for the client transport.

use capi_protocol::{ErrorKind, ProtocolError};
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while sending a message.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network-level failure; carries the underlying error text.
    #[error("transport error: {0}")]
    Network(String),

    /// The remote returned no body and no network error.
    #[error("unexpected empty response")]
    EmptyResponse,

    /// The request could not be built or the reply could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The HTTP client could not be constructed.
    #[error("client error: {0}")]
    Client(String),
}

impl TransportError {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Network(_) | TransportError::EmptyResponse => ErrorKind::Transport,
            TransportError::Protocol(err) => err.kind(),
            TransportError::Client(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if sending again may succeed.
    ///
    /// No retry is performed by this crate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Network(_) | TransportError::EmptyResponse
        )
    }
}
